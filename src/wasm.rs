use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

use crate::{ProcessingConfig, rgb_to_hex};

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Separate a raw RGBA buffer into flat-color layers.
///
/// Returns `{ centroids, layers, width, height }` where `centroids` are
/// `#rrggbb` strings and `layers` holds one raw RGBA `Uint8Array` per
/// centroid, in the same order.
#[wasm_bindgen(js_name = processImage)]
#[allow(clippy::too_many_arguments)]
pub fn process_image(
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    k: usize,
    algorithm: &str,
    color_space: &str,
    perceptual_weighting: bool,
    seed: i32,
    locked: Option<Array>,
    stray_pixel_threshold: usize,
    use_ciede2000: bool,
) -> Result<Object, JsValue> {
    let locked = locked
        .map(|list| {
            list.iter()
                .map(|val| {
                    val.as_string()
                        .ok_or_else(|| JsValue::from_str("Locked colors must be hex strings"))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let config = ProcessingConfig::from_tags(k, algorithm, color_space, &locked)
        .map_err(js_err)?
        .with_perceptual_weighting(perceptual_weighting)
        .with_ciede2000(use_ciede2000)
        .with_stray_pixel_threshold(stray_pixel_threshold)
        .with_seed(seed as i64);
    let result = crate::process_image(&buffer, width, height, &config).map_err(js_err)?;

    let centroids_js = Array::new();
    for &c in &result.centroids {
        centroids_js.push(&JsValue::from_str(&rgb_to_hex(c)));
    }
    let layers_js = Array::new();
    for layer in &result.layers {
        layers_js.push(&Uint8Array::from(layer.as_raw().as_slice()));
    }

    let out = Object::new();
    Reflect::set(&out, &JsValue::from_str("centroids"), &centroids_js)?;
    Reflect::set(&out, &JsValue::from_str("layers"), &layers_js)?;
    Reflect::set(&out, &JsValue::from_str("width"), &JsValue::from(result.width))?;
    Reflect::set(&out, &JsValue::from_str("height"), &JsValue::from(result.height))?;
    Ok(out)
}
