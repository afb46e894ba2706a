//! Image fixtures shared by the integration tests.

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use image_to_color_layers_wasm::{ProcessedImage, layers::LAYER_MIN_ALPHA};

pub fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]))
}

/// Vertical stripes `stripe` pixels wide, one per color, left to right.
pub fn stripes(colors: &[[u8; 3]], stripe: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(colors.len() as u32 * stripe, height, |x, _| {
        let c = colors[(x / stripe) as usize];
        Rgba([c[0], c[1], c[2], 255])
    })
}

/// A smooth color ramp with a transparent column, a faint column and a
/// half-transparent row, for invariants that must hold on arbitrary input.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x + y) * 7 % 256) as u8;
        let a = match (x, y) {
            (0, _) => 0,
            (1, _) => 5,
            (_, 2) => 128,
            _ => 255,
        };
        Rgba([r, g, b, a])
    })
}

/// Every pixel at or above the layer alpha cutoff sits in exactly one layer,
/// every other pixel in none.
pub fn assert_partition(source: &RgbaImage, result: &ProcessedImage) {
    assert_eq!(result.layers.len(), result.centroids.len());
    for (x, y, px) in source.enumerate_pixels() {
        let covering = result
            .layers
            .iter()
            .filter(|layer| layer.get_pixel(x, y)[3] > 0)
            .count();
        let expected = usize::from(px[3] >= LAYER_MIN_ALPHA && !result.centroids.is_empty());
        assert_eq!(covering, expected, "pixel ({x}, {y}) alpha {}", px[3]);
    }
}

pub fn sorted_palette(result: &ProcessedImage) -> Vec<[u8; 3]> {
    let mut colors: Vec<[u8; 3]> = result
        .centroids
        .iter()
        .map(|c| [c.red, c.green, c.blue])
        .collect();
    colors.sort();
    colors
}
