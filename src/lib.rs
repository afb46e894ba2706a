//! Separate an RGBA image into flat-color layers.
//!
//! [`process_image`] reduces a pixel buffer to `k` palette colors with one of
//! several clustering strategies, then assigns every visible pixel to exactly
//! one per-color layer. Locked colors let repeated calls share a palette, which
//! [`process_frames`] uses to keep animation frames consistent.

pub mod cleanup;
pub mod cluster;
pub mod color_space;
pub mod config;
pub mod error;
pub mod layers;
pub mod output;
pub mod preprocess;
pub mod rng;
pub mod wasm;

use image::RgbaImage;
use tracing::debug;

use crate::cluster::{kmeans, median_cut, octree};

pub use crate::cleanup::CleanupStats;
pub use crate::color_space::{ColorSpace, Rgb, hex_to_rgb, rgb_to_hex};
pub use crate::config::{Algorithm, ProcessingConfig};
pub use crate::error::{Error, Result};
pub use crate::layers::{AssignmentMap, Layer};
pub use crate::output::{PaletteEntry, ProcessedImage, layer_animations};
pub use crate::preprocess::{Preprocessing, Preprocessor};
pub use crate::rng::SeededRandom;

/// Quantize a raw RGBA buffer and split it into per-color layers.
///
/// The palette is the locked colors (capped to `k`) followed by up to
/// `k - locked` generated ones. Degenerate inputs such as a fully transparent
/// image are not errors; they yield a short or repeated palette.
pub fn process_image(
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &ProcessingConfig,
) -> Result<ProcessedImage> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(Error::BufferSizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }

    let mut centroids: Vec<Rgb> = config.locked_centroids.iter().copied().take(config.k).collect();
    let remaining = config.k.saturating_sub(centroids.len());
    debug!(
        width,
        height,
        k = config.k,
        locked = centroids.len(),
        remaining,
        algorithm = %config.algorithm,
        space = %config.color_space,
        "processing image"
    );

    if remaining > 0 {
        centroids.extend(generate_centroids(pixels, remaining, config));
    }

    let layers = layers::build_layers(pixels, width, height, &centroids);
    let (layers, _) = cleanup::clean_up(
        pixels,
        width,
        height,
        &centroids,
        layers,
        config.stray_pixel_threshold,
    );
    debug!(centroids = centroids.len(), "layers ready");

    Ok(ProcessedImage {
        centroids,
        layers,
        width,
        height,
    })
}

pub fn process_rgba_image(image: &RgbaImage, config: &ProcessingConfig) -> Result<ProcessedImage> {
    process_image(image.as_raw(), image.width(), image.height(), config)
}

/// Process an animation against one shared palette.
///
/// The first frame fixes the palette (honoring any locked colors in
/// `config`); every frame, the first included, is then classified with that
/// palette locked in full.
pub fn process_frames(frames: &[RgbaImage], config: &ProcessingConfig) -> Result<Vec<ProcessedImage>> {
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };
    let (width, height) = first.dimensions();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != (width, height) {
            return Err(Error::FrameSizeMismatch {
                index,
                width: frame.width(),
                height: frame.height(),
                expected_width: width,
                expected_height: height,
            });
        }
    }

    let palette = process_rgba_image(first, config)?.centroids;
    debug!(frames = frames.len(), palette = palette.len(), "palette fixed from first frame");
    let locked = ProcessingConfig {
        k: palette.len(),
        locked_centroids: palette,
        ..config.clone()
    };
    frames
        .iter()
        .map(|frame| process_rgba_image(frame, &locked))
        .collect()
}

fn generate_centroids(pixels: &[u8], count: usize, config: &ProcessingConfig) -> Vec<Rgb> {
    let mut rng = SeededRandom::new(config.seed);
    match config.algorithm {
        Algorithm::KMeans => {
            let working = color_space::to_working(pixels, config.color_space);
            kmeans::quantize(
                &mut rng,
                &working,
                count,
                config.color_space,
                config.perceptual_weighting,
                config.use_ciede2000,
            )
        }
        Algorithm::LabKMeans => {
            let working = color_space::to_working(pixels, ColorSpace::Lab);
            kmeans::quantize(
                &mut rng,
                &working,
                count,
                ColorSpace::Lab,
                config.perceptual_weighting,
                config.use_ciede2000,
            )
        }
        Algorithm::Octree => octree::quantize(pixels, count),
        Algorithm::MedianCut => median_cut::quantize(pixels, count),
    }
}
