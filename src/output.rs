//! What one engine call hands back, and the edits a caller makes to it
//! afterwards: palette statistics, flattening, merging and recoloring layers.

use std::collections::BTreeSet;

use image::{Rgba, RgbaImage, imageops};
use palette::Srgb;
use serde::Serialize;

use crate::color_space::{Rgb, rgb_to_hex};
use crate::error::{Error, Result};
use crate::layers::{AssignmentMap, Layer, assignments_from_layers};

/// Palette plus one layer per palette entry, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub centroids: Vec<Rgb>,
    pub layers: Vec<Layer>,
    pub width: u32,
    pub height: u32,
}

/// Serializable palette summary, as written next to the layer files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub hex: String,
    pub pixel_count: usize,
}

impl ProcessedImage {
    /// Opaque pixels per layer.
    pub fn pixel_counts(&self) -> Vec<usize> {
        self.layers
            .iter()
            .map(|layer| layer.pixels().filter(|px| px[3] > 0).count())
            .collect()
    }

    pub fn palette_hex(&self) -> Vec<String> {
        self.centroids.iter().map(|&c| rgb_to_hex(c)).collect()
    }

    /// File stem per layer, `<index>_<rrggbb>`. The index keeps repeated
    /// palette colors apart.
    pub fn layer_stems(&self) -> Vec<String> {
        self.palette_hex()
            .iter()
            .enumerate()
            .map(|(i, hex)| format!("{i:02}_{}", hex.trim_start_matches('#')))
            .collect()
    }

    pub fn palette_entries(&self) -> Vec<PaletteEntry> {
        self.palette_hex()
            .into_iter()
            .zip(self.pixel_counts())
            .map(|(hex, pixel_count)| PaletteEntry { hex, pixel_count })
            .collect()
    }

    /// Draw every layer, in order, over a transparent canvas.
    pub fn composite(&self) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.width, self.height);
        for layer in &self.layers {
            imageops::overlay(&mut canvas, layer, 0, 0);
        }
        canvas
    }

    pub fn assignments(&self) -> AssignmentMap {
        assignments_from_layers(&self.layers, self.width, self.height)
    }

    /// Collapse the given layers into one.
    ///
    /// The merged color is the mean of the merged centroids weighted by their
    /// pixel counts, an empty layer counting as one pixel. The merged layer
    /// covers the union of the sources and takes the lowest merged index.
    pub fn merge_layers(&mut self, indices: &[usize]) -> Result<()> {
        let selected: BTreeSet<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.layers.len() && i < self.centroids.len())
            .collect();
        if selected.len() < 2 {
            return Err(Error::InvalidMerge(format!(
                "need at least two distinct layers out of {}, got {indices:?}",
                self.layers.len()
            )));
        }

        let counts = self.pixel_counts();
        let mut sums = [0u64; 3];
        let mut total = 0u64;
        for &i in &selected {
            let weight = counts[i].max(1) as u64;
            let c = self.centroids[i];
            sums[0] += c.red as u64 * weight;
            sums[1] += c.green as u64 * weight;
            sums[2] += c.blue as u64 * weight;
            total += weight;
        }
        let [r, g, b] = sums.map(|s| (s as f64 / total as f64).round().min(255.0) as u8);
        let color = Srgb::new(r, g, b);

        let mut merged = RgbaImage::new(self.width, self.height);
        for (x, y, px) in merged.enumerate_pixels_mut() {
            if selected
                .iter()
                .any(|&i| self.layers[i].get_pixel(x, y)[3] > 0)
            {
                *px = Rgba([r, g, b, 255]);
            }
        }

        for &i in selected.iter().rev() {
            self.centroids.remove(i);
            self.layers.remove(i);
        }
        let Some(&insert_at) = selected.first() else {
            return Ok(());
        };
        self.centroids.insert(insert_at, color);
        self.layers.insert(insert_at, merged);
        Ok(())
    }

    /// Replace one palette color and repaint its layer.
    pub fn recolor(&mut self, index: usize, color: Rgb) -> Result<()> {
        let (Some(centroid), Some(layer)) =
            (self.centroids.get_mut(index), self.layers.get_mut(index))
        else {
            return Err(Error::InvalidConfig(format!(
                "no layer at index {index} (have {})",
                self.layers.len()
            )));
        };
        *centroid = color;
        for px in layer.pixels_mut() {
            if px[3] > 0 {
                *px = Rgba([color.red, color.green, color.blue, px[3]]);
            }
        }
        Ok(())
    }
}

/// Regroup frame results by palette entry: for every layer index of the
/// first frame, that layer from each frame in order, keyed by its stem.
///
/// Frames are expected to share one palette, as [`crate::process_frames`]
/// returns them.
pub fn layer_animations(results: &[ProcessedImage]) -> Vec<(String, Vec<&Layer>)> {
    let Some(first) = results.first() else {
        return Vec::new();
    };
    first
        .layer_stems()
        .into_iter()
        .enumerate()
        .map(|(i, stem)| {
            let frames = results.iter().filter_map(|r| r.layers.get(i)).collect();
            (stem, frames)
        })
        .collect()
}
