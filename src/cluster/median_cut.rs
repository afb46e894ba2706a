use std::collections::VecDeque;

use palette::Srgb;
use tracing::debug;

use super::opaque_rgb;
use crate::color_space::Rgb;

#[derive(Debug, Clone)]
struct ColorBox {
    pixels: Vec<[u8; 3]>,
    /// Channel to sort on at the next split; rotates R, G, B.
    axis: usize,
}

impl ColorBox {
    fn can_split(&self) -> bool {
        self.pixels.len() >= 2
    }

    /// Stable sort along `axis`, then cut at the median index. The upper half
    /// takes the extra pixel for odd sizes.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let axis = self.axis;
        self.pixels.sort_by_key(|p| p[axis]);
        let upper = self.pixels.split_off(self.pixels.len() / 2);
        let next_axis = (axis + 1) % 3;
        (
            ColorBox {
                pixels: self.pixels,
                axis: next_axis,
            },
            ColorBox {
                pixels: upper,
                axis: next_axis,
            },
        )
    }

    fn mean(&self) -> Rgb {
        let mut sums = [0u64; 3];
        for p in &self.pixels {
            for (sum, &c) in sums.iter_mut().zip(p) {
                *sum += c as u64;
            }
        }
        let n = self.pixels.len().max(1) as f64;
        let [r, g, b] = sums.map(|s| (s as f64 / n).round().min(255.0) as u8);
        Srgb::new(r, g, b)
    }
}

/// Median-cut quantization of the opaque pixels of an RGBA buffer.
///
/// Boxes are split in first-in first-out order, so a power-of-two `k` splits
/// every level evenly. A box of one pixel is never split; if no box can be
/// split the result has fewer than `k` colors.
pub fn quantize(rgba: &[u8], k: usize) -> Vec<Rgb> {
    let pixels = opaque_rgb(rgba);
    if pixels.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut boxes = VecDeque::from([ColorBox { pixels, axis: 0 }]);
    while boxes.len() < k {
        let Some(position) = boxes.iter().position(ColorBox::can_split) else {
            break;
        };
        let Some(color_box) = boxes.remove(position) else {
            break;
        };
        let (lower, upper) = color_box.split();
        boxes.push_back(lower);
        boxes.push_back(upper);
    }

    debug!(boxes = boxes.len(), requested = k, "median cut finished");
    boxes.iter().map(ColorBox::mean).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pixels(colors: &[[u8; 3]]) -> Vec<u8> {
        colors.iter().flat_map(|c| [c[0], c[1], c[2], 255]).collect()
    }

    #[test]
    fn four_boxes_from_four_colors() {
        let rgba = pixels(&[[10, 200, 0], [200, 10, 0], [10, 10, 0], [200, 200, 0]]);
        let mut palette = quantize(&rgba, 4);
        assert_eq!(palette.len(), 4);
        palette.sort_by_key(|c| (c.red, c.green));
        assert_eq!(
            palette,
            vec![
                Srgb::new(10, 10, 0),
                Srgb::new(10, 200, 0),
                Srgb::new(200, 10, 0),
                Srgb::new(200, 200, 0),
            ]
        );
    }

    #[test]
    fn odd_k_splits_one_box_at_a_time() {
        let colors: Vec<[u8; 3]> = (0..12u8).map(|i| [i * 20, 0, 0]).collect();
        let palette = quantize(&pixels(&colors), 3);
        assert_eq!(palette.len(), 3);
    }

    #[test]
    fn box_means_are_exact_for_uniform_halves() {
        let rgba = pixels(&[[0, 0, 0], [0, 0, 0], [100, 50, 20], [100, 50, 20]]);
        let mut palette = quantize(&rgba, 2);
        palette.sort_by_key(|c| c.red);
        assert_eq!(palette, vec![Srgb::new(0, 0, 0), Srgb::new(100, 50, 20)]);
    }

    #[test]
    fn never_produces_empty_boxes() {
        let rgba = pixels(&[[1, 2, 3], [4, 5, 6]]);
        let palette = quantize(&rgba, 5);
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn empty_and_zero_k() {
        assert!(quantize(&[], 4).is_empty());
        assert!(quantize(&pixels(&[[1, 1, 1]]), 0).is_empty());
    }
}
