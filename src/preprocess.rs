//! Optional denoising run on an image before it is separated into layers.
//!
//! Filters keep the image shape. Fully transparent pixels stay transparent
//! and never contribute to a neighbor's value.

use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub trait Preprocessor {
    fn apply(&self, image: &RgbaImage) -> RgbaImage;
}

/// Separable Gaussian blur over all four channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBlur {
    pub sigma: f64,
}

impl GaussianBlur {
    fn kernel(&self) -> (Vec<f64>, i64) {
        let radius = (self.sigma * 3.0).ceil() as i64;
        let denominator = 2.0 * self.sigma * self.sigma;
        let mut kernel: Vec<f64> = (-radius..=radius)
            .map(|i| (-((i * i) as f64) / denominator).exp())
            .collect();
        let sum: f64 = kernel.iter().sum();
        for weight in &mut kernel {
            *weight /= sum;
        }
        (kernel, radius)
    }

    fn pass(src: &RgbaImage, kernel: &[f64], radius: i64, horizontal: bool) -> RgbaImage {
        let (w, h) = src.dimensions();
        let mut out = RgbaImage::new(w, h);
        for (x, y, px) in src.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            let mut acc = [0.0f64; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let offset = k as i64 - radius;
                let (nx, ny) = if horizontal {
                    ((x as i64 + offset).clamp(0, w as i64 - 1) as u32, y)
                } else {
                    (x, (y as i64 + offset).clamp(0, h as i64 - 1) as u32)
                };
                let neighbor = src.get_pixel(nx, ny);
                if neighbor[3] == 0 {
                    continue;
                }
                for (a, &c) in acc.iter_mut().zip(neighbor.0.iter()) {
                    *a += c as f64 * weight;
                }
            }
            out.put_pixel(x, y, Rgba(acc.map(|v| v.clamp(0.0, 255.0) as u8)));
        }
        out
    }
}

impl Preprocessor for GaussianBlur {
    fn apply(&self, image: &RgbaImage) -> RgbaImage {
        if self.sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
            return image.clone();
        }
        let (kernel, radius) = self.kernel();
        let horizontal = Self::pass(image, &kernel, radius, true);
        Self::pass(&horizontal, &kernel, radius, false)
    }
}

/// Per-channel median over a square window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedianFilter {
    pub radius: u32,
}

impl Default for MedianFilter {
    fn default() -> Self {
        Self { radius: 2 }
    }
}

impl Preprocessor for MedianFilter {
    fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let (w, h) = image.dimensions();
        let radius = self.radius as i64;
        let mut out = RgbaImage::new(w, h);
        let mut channels: [Vec<u8>; 3] = Default::default();

        for (x, y, px) in image.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            for channel in &mut channels {
                channel.clear();
            }
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let neighbor = image.get_pixel(nx as u32, ny as u32);
                    if neighbor[3] == 0 {
                        continue;
                    }
                    for (channel, &c) in channels.iter_mut().zip(neighbor.0.iter()) {
                        channel.push(c);
                    }
                }
            }

            let mut median = [0u8; 3];
            for (m, channel) in median.iter_mut().zip(channels.iter_mut()) {
                channel.sort_unstable();
                *m = channel[channel.len() / 2];
            }
            out.put_pixel(x, y, Rgba([median[0], median[1], median[2], px[3]]));
        }
        out
    }
}

/// Edge-preserving smoothing: neighbors are weighted by both spatial and
/// color distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralFilter {
    pub sigma_color: f64,
    pub sigma_space: f64,
}

impl Default for BilateralFilter {
    fn default() -> Self {
        Self {
            sigma_color: 25.0,
            sigma_space: 7.0,
        }
    }
}

impl Preprocessor for BilateralFilter {
    fn apply(&self, image: &RgbaImage) -> RgbaImage {
        if self.sigma_color <= 0.0 || self.sigma_space <= 0.0 {
            return image.clone();
        }
        let (w, h) = image.dimensions();
        let radius = (self.sigma_space * 2.0).ceil() as i64;
        let color_denominator = 2.0 * self.sigma_color * self.sigma_color;
        let space_denominator = 2.0 * self.sigma_space * self.sigma_space;
        let mut out = RgbaImage::new(w, h);

        for (x, y, px) in image.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            let center = [px[0], px[1], px[2]].map(f64::from);
            let mut total = 0.0;
            let mut acc = [0.0f64; 3];
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let neighbor = image.get_pixel(nx as u32, ny as u32);
                    if neighbor[3] == 0 {
                        continue;
                    }
                    let color = [neighbor[0], neighbor[1], neighbor[2]].map(f64::from);
                    let color_distance: f64 = center
                        .iter()
                        .zip(&color)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    let spatial_distance = (dx * dx + dy * dy) as f64;
                    let weight = (-color_distance / color_denominator).exp()
                        * (-spatial_distance / space_denominator).exp();
                    total += weight;
                    for (a, c) in acc.iter_mut().zip(color) {
                        *a += c * weight;
                    }
                }
            }
            let [r, g, b] = acc.map(|v| (v / total).round().clamp(0.0, 255.0) as u8);
            out.put_pixel(x, y, Rgba([r, g, b, px[3]]));
        }
        out
    }
}

/// Filter choice as it appears in configuration and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "native-bin", derive(clap::ValueEnum))]
pub enum Preprocessing {
    #[default]
    None,
    #[serde(alias = "blur")]
    #[cfg_attr(feature = "native-bin", value(alias = "blur"))]
    Gaussian,
    Median,
    Bilateral,
}

impl Preprocessing {
    pub fn name(self) -> &'static str {
        match self {
            Preprocessing::None => "none",
            Preprocessing::Gaussian => "gaussian",
            Preprocessing::Median => "median",
            Preprocessing::Bilateral => "bilateral",
        }
    }

    /// Build the filter for `strength`: the Gaussian sigma, the median
    /// radius (rounded up) or the bilateral spatial sigma. Returns `None`
    /// when nothing would change.
    pub fn preprocessor(self, strength: f64) -> Option<Box<dyn Preprocessor>> {
        if strength <= 0.0 {
            return None;
        }
        match self {
            Preprocessing::None => None,
            Preprocessing::Gaussian => Some(Box::new(GaussianBlur { sigma: strength })),
            Preprocessing::Median => Some(Box::new(MedianFilter {
                radius: strength.ceil() as u32,
            })),
            Preprocessing::Bilateral => Some(Box::new(BilateralFilter {
                sigma_space: strength,
                ..BilateralFilter::default()
            })),
        }
    }

    pub fn apply(self, image: &RgbaImage, strength: f64) -> RgbaImage {
        match self.preprocessor(strength) {
            Some(filter) => filter.apply(image),
            None => image.clone(),
        }
    }
}

impl fmt::Display for Preprocessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preprocessing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Preprocessing::None),
            "gaussian" | "blur" => Ok(Preprocessing::Gaussian),
            "median" => Ok(Preprocessing::Median),
            "bilateral" => Ok(Preprocessing::Bilateral),
            other => Err(Error::InvalidConfig(format!(
                "unknown preprocessing {other:?} (expected none, gaussian, median or bilateral)"
            ))),
        }
    }
}
