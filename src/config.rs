use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color_space::{ColorSpace, Rgb, hex_to_rgb};
use crate::error::{Error, Result};

pub const DEFAULT_K: usize = 8;
pub const DEFAULT_SEED: i64 = 12345;

/// Clustering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "native-bin", derive(clap::ValueEnum))]
pub enum Algorithm {
    /// k-means++ in the configured color space.
    #[default]
    #[serde(rename = "kmeans")]
    #[cfg_attr(feature = "native-bin", value(name = "kmeans"))]
    KMeans,
    /// k-means++ forced into CIE Lab.
    #[serde(rename = "lab-kmeans", alias = "lab")]
    #[cfg_attr(feature = "native-bin", value(name = "lab-kmeans", alias = "lab"))]
    LabKMeans,
    #[serde(rename = "octree")]
    Octree,
    #[serde(rename = "median-cut", alias = "medianCut")]
    #[cfg_attr(feature = "native-bin", value(name = "median-cut", alias = "medianCut"))]
    MedianCut,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::KMeans => "kmeans",
            Algorithm::LabKMeans => "lab-kmeans",
            Algorithm::Octree => "octree",
            Algorithm::MedianCut => "median-cut",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(Algorithm::KMeans),
            "lab-kmeans" | "labkmeans" | "lab" => Ok(Algorithm::LabKMeans),
            "octree" => Ok(Algorithm::Octree),
            "median-cut" | "mediancut" | "median_cut" => Ok(Algorithm::MedianCut),
            other => Err(Error::InvalidConfig(format!(
                "unknown algorithm {other:?} (expected kmeans, lab-kmeans, octree or median-cut)"
            ))),
        }
    }
}

/// Everything one engine call needs besides the pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingConfig {
    /// Target palette size, locked entries included.
    pub k: usize,
    pub algorithm: Algorithm,
    pub color_space: ColorSpace,
    /// Scale RGB channels by luma weights before k-means (RGB space only).
    pub perceptual_weighting: bool,
    /// Use CIEDE2000 as the k-means distance (Lab space only).
    #[serde(rename = "useCIEDE2000")]
    pub use_ciede2000: bool,
    /// Regions of at most this many pixels get merged into a neighbor; 0 disables cleanup.
    pub stray_pixel_threshold: usize,
    pub seed: i64,
    /// Palette entries to keep verbatim, in order, ahead of generated ones.
    #[serde(with = "hex_colors")]
    pub locked_centroids: Vec<Rgb>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            algorithm: Algorithm::default(),
            color_space: ColorSpace::default(),
            perceptual_weighting: true,
            use_ciede2000: false,
            stray_pixel_threshold: 0,
            seed: DEFAULT_SEED,
            locked_centroids: Vec::new(),
        }
    }
}

impl ProcessingConfig {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_perceptual_weighting(mut self, enabled: bool) -> Self {
        self.perceptual_weighting = enabled;
        self
    }

    pub fn with_ciede2000(mut self, enabled: bool) -> Self {
        self.use_ciede2000 = enabled;
        self
    }

    pub fn with_stray_pixel_threshold(mut self, threshold: usize) -> Self {
        self.stray_pixel_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_locked_centroids(mut self, locked: Vec<Rgb>) -> Self {
        self.locked_centroids = locked;
        self
    }

    /// Build a config from the string tags a JS caller passes: algorithm and
    /// color space names plus `#rrggbb` locked colors.
    pub fn from_tags<S: AsRef<str>>(
        k: usize,
        algorithm: &str,
        color_space: &str,
        locked: &[S],
    ) -> Result<Self> {
        let locked_centroids = locked
            .iter()
            .map(|s| hex_to_rgb(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(k)
            .with_algorithm(algorithm.parse()?)
            .with_color_space(color_space.parse()?)
            .with_locked_centroids(locked_centroids))
    }
}

// Locked colors travel as "#rrggbb" strings in JSON
mod hex_colors {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::color_space::{Rgb, hex_to_rgb, rgb_to_hex};

    pub fn serialize<S: Serializer>(colors: &[Rgb], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(colors.iter().map(|&c| rgb_to_hex(c)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Rgb>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| hex_to_rgb(s).map_err(de::Error::custom))
            .collect()
    }
}
