//! Nearest-centroid classification and per-centroid rasters.
//!
//! A layer is a full-size RGBA image holding one palette color: alpha 255
//! where a pixel belongs to that centroid, alpha 0 everywhere else. Layers of
//! one result never overlap.

use image::{Rgba, RgbaImage};

use crate::color_space::Rgb;

/// Pixels below this alpha are background and never enter a layer.
pub const LAYER_MIN_ALPHA: u8 = 10;

pub type Layer = RgbaImage;

/// One optional cluster index per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMap {
    width: u32,
    height: u32,
    clusters: Vec<Option<usize>>,
}

impl AssignmentMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            clusters: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.clusters[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, cluster: Option<usize>) {
        self.clusters[index] = cluster;
    }

    pub fn at(&self, x: u32, y: u32) -> Option<usize> {
        self.get(y as usize * self.width as usize + x as usize)
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.clusters
    }

    /// Number of pixels assigned to each of `cluster_count` clusters.
    pub fn counts(&self, cluster_count: usize) -> Vec<usize> {
        let mut counts = vec![0; cluster_count];
        for cluster in self.clusters.iter().flatten() {
            if let Some(count) = counts.get_mut(*cluster) {
                *count += 1;
            }
        }
        counts
    }
}

/// Index of the centroid closest to `color` by squared RGB distance; the lowest
/// index wins ties. `None` only for an empty palette.
pub fn nearest_centroid(color: [u8; 3], centroids: &[Rgb]) -> Option<usize> {
    let [r, g, b] = color.map(i32::from);
    centroids
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| {
            let dr = r - c.red as i32;
            let dg = g - c.green as i32;
            let db = b - c.blue as i32;
            dr * dr + dg * dg + db * db
        })
        .map(|(i, _)| i)
}

/// Classify every pixel with alpha ≥ [`LAYER_MIN_ALPHA`].
pub fn assign_pixels(rgba: &[u8], width: u32, height: u32, centroids: &[Rgb]) -> AssignmentMap {
    let mut map = AssignmentMap::new(width, height);
    for (i, px) in rgba.chunks_exact(4).enumerate().take(map.len()) {
        if px[3] < LAYER_MIN_ALPHA {
            continue;
        }
        map.set(i, nearest_centroid([px[0], px[1], px[2]], centroids));
    }
    map
}

/// Render one layer per centroid from an assignment map.
pub fn layers_from_assignments(map: &AssignmentMap, centroids: &[Rgb]) -> Vec<Layer> {
    let mut layers: Vec<Layer> = centroids
        .iter()
        .map(|_| RgbaImage::new(map.width(), map.height()))
        .collect();
    if map.width() == 0 {
        return layers;
    }

    for (i, cluster) in map.as_slice().iter().enumerate() {
        let Some(cluster) = *cluster else { continue };
        let Some(color) = centroids.get(cluster) else {
            continue;
        };
        let x = (i % map.width() as usize) as u32;
        let y = (i / map.width() as usize) as u32;
        layers[cluster].put_pixel(x, y, Rgba([color.red, color.green, color.blue, 255]));
    }
    layers
}

/// Assign and render in one step.
pub fn build_layers(rgba: &[u8], width: u32, height: u32, centroids: &[Rgb]) -> Vec<Layer> {
    layers_from_assignments(&assign_pixels(rgba, width, height, centroids), centroids)
}

/// Recover the assignment map from rendered layers. Should layers overlap,
/// the later layer wins.
pub fn assignments_from_layers(layers: &[Layer], width: u32, height: u32) -> AssignmentMap {
    let mut map = AssignmentMap::new(width, height);
    for (cluster, layer) in layers.iter().enumerate() {
        for (i, px) in layer.pixels().enumerate() {
            if px[3] > 0 {
                map.set(i, Some(cluster));
            }
        }
    }
    map
}
