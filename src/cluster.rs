use crate::color_space::WorkingPixel;

pub mod kmeans;
pub mod median_cut;
pub mod octree;

// Cluster engines only ever see pixels that carry some opacity. Fully
// transparent pixels are background for every algorithm.

/// Working-space colors of all pixels with alpha > 0, in buffer order.
pub fn opaque_population(pixels: &[WorkingPixel]) -> Vec<[f64; 3]> {
    pixels
        .iter()
        .filter(|px| px.alpha > 0)
        .map(|px| px.color)
        .collect()
}

/// RGB triples of all pixels with alpha > 0 in an RGBA byte buffer.
pub fn opaque_rgb(rgba: &[u8]) -> Vec<[u8; 3]> {
    rgba.chunks_exact(4)
        .filter(|px| px[3] > 0)
        .map(|px| [px[0], px[1], px[2]])
        .collect()
}

#[inline]
pub(crate) fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}
