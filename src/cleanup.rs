//! Stray-region cleanup over an assignment map.
//!
//! Small connected regions (4-connectivity) are folded into the cluster they
//! touch most often (8-connectivity), then one majority-vote pass smooths
//! single-pixel noise. Both steps update the map in place in scan order, so
//! later decisions see earlier ones.

use image::Rgba;
use tracing::debug;

use crate::color_space::Rgb;
use crate::layers::{AssignmentMap, Layer, assignments_from_layers, layers_from_assignments, nearest_centroid};

/// Pixels above this alpha must end up in exactly one layer.
pub const COVERAGE_MIN_ALPHA: u8 = 10;

/// Neighbors that must agree before the smoothing pass flips a pixel.
pub const SMOOTHING_MIN_SUPPORT: usize = 4;

const NEIGHBORS_8: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub regions: usize,
    pub stray_regions: usize,
    pub reassigned_regions: usize,
    pub smoothed_pixels: usize,
    pub covered_pixels: usize,
}

/// Tally the clusters found in the 8-neighborhood of `index` into `counts`.
/// Returns how many assigned neighbors were seen.
fn tally_neighbors(map: &AssignmentMap, index: usize, counts: &mut [usize]) -> usize {
    let width = map.width() as i64;
    let height = map.height() as i64;
    let x = index as i64 % width;
    let y = index as i64 / width;

    let mut seen = 0;
    for (dx, dy) in NEIGHBORS_8 {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || nx >= width || ny < 0 || ny >= height {
            continue;
        }
        let Some(cluster) = map.get((ny * width + nx) as usize) else {
            continue;
        };
        if let Some(count) = counts.get_mut(cluster) {
            *count += 1;
            seen += 1;
        }
    }
    seen
}

/// Collect the maximal 4-connected region of same-cluster pixels containing
/// `start`, marking its members visited. Iterative; `stack` is scratch space.
pub fn find_region(
    map: &AssignmentMap,
    start: usize,
    visited: &mut [bool],
    stack: &mut Vec<usize>,
) -> Vec<usize> {
    let cluster = map.get(start);
    let width = map.width() as usize;
    let height = map.height() as usize;

    let mut region = vec![start];
    visited[start] = true;
    stack.clear();
    stack.push(start);

    while let Some(current) = stack.pop() {
        let x = current % width;
        let y = current / width;
        let mut candidates = [None; 4];
        if x > 0 {
            candidates[0] = Some(current - 1);
        }
        if x + 1 < width {
            candidates[1] = Some(current + 1);
        }
        if y > 0 {
            candidates[2] = Some(current - width);
        }
        if y + 1 < height {
            candidates[3] = Some(current + width);
        }

        for next in candidates.into_iter().flatten() {
            if !visited[next] && map.get(next) == cluster {
                visited[next] = true;
                stack.push(next);
                region.push(next);
            }
        }
    }
    region
}

/// Reassign every region of at most `threshold` pixels to the neighboring
/// cluster it touches most. Regions with no foreign neighbor stay put.
pub fn reassign_stray_regions(
    map: &mut AssignmentMap,
    threshold: usize,
    cluster_count: usize,
    stats: &mut CleanupStats,
) {
    let mut visited = vec![false; map.len()];
    let mut stack = Vec::new();
    let mut counts = vec![0usize; cluster_count];

    for start in 0..map.len() {
        if visited[start] {
            continue;
        }
        let Some(cluster) = map.get(start) else {
            continue;
        };

        let region = find_region(map, start, &mut visited, &mut stack);
        stats.regions += 1;
        if region.len() > threshold {
            continue;
        }
        stats.stray_regions += 1;

        counts.iter_mut().for_each(|c| *c = 0);
        for &member in &region {
            tally_neighbors(map, member, &mut counts);
        }
        if let Some(own) = counts.get_mut(cluster) {
            *own = 0;
        }

        let mut best = cluster;
        let mut best_count = 0;
        for (candidate, &count) in counts.iter().enumerate() {
            if count > best_count {
                best_count = count;
                best = candidate;
            }
        }

        if best != cluster && best_count > 0 {
            for &member in &region {
                map.set(member, Some(best));
            }
            stats.reassigned_regions += 1;
        }
    }
}

/// One in-place majority pass: a pixel whose 8-neighborhood is dominated by
/// another cluster with at least [`SMOOTHING_MIN_SUPPORT`] votes joins it.
pub fn smooth_majority(map: &mut AssignmentMap, cluster_count: usize, stats: &mut CleanupStats) {
    let mut counts = vec![0usize; cluster_count];

    for index in 0..map.len() {
        let Some(current) = map.get(index) else {
            continue;
        };

        counts.iter_mut().for_each(|c| *c = 0);
        if tally_neighbors(map, index, &mut counts) == 0 {
            continue;
        }

        let mut majority = current;
        let mut max = counts.get(current).copied().unwrap_or(0);
        for (candidate, &count) in counts.iter().enumerate() {
            if count > max {
                max = count;
                majority = candidate;
            }
        }

        if majority != current && max >= SMOOTHING_MIN_SUPPORT {
            map.set(index, Some(majority));
            stats.smoothed_pixels += 1;
        }
    }
}

/// Stamp any sufficiently opaque source pixel that no layer covers into the
/// layer of its nearest centroid.
pub fn guarantee_coverage(
    rgba: &[u8],
    width: u32,
    layers: &mut [Layer],
    centroids: &[Rgb],
    stats: &mut CleanupStats,
) {
    if centroids.is_empty() || width == 0 {
        return;
    }

    for (i, px) in rgba.chunks_exact(4).enumerate() {
        if px[3] <= COVERAGE_MIN_ALPHA {
            continue;
        }
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        if layers.iter().any(|layer| layer.get_pixel(x, y)[3] > 0) {
            continue;
        }

        let Some(cluster) = nearest_centroid([px[0], px[1], px[2]], centroids) else {
            continue;
        };
        let Some(layer) = layers.get_mut(cluster) else {
            continue;
        };
        let color = centroids[cluster];
        layer.put_pixel(x, y, Rgba([color.red, color.green, color.blue, 255]));
        stats.covered_pixels += 1;
    }
}

/// Full cleanup over freshly built layers.
///
/// With `threshold == 0` the region and smoothing passes are skipped and the
/// layers are only checked for coverage.
pub fn clean_up(
    rgba: &[u8],
    width: u32,
    height: u32,
    centroids: &[Rgb],
    mut layers: Vec<Layer>,
    threshold: usize,
) -> (Vec<Layer>, CleanupStats) {
    let mut stats = CleanupStats::default();

    if threshold > 0 {
        let mut map = assignments_from_layers(&layers, width, height);
        reassign_stray_regions(&mut map, threshold, centroids.len(), &mut stats);
        smooth_majority(&mut map, centroids.len(), &mut stats);
        layers = layers_from_assignments(&map, centroids);
    }

    guarantee_coverage(rgba, width, &mut layers, centroids, &mut stats);
    debug!(
        threshold,
        regions = stats.regions,
        stray_regions = stats.stray_regions,
        reassigned = stats.reassigned_regions,
        smoothed = stats.smoothed_pixels,
        covered = stats.covered_pixels,
        "cleanup finished"
    );
    (layers, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{assign_pixels, build_layers};
    use palette::Srgb;
    use pretty_assertions::assert_eq;

    fn map_from(width: u32, height: u32, cells: &[Option<usize>]) -> AssignmentMap {
        let mut map = AssignmentMap::new(width, height);
        for (i, &c) in cells.iter().enumerate() {
            map.set(i, c);
        }
        map
    }

    #[test]
    fn region_uses_four_connectivity() {
        // Diagonal pixels of cluster 1 are separate regions
        let map = map_from(3, 3, &[
            Some(1), Some(0), Some(0),
            Some(0), Some(1), Some(0),
            Some(0), Some(0), Some(1),
        ]);
        let mut visited = vec![false; 9];
        let mut stack = Vec::new();
        assert_eq!(find_region(&map, 0, &mut visited, &mut stack), vec![0]);

        let mut region = find_region(&map, 1, &mut visited, &mut stack);
        region.sort();
        assert_eq!(region, vec![1, 2, 5]);

        let mut region = find_region(&map, 3, &mut visited, &mut stack);
        region.sort();
        assert_eq!(region, vec![3, 6, 7]);
    }

    #[test]
    fn isolated_pixel_joins_surrounding_cluster() {
        let mut map = map_from(3, 3, &[
            Some(0), Some(0), Some(0),
            Some(0), Some(1), Some(0),
            Some(0), Some(0), Some(0),
        ]);
        let mut stats = CleanupStats::default();
        reassign_stray_regions(&mut map, 1, 2, &mut stats);
        assert!(map.as_slice().iter().all(|&c| c == Some(0)));
        assert_eq!(stats.reassigned_regions, 1);
    }

    #[test]
    fn regions_above_threshold_survive() {
        let cells = [
            Some(0), Some(0), Some(1), Some(1),
            Some(0), Some(0), Some(1), Some(1),
        ];
        let mut map = map_from(4, 2, &cells);
        let mut stats = CleanupStats::default();
        reassign_stray_regions(&mut map, 3, 2, &mut stats);
        assert_eq!(map.as_slice(), &cells);
        assert_eq!(stats.regions, 2);
        assert_eq!(stats.stray_regions, 0);
    }

    #[test]
    fn lone_region_without_neighbors_is_kept() {
        let cells = [None, Some(2), None];
        let mut map = map_from(3, 1, &cells);
        let mut stats = CleanupStats::default();
        reassign_stray_regions(&mut map, 5, 3, &mut stats);
        assert_eq!(map.as_slice(), &cells);
    }

    #[test]
    fn smoothing_needs_four_votes() {
        // Center has three cluster-1 neighbors and five unassigned
        let mut map = map_from(3, 3, &[
            Some(1), Some(1), Some(1),
            None, Some(0), None,
            None, None, None,
        ]);
        let mut stats = CleanupStats::default();
        smooth_majority(&mut map, 2, &mut stats);
        assert_eq!(map.get(4), Some(0));

        let mut map = map_from(3, 3, &[
            Some(1), Some(1), Some(1),
            Some(1), Some(0), None,
            None, None, None,
        ]);
        smooth_majority(&mut map, 2, &mut stats);
        assert_eq!(map.get(4), Some(1));
    }

    #[test]
    fn zero_threshold_keeps_raw_assignment() {
        let rgba = [
            255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255, //
            255, 0, 0, 255, 0, 0, 255, 255, 255, 0, 0, 255, //
            255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255,
        ];
        let centroids = [Srgb::new(255, 0, 0), Srgb::new(0, 0, 255)];
        let raw = assign_pixels(&rgba, 3, 3, &centroids);
        let layers = build_layers(&rgba, 3, 3, &centroids);

        let (kept, stats) = clean_up(&rgba, 3, 3, &centroids, layers.clone(), 0);
        assert_eq!(kept, layers);
        assert_eq!(assignments_from_layers(&kept, 3, 3), raw);
        assert_eq!(stats, CleanupStats::default());

        let (cleaned, _) = clean_up(&rgba, 3, 3, &centroids, layers, 1);
        assert_eq!(cleaned[1].get_pixel(1, 1)[3], 0);
        assert_eq!(cleaned[0].get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn coverage_fills_gaps() {
        let rgba = [10, 10, 10, 255, 10, 10, 10, 11, 10, 10, 10, 10];
        let centroids = [Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)];
        let mut layers = vec![Layer::new(3, 1), Layer::new(3, 1)];
        let mut stats = CleanupStats::default();
        guarantee_coverage(&rgba, 3, &mut layers, &centroids, &mut stats);

        assert_eq!(stats.covered_pixels, 2);
        assert_eq!(layers[0].get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(layers[0].get_pixel(1, 0).0, [0, 0, 0, 255]);
        assert_eq!(layers[0].get_pixel(2, 0)[3], 0);
        assert_eq!(layers[1].get_pixel(0, 0)[3], 0);
    }
}
