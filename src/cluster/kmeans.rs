use tracing::{debug, trace};

use super::{opaque_population, squared_distance};
use crate::color_space::{ColorSpace, Rgb, WorkingPixel, delta_e_2000, working_to_rgb};
use crate::rng::SeededRandom;

pub const MAX_ITERATIONS: usize = 50;

// Convergence is per channel: no centroid coordinate may move more than this
const EUCLIDEAN_TOLERANCE: f64 = 1.0;
const CIEDE2000_TOLERANCE: f64 = 0.1;

/// Rec. 601 luma weights applied to RGB populations when perceptual weighting
/// is on.
pub const PERCEPTUAL_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    SquaredEuclidean,
    /// Only meaningful for Lab populations.
    Ciede2000,
}

impl Distance {
    #[inline]
    fn measure(self, a: [f64; 3], b: [f64; 3]) -> f64 {
        match self {
            Distance::SquaredEuclidean => squared_distance(a, b),
            Distance::Ciede2000 => delta_e_2000(a, b),
        }
    }

    fn tolerance(self) -> f64 {
        match self {
            Distance::SquaredEuclidean => EUCLIDEAN_TOLERANCE,
            Distance::Ciede2000 => CIEDE2000_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Working-space centroids, unrounded.
    pub centroids: Vec<[f64; 3]>,
    pub iterations: usize,
    pub converged: bool,
}

/// Pick up to `k` seeds with k-means++.
///
/// The first seed is uniform over the population; each further seed is drawn
/// with probability proportional to its squared distance from the nearest seed
/// so far. Sampling stops once every point coincides with a seed; the
/// remaining slots are then filled by repeating the seeds found, so the result
/// always has `k` entries for a non-empty population.
pub fn init_plus_plus(rng: &mut SeededRandom, population: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    if population.is_empty() || k == 0 {
        return Vec::new();
    }

    let first = population[rng.rand_int(0, population.len())];
    let mut seeds = Vec::with_capacity(k);
    seeds.push(first);

    let mut min_distances: Vec<f64> = population
        .iter()
        .map(|&p| squared_distance(p, first))
        .collect();

    while seeds.len() < k {
        let total: f64 = min_distances.iter().sum();
        if total == 0.0 {
            break;
        }

        let threshold = rng.next() * total;
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (i, &d) in min_distances.iter().enumerate() {
            cumulative += d;
            if d > 0.0 && cumulative >= threshold {
                chosen = Some(i);
                break;
            }
        }
        let Some(chosen) = chosen else { break };

        let seed = population[chosen];
        seeds.push(seed);
        for (d, &p) in min_distances.iter_mut().zip(population) {
            *d = d.min(squared_distance(p, seed));
        }
    }

    let distinct = seeds.len();
    let mut i = 0;
    while seeds.len() < k {
        seeds.push(seeds[i % distinct]);
        i += 1;
    }

    seeds
}

#[inline]
fn nearest(color: [f64; 3], centroids: &[[f64; 3]], distance: Distance) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &c) in centroids.iter().enumerate() {
        let d = distance.measure(color, c);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

/// Seed with k-means++ and refine with Lloyd iterations.
pub fn find_centroids(
    rng: &mut SeededRandom,
    population: &[[f64; 3]],
    k: usize,
    distance: Distance,
) -> KMeansResult {
    let mut centroids = init_plus_plus(rng, population, k);
    let tolerance = distance.tolerance();
    let mut iterations = 0;
    let mut converged = centroids.is_empty();

    let n = centroids.len();
    let mut sums = vec![[0.0f64; 3]; n];
    let mut counts = vec![0usize; n];

    while !converged && iterations < MAX_ITERATIONS {
        sums.iter_mut().for_each(|s| *s = [0.0; 3]);
        counts.iter_mut().for_each(|c| *c = 0);

        for &color in population {
            let c = nearest(color, &centroids, distance);
            sums[c][0] += color[0];
            sums[c][1] += color[1];
            sums[c][2] += color[2];
            counts[c] += 1;
        }

        let mut changed = false;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            // Empty clusters keep their previous position
            if count == 0 {
                continue;
            }
            let count = count as f64;
            let updated = [sum[0] / count, sum[1] / count, sum[2] / count];
            if updated
                .iter()
                .zip(centroid.iter())
                .any(|(u, c)| (u - c).abs() > tolerance)
            {
                changed = true;
            }
            *centroid = updated;
        }

        iterations += 1;
        trace!(iteration = iterations, changed, "lloyd step");
        converged = !changed;
    }

    KMeansResult {
        centroids,
        iterations,
        converged,
    }
}

/// Run k-means over the opaque pixels of a working buffer and report the
/// centroids in sRGB.
///
/// Perceptual weighting only applies to RGB populations and CIEDE2000 only to
/// Lab populations; both flags are ignored in other spaces.
pub fn quantize(
    rng: &mut SeededRandom,
    pixels: &[WorkingPixel],
    k: usize,
    space: ColorSpace,
    perceptual_weighting: bool,
    use_ciede2000: bool,
) -> Vec<Rgb> {
    let weighted = perceptual_weighting && space == ColorSpace::Rgb;
    let distance = if use_ciede2000 && space == ColorSpace::Lab {
        Distance::Ciede2000
    } else {
        Distance::SquaredEuclidean
    };

    let mut population = opaque_population(pixels);
    if weighted {
        for color in &mut population {
            for (channel, weight) in color.iter_mut().zip(PERCEPTUAL_WEIGHTS) {
                *channel *= weight;
            }
        }
    }

    let result = find_centroids(rng, &population, k, distance);
    debug!(
        space = %space,
        ?distance,
        population = population.len(),
        centroids = result.centroids.len(),
        iterations = result.iterations,
        converged = result.converged,
        "k-means finished"
    );

    result
        .centroids
        .into_iter()
        .map(|mut c| {
            if weighted {
                for (channel, weight) in c.iter_mut().zip(PERCEPTUAL_WEIGHTS) {
                    *channel /= weight;
                }
            }
            working_to_rgb(c.map(f64::round), space)
        })
        .collect()
}
