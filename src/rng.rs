// Park–Miller minimal standard generator
const MODULUS: i64 = 2_147_483_647;
const MULTIPLIER: i64 = 16_807;

/// Reproducible random source for centroid seeding.
///
/// Every call to the engine builds its own instance from the configured seed,
/// so identical inputs always replay the same sequence. All state updates are
/// integer arithmetic; only the final division to `[0, 1)` touches floats.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: i64,
}

impl SeededRandom {
    pub fn new(seed: i64) -> Self {
        let mut state = seed % MODULUS;
        if state <= 0 {
            state += MODULUS - 1;
        }
        Self { state }
    }

    /// Next value in `[0, 1)`.
    pub fn next(&mut self) -> f64 {
        self.state = (self.state * MULTIPLIER) % MODULUS;
        (self.state - 1) as f64 / (MODULUS - 1) as f64
    }

    /// Uniform integer in `min..max`. Returns `min` for an empty range.
    pub fn rand_int(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = (max - min) as f64;
        ((self.next() * span).floor() as usize).min(max - min - 1) + min
    }
}
