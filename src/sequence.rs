//! Deterministic pseudo-random sequence generator.
//!
//! A 32-bit linear congruential generator seeded from a string. All arithmetic
//! wraps modulo 2^32, so the same seed yields the same sequence on every
//! platform and in every process. There is no ambient or global state: each
//! caller constructs its own generator.

/// LCG multiplier (Numerical Recipes).
const MULTIPLIER: u32 = 1_664_525;
/// LCG increment (Numerical Recipes).
const INCREMENT: u32 = 1_013_904_223;
/// Multiplier used when folding seed characters into the initial state.
const SEED_FOLD: u32 = 31;
/// `2^32` as a float, the modulus of the generator.
const MODULUS: f64 = 4_294_967_296.0;

/// A seeded, reproducible sequence of pseudo-random values.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    state: u32,
}

impl SequenceGenerator {
    /// Create a generator from a string seed.
    ///
    /// Each character's code point is folded in with `acc * 31 + code`
    /// (mod 2^32). A zero accumulator is replaced by 1.
    #[must_use]
    pub fn new(seed: &str) -> Self {
        let folded = seed.chars().fold(0u32, |acc, c| {
            acc.wrapping_mul(SEED_FOLD).wrapping_add(u32::from(c))
        });
        Self {
            state: if folded == 0 { 1 } else { folded },
        }
    }

    /// Advance the generator and return the raw 32-bit state.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / MODULUS
    }

    /// Next integer in `[min, max]`, both inclusive.
    ///
    /// Equivalent to `min + floor(next_f64() * (max - min + 1))`, computed in
    /// integers so no float rounding can push the result past `max`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `min > max`.
    pub fn next_int(&mut self, min: usize, max: usize) -> usize {
        debug_assert!(min <= max, "next_int called with min > max");
        let span = (max - min) as u128 + 1;
        let scaled = (u128::from(self.next_u32()) * span) >> 32;
        #[allow(clippy::cast_possible_truncation)]
        {
            min + scaled as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SequenceGenerator::new("forensic-key:0");
        let mut b = SequenceGenerator::new("forensic-key:0");
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SequenceGenerator::new("forensic-key:0");
        let mut b = SequenceGenerator::new("forensic-key:1");
        let a_vals: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let b_vals: Vec<u32> = (0..16).map(|_| b.next_u32()).collect();
        assert_ne!(a_vals, b_vals);
    }

    #[test]
    fn empty_seed_uses_state_one() {
        let mut g = SequenceGenerator::new("");
        // 1 * 1664525 + 1013904223
        assert_eq!(g.next_u32(), 1_015_568_748);
    }

    #[test]
    fn seed_fold_is_pinned() {
        // "ab" = 97 * 31 + 98 = 3105, then one LCG step.
        let mut g = SequenceGenerator::new("ab");
        let expected = 3105u32.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        assert_eq!(g.next_u32(), expected);
    }

    #[test]
    fn long_seed_wraps_instead_of_overflowing() {
        let seed = "z".repeat(10_000);
        let mut a = SequenceGenerator::new(&seed);
        let mut b = SequenceGenerator::new(&seed);
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn next_f64_in_unit_interval() {
        let mut g = SequenceGenerator::new("unit");
        for _ in 0..10_000 {
            let v = g.next_f64();
            assert!((0.0..1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn next_int_respects_inclusive_bounds() {
        let mut g = SequenceGenerator::new("bounds");
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..10_000 {
            let v = g.next_int(3, 9);
            assert!((3..=9).contains(&v));
            seen_min |= v == 3;
            seen_max |= v == 9;
        }
        assert!(seen_min && seen_max, "both endpoints should be reachable");
    }

    #[test]
    fn next_int_degenerate_range() {
        let mut g = SequenceGenerator::new("one");
        for _ in 0..100 {
            assert_eq!(g.next_int(42, 42), 42);
        }
    }

    #[test]
    fn next_int_matches_float_definition() {
        let mut a = SequenceGenerator::new("match");
        let mut b = SequenceGenerator::new("match");
        for _ in 0..1000 {
            let int = a.next_int(0, 9999);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let float = (b.next_f64() * 10_000.0).floor() as usize;
            assert_eq!(int, float);
        }
    }
}
