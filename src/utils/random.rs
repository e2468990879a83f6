// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Seeded randomness for per-object variability

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Deterministic random helper.
///
/// Styling rules reseed it per object (usually from the node name) so that two
/// runs over the same input produce identical scenes.
#[derive(Debug, Clone)]
pub struct DddRandom {
    rng: StdRng,
}

impl DddRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reseed from an integer
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Reseed from a string; stable across processes and platforms
    pub fn seed_str(&mut self, key: &str) {
        self.seed(stable_hash(key));
    }

    /// Random angle in radians in [0, 2π)
    pub fn angle(&mut self) -> f64 {
        self.rng.gen::<f64>() * std::f64::consts::TAU
    }

    /// Uniform value in [a, b); returns `a` when the range is empty,
    /// unbounded or NaN
    pub fn uniform(&mut self, a: f64, b: f64) -> f64 {
        if !(a < b) || !(b - a).is_finite() {
            return a;
        }
        self.rng.gen_range(a..b)
    }

    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Pick a value with probability proportional to its weight.
    /// Returns `None` when there are no positive weights.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [(T, f64)]) -> Option<&'a T> {
        let weights: Vec<f64> = items.iter().map(|(_, w)| w.max(0.0)).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        Some(&items[dist.sample(&mut self.rng)].0)
    }
}

impl Default for DddRandom {
    fn default() -> Self {
        Self::new(0)
    }
}

/// 64-bit hash of a string derived from its SHA-256 digest
pub fn stable_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sequences_repeat() {
        let mut a = DddRandom::default();
        let mut b = DddRandom::default();
        a.seed_str("Building 12");
        b.seed_str("Building 12");
        for _ in 0..10 {
            assert_eq!(a.uniform(0.0, 10.0), b.uniform(0.0, 10.0));
        }
    }

    #[test]
    fn test_angle_range() {
        let mut r = DddRandom::new(7);
        for _ in 0..100 {
            let a = r.angle();
            assert!((0.0..std::f64::consts::TAU).contains(&a));
        }
    }

    #[test]
    fn test_weighted_choice_skips_zero_weight() {
        let mut r = DddRandom::new(3);
        let items = [("never", 0.0), ("always", 1.0)];
        for _ in 0..20 {
            assert_eq!(r.weighted_choice(&items), Some(&"always"));
        }
        let empty: [(&str, f64); 0] = [];
        assert_eq!(r.weighted_choice(&empty), None);
    }

    #[test]
    fn test_empty_uniform_range() {
        let mut r = DddRandom::new(1);
        assert_eq!(r.uniform(2.0, 2.0), 2.0);
        assert!(r.choice::<u8>(&[]).is_none());
    }

    #[test]
    fn test_uniform_degenerate_bounds() {
        let mut r = DddRandom::new(1);
        assert!(r.uniform(f64::NAN, 1.0).is_nan());
        assert_eq!(r.uniform(0.0, f64::NAN), 0.0);
        assert_eq!(r.uniform(0.0, f64::INFINITY), 0.0);
        assert_eq!(r.uniform(5.0, 1.0), 5.0);
    }
}
