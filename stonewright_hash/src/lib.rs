// Deterministic spatial hashing for the build engine.
//
// Every "random" decision the engine makes (gradient jitter, WFC tile
// choice, tie-breaking between equally good cells) is a pure function of
// integer inputs: voxel coordinates, a step counter, and the `TaskSeed` of
// the task doing the work. There is no generator state to advance, so the
// same voxel always yields the same value within one task no matter how
// often or in which order it is sampled.
//
// The mixing function is the SplitMix64 finalizer (Steele, Lea & Flood,
// 2014), the same function xoshiro-family generators use to expand seeds.
// It is a bijection on `u64` with full avalanche, which is all a coordinate
// hash needs.
//
// **Critical constraint: determinism.** Every function here must produce
// identical output for identical input on every platform. Integer
// arithmetic only, except for the final conversion in `unit_f64`, which is
// exact (53-bit mantissa fill).

use serde::{Deserialize, Serialize};

/// Golden-ratio increment used by SplitMix64.
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Per-axis salts so that `(x, y, z)` and `(y, x, z)` hash differently.
const AXIS_SALT: [u64; 3] = [
    0x51_7cc1_b727_220a_95,
    0x2545_f491_4f6c_dd1d,
    0x6a09_e667_f3bc_c909,
];

/// Identity of one build task, mixed into every hash the task computes.
///
/// Derived from the agent id and a per-agent task serial, so two agents
/// building side by side (or one agent building the same thing twice) get
/// different but individually reproducible textures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskSeed(pub u64);

impl TaskSeed {
    /// Build a seed from an agent id and that agent's task serial number.
    pub fn new(agent_id: u64, task_serial: u64) -> Self {
        let mut state = agent_id ^ GOLDEN_GAMMA.rotate_left(17);
        let a = splitmix64(&mut state);
        Self(mix64(a ^ task_serial.wrapping_mul(GOLDEN_GAMMA)))
    }

    /// Derive an independent sub-seed, e.g. one per WFC restart.
    pub fn derive(self, salt: u64) -> Self {
        Self(mix64(self.0 ^ mix64(salt.wrapping_add(GOLDEN_GAMMA))))
    }
}

/// SplitMix64 step: advances `state` and returns the mixed output.
pub fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(GOLDEN_GAMMA);
    mix64(*state)
}

/// The SplitMix64 output finalizer on its own.
pub fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Hash a voxel coordinate under a task seed.
pub fn hash_coords(x: i32, y: i32, z: i32, seed: TaskSeed) -> u64 {
    let mut h = mix64(seed.0 ^ GOLDEN_GAMMA);
    for (axis, v) in [x, y, z].into_iter().enumerate() {
        // Reinterpret as unsigned so negative coordinates hash stably.
        h = mix64(h ^ (v as u32 as u64).wrapping_mul(AXIS_SALT[axis]));
    }
    h
}

/// Hash an arbitrary sequence of words under a task seed.
pub fn hash_words(words: &[u64], seed: TaskSeed) -> u64 {
    words
        .iter()
        .fold(mix64(seed.0), |h, &w| mix64(h ^ w.wrapping_mul(GOLDEN_GAMMA)))
}

/// Map a hash to a uniform `f64` in `[0, 1)`.
///
/// Uses the upper 53 bits, which fill an f64 mantissa exactly.
pub fn unit_f64(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Map a hash to an integer in `[low, high)` by multiply-high reduction.
///
/// Panics if `low >= high`.
pub fn range_u64(hash: u64, low: u64, high: u64) -> u64 {
    assert!(low < high, "range_u64: low must be less than high");
    let span = (high - low) as u128;
    low + ((hash as u128 * span) >> 64) as u64
}

/// Pick an index with probability proportional to `weights[i]`.
///
/// Returns `None` when every weight is zero (or the slice is empty).
pub fn weighted_index(hash: u64, weights: &[u32]) -> Option<usize> {
    let total: u64 = weights.iter().map(|&w| w as u64).sum();
    if total == 0 {
        return None;
    }
    let mut roll = range_u64(hash, 0, total);
    for (i, &w) in weights.iter().enumerate() {
        if roll < w as u64 {
            return Some(i);
        }
        roll -= w as u64;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_hash_is_stable() {
        let seed = TaskSeed::new(7, 1);
        for x in -20..20 {
            assert_eq!(hash_coords(x, 64, -x, seed), hash_coords(x, 64, -x, seed));
        }
    }

    #[test]
    fn axes_are_not_interchangeable() {
        let seed = TaskSeed::new(7, 1);
        assert_ne!(hash_coords(1, 2, 3, seed), hash_coords(2, 1, 3, seed));
        assert_ne!(hash_coords(1, 2, 3, seed), hash_coords(3, 2, 1, seed));
    }

    #[test]
    fn seed_changes_output() {
        let a = TaskSeed::new(7, 1);
        let b = TaskSeed::new(7, 2);
        let c = TaskSeed::new(8, 1);
        assert_ne!(hash_coords(0, 0, 0, a), hash_coords(0, 0, 0, b));
        assert_ne!(hash_coords(0, 0, 0, a), hash_coords(0, 0, 0, c));
        assert_ne!(a.derive(1), a.derive(2));
    }

    #[test]
    fn unit_f64_in_range() {
        let seed = TaskSeed::new(1, 1);
        for i in 0..10_000 {
            let v = unit_f64(hash_coords(i, i * 3, -i, seed));
            assert!((0.0..1.0).contains(&v), "unit_f64 out of range: {v}");
        }
        assert_eq!(unit_f64(0), 0.0);
        assert!(unit_f64(u64::MAX) < 1.0);
    }

    #[test]
    fn unit_f64_roughly_uniform() {
        let seed = TaskSeed::new(3, 9);
        let n = 20_000;
        let below_half = (0..n)
            .filter(|&i| unit_f64(hash_coords(i, 0, 0, seed)) < 0.5)
            .count();
        let pct = below_half as f64 / n as f64;
        assert!((0.45..0.55).contains(&pct), "got {:.3}", pct);
    }

    #[test]
    fn range_u64_within_bounds() {
        for i in 0..10_000u64 {
            let v = range_u64(mix64(i), 10, 20);
            assert!((10..20).contains(&v));
        }
        assert_eq!(range_u64(u64::MAX, 0, 5), 4);
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        for i in 0..1_000u64 {
            let idx = weighted_index(mix64(i), &[0, 3, 0, 1]).unwrap();
            assert!(idx == 1 || idx == 3);
        }
        assert_eq!(weighted_index(5, &[0, 0]), None);
        assert_eq!(weighted_index(5, &[]), None);
    }

    #[test]
    fn hash_words_order_matters() {
        let seed = TaskSeed(11);
        assert_ne!(hash_words(&[1, 2], seed), hash_words(&[2, 1], seed));
        assert_eq!(hash_words(&[1, 2], seed), hash_words(&[1, 2], seed));
    }

    #[test]
    fn seed_serialization_roundtrip() {
        let seed = TaskSeed::new(42, 3);
        let json = serde_json::to_string(&seed).unwrap();
        let restored: TaskSeed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed, restored);
    }
}
