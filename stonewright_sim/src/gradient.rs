// Deterministic gradient sampling: (palette, window, position) → material.
//
// A `Gradient` is a sparse palette of up to nine materials plus a window
// `W` and a noise scale. Callers supply a scalar `s` already scaled into
// `[0, G - 1]` (distance from a path's centreline, height fraction of a
// tower, depth below a terraformed surface) and the voxel being filled. The
// sampler jitters `s` by up to `±W/2`, folds the result back into range
// with a triangle wave, and rounds to a palette index.
//
// The jitter comes from `hash_coords` of the voxel (coarsened by integer
// division by the noise scale) under the task seed. There is no random
// stream: the same voxel always lands on the same entry for one task, in
// any sampling order. With `W = 0` the hash is never consulted and the
// result is `round(s)` clamped, a hard gradient.
//
// Reflection uses period `2G` over `[-0.5, G - 0.5]`. Folding (rather than
// clamping) keeps jitter near either end of the palette from piling up on
// the edge entry.
//
// See also: `stonewright_hash` for the hash, `modes/path.rs`,
// `modes/tower.rs` and `modes/terraform.rs` for the three call sites.
//
// **Critical constraint: determinism.** `sample_index` is a pure function of
// its arguments.

use crate::types::{MaterialId, VoxelCoord};
use serde::{Deserialize, Serialize};
use stonewright_hash::{TaskSeed, hash_coords, unit_f64};

/// Palette capacity.
pub const PALETTE_SIZE: usize = 9;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub palette: [Option<MaterialId>; PALETTE_SIZE],
    /// Jitter spread in palette-index units, `0..=9`.
    pub window: f64,
    /// Spatial coarseness of the jitter; voxels in the same `n³` cell share
    /// one offset. Values below 1 are treated as 1.
    pub noise_scale: u32,
}

impl Gradient {
    /// Build from a slice; entries past the ninth are ignored.
    pub fn new(entries: &[Option<MaterialId>], window: f64, noise_scale: u32) -> Self {
        let mut palette = [None; PALETTE_SIZE];
        for (slot, entry) in palette.iter_mut().zip(entries) {
            *slot = *entry;
        }
        Self {
            palette,
            window: window.clamp(0.0, PALETTE_SIZE as f64),
            noise_scale: noise_scale.max(1),
        }
    }

    /// A one-entry hard gradient.
    pub fn solid(material: MaterialId) -> Self {
        Self::new(&[Some(material)], 0.0, 1)
    }

    /// Index of the last non-empty entry + 1.
    pub fn effective_len(&self) -> usize {
        self.palette
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |i| i + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.effective_len() == 0
    }

    /// Material for scalar `s` at `pos`, or `None` if the palette is empty.
    ///
    /// Gaps inside the effective range resolve to the nearest filled entry,
    /// preferring the lower index on ties.
    pub fn sample(&self, s: f64, pos: VoxelCoord, seed: TaskSeed) -> Option<MaterialId> {
        let g = self.effective_len();
        let index = sample_index(s, self.window, g, pos, self.noise_scale, seed)?;
        (0..g).find_map(|d| {
            let below = index.checked_sub(d).and_then(|i| self.palette[i]);
            below.or_else(|| self.palette.get(index + d).copied().flatten())
        })
    }

    /// Distinct materials in palette order.
    pub fn materials(&self) -> Vec<MaterialId> {
        let mut out: Vec<MaterialId> = Vec::new();
        for m in self.palette.iter().flatten() {
            if !out.contains(m) {
                out.push(*m);
            }
        }
        out
    }
}

/// Fold `x` into `[0, g - 1]` with a triangle wave of period `2g` over
/// `[-0.5, g - 0.5]`, then round and clamp.
pub fn reflect_index(x: f64, g: usize) -> usize {
    debug_assert!(g > 0);
    let g_f = g as f64;
    let mut m = (x + 0.5).rem_euclid(2.0 * g_f);
    if m > g_f {
        m = 2.0 * g_f - m;
    }
    clamp_index((m - 0.5).round(), g)
}

/// The palette index for scalar `s` at `pos`. `None` when `g == 0`.
pub fn sample_index(
    s: f64,
    window: f64,
    g: usize,
    pos: VoxelCoord,
    noise_scale: u32,
    seed: TaskSeed,
) -> Option<usize> {
    if g == 0 {
        return None;
    }
    let w = window.clamp(0.0, g as f64);
    if w == 0.0 {
        return Some(clamp_index(s.round(), g));
    }
    let n = noise_scale.max(1) as i32;
    let h = hash_coords(
        pos.x.div_euclid(n),
        pos.y.div_euclid(n),
        pos.z.div_euclid(n),
        seed,
    );
    let jitter = unit_f64(h) * w - w / 2.0;
    Some(reflect_index(s + jitter, g))
}

fn clamp_index(r: f64, g: usize) -> usize {
    // `as` saturates, and NaN becomes 0.
    (r.max(0.0) as usize).min(g - 1)
}

/// Surface classification used by terraforming to pick one of three
/// gradients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlopeClass {
    Vertical,
    Horizontal,
    Sloped,
}

impl SlopeClass {
    /// Classify from exposed side faces vs exposed top faces.
    pub fn from_exposure(sides: u32, tops: u32) -> Self {
        if sides + tops == 0 {
            return SlopeClass::Horizontal;
        }
        let ratio = sides as f64 / (sides + tops) as f64;
        if ratio < 1.0 / 3.0 {
            SlopeClass::Horizontal
        } else if ratio > 2.0 / 3.0 {
            SlopeClass::Vertical
        } else {
            SlopeClass::Sloped
        }
    }
}

/// The grouped gradients: one per slope class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GradientGroup {
    pub vertical: Gradient,
    pub horizontal: Gradient,
    pub sloped: Gradient,
}

impl GradientGroup {
    pub fn get(&self, class: SlopeClass) -> &Gradient {
        match class {
            SlopeClass::Vertical => &self.vertical,
            SlopeClass::Horizontal => &self.horizontal,
            SlopeClass::Sloped => &self.sloped,
        }
    }

    /// The gradient for `class`, or the first non-empty one if that class
    /// has no palette.
    pub fn resolve(&self, class: SlopeClass) -> Option<&Gradient> {
        let own = self.get(class);
        if !own.is_empty() {
            return Some(own);
        }
        [&self.horizontal, &self.sloped, &self.vertical]
            .into_iter()
            .find(|g| !g.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.vertical.is_empty() && self.horizontal.is_empty() && self.sloped.is_empty()
    }
}
