// Alpha shell around a captured skeleton, for terraforming.
//
// The skeleton is the captured sketch: a few solid lumps, a ridge, a rough
// hill. The shell is its morphological closing with a ball of radius alpha:
// dilate every skeleton voxel by the ball, then erode the result by the
// same ball. Closing fills gaps and concavities narrower than about alpha
// while never removing a skeleton voxel, the voxel analogue of an alpha
// shape wrapping a point cloud without spanning wide gaps.
//
// Erosion is the expensive half (every dilated voxel checks the whole
// ball), so it runs on rayon's pool. The output is sorted afterwards, so
// thread scheduling never leaks into the result.
//
// Each shell voxel is then classified for gradient selection:
// - an exposed voxel gets its own slope class from its exposed side faces
//   vs. its exposed top face (`SlopeClass::from_exposure`) and depth 0;
// - a buried voxel takes the class of the top of its column and its depth
//   is the number of shell voxels above it.
//
// See also: `gradient.rs` for `SlopeClass`, `modes/terraform.rs`.

use crate::gradient::SlopeClass;
use crate::types::VoxelCoord;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

const SIDES: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShellCell {
    pub pos: VoxelCoord,
    /// Voxels of shell above this one in its column; 0 on the surface.
    pub depth: u32,
    pub class: SlopeClass,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlphaShell {
    cells: Vec<ShellCell>,
}

/// Integer offsets within a ball of radius `alpha`.
pub fn ball_offsets(alpha: f64) -> Vec<VoxelCoord> {
    let r = alpha.max(0.0).floor() as i32;
    let r_sq = alpha * alpha;
    let mut out = Vec::new();
    for dy in -r..=r {
        for dz in -r..=r {
            for dx in -r..=r {
                if (dx * dx + dy * dy + dz * dz) as f64 <= r_sq {
                    out.push(VoxelCoord::new(dx, dy, dz));
                }
            }
        }
    }
    out
}

fn shifted(p: VoxelCoord, o: VoxelCoord) -> VoxelCoord {
    p.offset(o.x, o.y, o.z)
}

/// Morphological closing of `skeleton` by a ball of radius `alpha`, sorted.
pub fn close(skeleton: &[VoxelCoord], alpha: f64) -> Vec<VoxelCoord> {
    let ball = ball_offsets(alpha);
    let dilated: FxHashSet<VoxelCoord> = skeleton
        .iter()
        .flat_map(|&p| ball.iter().map(move |&o| shifted(p, o)))
        .collect();
    let mut candidates: Vec<VoxelCoord> = dilated.iter().copied().collect();
    candidates.sort_unstable();
    let mut closed: Vec<VoxelCoord> = candidates
        .par_iter()
        .filter(|&&c| ball.iter().all(|&o| dilated.contains(&shifted(c, o))))
        .copied()
        .collect();
    closed.sort_unstable();
    closed
}

impl AlphaShell {
    pub fn build(skeleton: &[VoxelCoord], alpha: f64) -> Self {
        let solid = close(skeleton, alpha);
        let set: FxHashSet<VoxelCoord> = solid.iter().copied().collect();

        let exposure = |p: VoxelCoord| -> (u32, u32) {
            let sides = SIDES
                .iter()
                .filter(|&&(dx, dz)| !set.contains(&p.offset(dx, 0, dz)))
                .count() as u32;
            let top = u32::from(!set.contains(&p.up()));
            (sides, top)
        };

        let cells = solid
            .iter()
            .map(|&pos| {
                let (sides, top) = exposure(pos);
                if sides + top > 0 {
                    return ShellCell { pos, depth: 0, class: SlopeClass::from_exposure(sides, top) };
                }
                let mut depth = 0;
                let mut above = pos.up();
                while set.contains(&above) {
                    depth += 1;
                    above = above.up();
                }
                let (s, t) = exposure(above.down());
                ShellCell { pos, depth, class: SlopeClass::from_exposure(s, t) }
            })
            .collect();
        Self { cells }
    }

    pub fn cells(&self) -> &[ShellCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells grouped by level, lowest first.
    pub fn layers(&self) -> BTreeMap<i32, Vec<ShellCell>> {
        let mut out: BTreeMap<i32, Vec<ShellCell>> = BTreeMap::new();
        for c in &self.cells {
            out.entry(c.pos.y).or_default().push(*c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_radius_one_is_a_plus() {
        assert_eq!(ball_offsets(1.0).len(), 7);
        assert_eq!(ball_offsets(0.0).len(), 1);
    }

    fn cube_at(x0: i32) -> Vec<VoxelCoord> {
        let mut out = Vec::new();
        for x in x0..x0 + 3 {
            for y in 0..3 {
                for z in 0..3 {
                    out.push(VoxelCoord::new(x, y, z));
                }
            }
        }
        out
    }

    #[test]
    fn closing_keeps_skeleton_and_bridges_small_gaps() {
        let mut skeleton = cube_at(0);
        skeleton.extend(cube_at(4));
        let closed = close(&skeleton, 2.0);
        for p in &skeleton {
            assert!(closed.contains(p));
        }
        assert!(closed.contains(&VoxelCoord::new(3, 1, 1)));
    }

    #[test]
    fn closing_does_not_bridge_wide_gaps() {
        let mut skeleton = cube_at(0);
        skeleton.extend(cube_at(10));
        let closed = close(&skeleton, 2.0);
        assert!(!closed.contains(&VoxelCoord::new(6, 1, 1)));
    }

    #[test]
    fn closing_is_sorted_and_deterministic() {
        let skeleton: Vec<_> = (0..6).map(|i| VoxelCoord::new(i * 2, i % 3, 0)).collect();
        let a = close(&skeleton, 2.0);
        let b = close(&skeleton, 2.0);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn flat_slab_classifies_top_and_buried() {
        let mut skeleton = Vec::new();
        for x in 0..5 {
            for z in 0..5 {
                for y in 0..2 {
                    skeleton.push(VoxelCoord::new(x, y, z));
                }
            }
        }
        let shell = AlphaShell::build(&skeleton, 0.0);
        assert_eq!(shell.len(), 50);
        let top_mid = shell.cells().iter().find(|c| c.pos == VoxelCoord::new(2, 1, 2)).unwrap();
        assert_eq!((top_mid.depth, top_mid.class), (0, SlopeClass::Horizontal));
        let buried = shell.cells().iter().find(|c| c.pos == VoxelCoord::new(2, 0, 2)).unwrap();
        assert_eq!((buried.depth, buried.class), (1, SlopeClass::Horizontal));
        let side = shell.cells().iter().find(|c| c.pos == VoxelCoord::new(0, 0, 2)).unwrap();
        assert_eq!((side.depth, side.class), (0, SlopeClass::Vertical));
        let layers = shell.layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[&0].len(), 25);
    }
}
