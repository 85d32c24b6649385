// Captured module templates.
//
// A `ModuleTemplate` is an immutable pattern of (offset → material) cells,
// captured once from an existing structure and replayed relative to an
// anchor. Tower and wall modes replay it as a repeating module, terraforming
// uses its cells as the skeleton point set, and tree mode uses it as the
// sample the tile set is extracted from.
//
// Templates can be replayed under any of eight `Orientation`s: four quarter
// turns about the vertical axis, each optionally mirrored across the
// template's local X axis. Wall modules also carry an `exit` offset: where
// the next module's anchor goes when this one is laid.
//
// How a template is captured is the host's business; `capture_region` is
// the default box scan.
//
// See also: `modes/tower.rs`, `modes/wall.rs`, `modes/terraform.rs`,
// `wfc.rs`.

use crate::types::{MaterialId, VoxelCoord};
use crate::world::WorldAccess;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the eight rotations/mirrorings of a template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Orientation {
    /// Quarter turns clockwise seen from above, 0..4.
    pub turns: u8,
    /// Mirror across local X (negate Z) before turning.
    pub mirrored: bool,
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation { turns: 0, mirrored: false };

    pub const ALL: [Orientation; 8] = [
        Orientation { turns: 0, mirrored: false },
        Orientation { turns: 1, mirrored: false },
        Orientation { turns: 2, mirrored: false },
        Orientation { turns: 3, mirrored: false },
        Orientation { turns: 0, mirrored: true },
        Orientation { turns: 1, mirrored: true },
        Orientation { turns: 2, mirrored: true },
        Orientation { turns: 3, mirrored: true },
    ];

    /// Apply to a local offset.
    pub fn apply(self, offset: VoxelCoord) -> VoxelCoord {
        let (mut x, y, mut z) = (offset.x, offset.y, offset.z);
        if self.mirrored {
            z = -z;
        }
        for _ in 0..(self.turns % 4) {
            // +X → +Z → -X → -Z.
            (x, z) = (-z, x);
        }
        VoxelCoord::new(x, y, z)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTemplate {
    /// Non-air cells, sorted by offset.
    cells: Vec<(VoxelCoord, MaterialId)>,
    /// Offset of the following module's anchor.
    pub exit: VoxelCoord,
}

impl ModuleTemplate {
    /// Build from cells. Air cells are dropped, later duplicates win. The
    /// exit defaults to one step past the template along +X at the anchor's
    /// level.
    pub fn new(cells: impl IntoIterator<Item = (VoxelCoord, MaterialId)>) -> Self {
        let map: BTreeMap<VoxelCoord, MaterialId> = cells.into_iter().filter(|(_, m)| !m.is_air()).collect();
        let cells: Vec<_> = map.into_iter().collect();
        let max_x = cells.iter().map(|(p, _)| p.x).max().unwrap_or(0);
        Self {
            cells,
            exit: VoxelCoord::new(max_x + 1, 0, 0),
        }
    }

    pub fn with_exit(mut self, exit: VoxelCoord) -> Self {
        self.exit = exit;
        self
    }

    /// Box scan of `[min, max]` relative to `anchor`. `None` if the box
    /// holds nothing.
    pub fn capture_region(world: &dyn WorldAccess, min: VoxelCoord, max: VoxelCoord, anchor: VoxelCoord) -> Option<Self> {
        let mut cells = Vec::new();
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    let pos = VoxelCoord::new(x, y, z);
                    let m = world.material(pos);
                    if !m.is_air() {
                        cells.push((VoxelCoord::new(x - anchor.x, y - anchor.y, z - anchor.z), m));
                    }
                }
            }
        }
        (!cells.is_empty()).then(|| Self::new(cells))
    }

    pub fn cells(&self) -> &[(VoxelCoord, MaterialId)] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Inclusive bounding box of the cell offsets.
    pub fn bounds(&self) -> Option<(VoxelCoord, VoxelCoord)> {
        let first = self.cells.first()?.0;
        let (mut lo, mut hi) = (first, first);
        for (p, _) in &self.cells {
            lo = VoxelCoord::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z));
            hi = VoxelCoord::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z));
        }
        Some((lo, hi))
    }

    /// Number of distinct levels spanned, counting empty levels in between.
    pub fn height(&self) -> i32 {
        self.bounds().map_or(0, |(lo, hi)| hi.y - lo.y + 1)
    }

    /// World cells for this template at `anchor` under `orientation`.
    pub fn place_at(&self, anchor: VoxelCoord, orientation: Orientation) -> Vec<(VoxelCoord, MaterialId)> {
        self.cells
            .iter()
            .map(|&(p, m)| {
                let o = orientation.apply(p);
                (anchor.offset(o.x, o.y, o.z), m)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{MaterialTable, VoxelWorld};

    const STONE: MaterialId = MaterialId(1);
    const LOG: MaterialId = MaterialId(2);

    #[test]
    fn orientations_are_distinct_and_cycle() {
        let p = VoxelCoord::new(2, 1, 1);
        let images: std::collections::BTreeSet<_> = Orientation::ALL.iter().map(|o| o.apply(p)).collect();
        assert_eq!(images.len(), 8);
        assert_eq!(Orientation { turns: 1, mirrored: false }.apply(VoxelCoord::new(1, 0, 0)), VoxelCoord::new(0, 0, 1));
        assert_eq!(Orientation { turns: 4, mirrored: false }.apply(p), p);
    }

    #[test]
    fn new_drops_air_and_sorts() {
        let t = ModuleTemplate::new([
            (VoxelCoord::new(1, 0, 0), STONE),
            (VoxelCoord::new(0, 0, 0), MaterialId::AIR),
            (VoxelCoord::new(0, 1, 0), LOG),
        ]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cells()[0], (VoxelCoord::new(0, 1, 0), LOG));
        assert_eq!(t.exit, VoxelCoord::new(2, 0, 0));
        assert_eq!(t.height(), 2);
    }

    #[test]
    fn capture_region_is_anchor_relative() {
        let mut world = VoxelWorld::new(8, 8, 8, MaterialTable::new());
        world.set_material(VoxelCoord::new(3, 2, 3), STONE);
        world.set_material(VoxelCoord::new(3, 3, 3), LOG);
        let t = ModuleTemplate::capture_region(
            &world,
            VoxelCoord::new(2, 2, 2),
            VoxelCoord::new(4, 4, 4),
            VoxelCoord::new(3, 2, 3),
        )
        .unwrap();
        assert_eq!(t.cells(), &[(VoxelCoord::new(0, 0, 0), STONE), (VoxelCoord::new(0, 1, 0), LOG)]);
        assert!(ModuleTemplate::capture_region(&world, VoxelCoord::new(6, 6, 6), VoxelCoord::new(7, 7, 7), VoxelCoord::default()).is_none());
    }

    #[test]
    fn height_counts_empty_levels() {
        let t = ModuleTemplate::new([
            (VoxelCoord::new(0, 0, 0), STONE),
            (VoxelCoord::new(1, 0, 0), STONE),
            (VoxelCoord::new(0, 2, 0), LOG),
        ]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.height(), 3);
    }

    #[test]
    fn place_at_applies_orientation() {
        let t = ModuleTemplate::new([(VoxelCoord::new(1, 0, 0), STONE)]);
        let placed = t.place_at(VoxelCoord::new(10, 5, 10), Orientation { turns: 2, mirrored: false });
        assert_eq!(placed, vec![(VoxelCoord::new(9, 5, 10), STONE)]);
    }
}
