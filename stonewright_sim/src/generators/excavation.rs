// Excavation rings grown out from a corner.
//
// Ring `k` is the L-shaped set of columns at local `(forward, right)` with
// `max(forward, right) == k`, both in `[0, k]`. Ring 0 is the corner column
// itself, ring 1 the three columns around it, and so on, so after `k`
// rings a `(k+1) × (k+1)` square has been cleared. Each column spans from
// `height - 1` above the origin down to `depth` below it.
//
// With `depth == 0` the pit goes down to the world floor and the number of
// rings is bounded by marker blocks instead: the ring that would touch a
// marker at the origin level (or just below it) is never dug. `max_rings`
// caps runaway pits when no marker is ever found.

use crate::types::{Facing, MaterialId, VoxelCoord};
use crate::world::WorldAccess;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingExcavator {
    origin: VoxelCoord,
    facing: Facing,
    rings: u32,
    height: u32,
    /// 0 digs to the world floor.
    depth: u32,
    max_rings: u32,
    next_ring: u32,
    bounded: bool,
}

impl RingExcavator {
    pub fn new(origin: VoxelCoord, facing: Facing, rings: u32, height: u32, depth: u32, max_rings: u32) -> Self {
        Self {
            origin,
            facing,
            rings: rings.max(1),
            height: height.max(1),
            depth,
            max_rings: max_rings.max(1),
            next_ring: 0,
            bounded: false,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.depth == 0
    }

    pub fn cursor(&self) -> u32 {
        self.next_ring
    }

    pub fn set_cursor(&mut self, ring: u32) {
        self.next_ring = ring;
    }

    fn ring_limit(&self) -> u32 {
        if self.is_infinite() { self.max_rings } else { self.rings }
    }

    pub fn is_done(&self) -> bool {
        self.bounded || self.next_ring >= self.ring_limit()
    }

    /// Columns `(forward, right)` of ring `k`, in a fixed order.
    pub fn ring_columns(k: u32) -> Vec<(i32, i32)> {
        let k = k as i32;
        let mut out: Vec<(i32, i32)> = (0..=k).map(|r| (k, r)).collect();
        out.extend((0..k).rev().map(|f| (f, k)));
        out
    }

    fn column_range(&self, world: &dyn WorldAccess) -> (i32, i32) {
        let top = self.origin.y + self.height as i32 - 1;
        let bottom = if self.is_infinite() {
            world.min_y()
        } else {
            self.origin.y - self.depth as i32
        };
        (bottom, top)
    }

    /// Cells of the next ring, top level first within each column. `None`
    /// once the pit is finished.
    pub fn next_ring(&mut self, world: &dyn WorldAccess, marker: Option<MaterialId>) -> Option<Vec<VoxelCoord>> {
        if self.is_done() {
            return None;
        }
        let k = self.next_ring;
        let columns = Self::ring_columns(k);
        if let (true, Some(marker)) = (self.is_infinite(), marker) {
            let hits_marker = columns.iter().any(|&(f, r)| {
                let c = self.facing.local_to_world(self.origin, f, r, 0);
                world.material(c) == marker || world.material(c.down()) == marker
            });
            if hits_marker {
                log::info!("excavation bounded by marker at ring {}", k);
                self.bounded = true;
                return None;
            }
        }
        let (bottom, top) = self.column_range(world);
        let mut cells = Vec::with_capacity(columns.len() * (top - bottom + 1).max(0) as usize);
        for (f, r) in columns {
            let base = self.facing.local_to_world(self.origin, f, r, 0);
            for y in (bottom..=top).rev() {
                cells.push(VoxelCoord::new(base.x, y, base.z));
            }
        }
        self.next_ring += 1;
        Some(cells)
    }
}
