// Branch mining: a 1×2 spine with side branches.
//
// The spine runs from the origin along the facing, two voxels tall (feet
// and head level). Every `spacing + 1` spine steps, a branch of `depth`
// voxels opens to each side, also two tall. The pattern has no end; the
// owning strategy pulls one chunk (a spine step plus any branches opening
// there) whenever its queue runs low.

use crate::types::{Facing, VoxelCoord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMine {
    origin: VoxelCoord,
    facing: Facing,
    spacing: u32,
    depth: u32,
    next_step: u32,
}

impl BranchMine {
    pub fn new(origin: VoxelCoord, facing: Facing, spacing: u32, depth: u32) -> Self {
        Self {
            origin,
            facing,
            spacing: spacing.max(1),
            depth: depth.max(1),
            next_step: 0,
        }
    }

    pub fn cursor(&self) -> u32 {
        self.next_step
    }

    pub fn set_cursor(&mut self, step: u32) {
        self.next_step = step;
    }

    pub fn has_branches_at(&self, step: u32) -> bool {
        step > 0 && step % (self.spacing + 1) == 0
    }

    /// Cells of spine step `step`, with its branches.
    pub fn chunk(&self, step: u32) -> Vec<VoxelCoord> {
        let f = step as i32;
        let mut out = vec![
            self.facing.local_to_world(self.origin, f, 0, 1),
            self.facing.local_to_world(self.origin, f, 0, 0),
        ];
        if self.has_branches_at(step) {
            for side in [-1, 1] {
                for d in 1..=self.depth as i32 {
                    out.push(self.facing.local_to_world(self.origin, f, side * d, 1));
                    out.push(self.facing.local_to_world(self.origin, f, side * d, 0));
                }
            }
        }
        out
    }

    pub fn next_chunk(&mut self) -> Vec<VoxelCoord> {
        let cells = self.chunk(self.next_step);
        self.next_step += 1;
        cells
    }
}
