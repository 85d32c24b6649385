// Tunnel slices.
//
// Slice `i` is the `width × height` rectangle `i` steps forward of the
// origin, centred laterally on it and rising from the origin's level.
// Cells come top row first so nothing is undercut.

use super::cross_section;
use crate::types::{Facing, VoxelCoord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSlicer {
    origin: VoxelCoord,
    facing: Facing,
    width: u32,
    height: u32,
    length: u32,
    next_slice: u32,
}

impl TunnelSlicer {
    pub fn new(origin: VoxelCoord, facing: Facing, width: u32, height: u32, length: u32) -> Self {
        Self {
            origin,
            facing,
            width: width.max(1),
            height: height.max(1),
            length: length.max(1),
            next_slice: 0,
        }
    }

    pub fn cursor(&self) -> u32 {
        self.next_slice
    }

    pub fn set_cursor(&mut self, slice: u32) {
        self.next_slice = slice.min(self.length);
    }

    pub fn is_done(&self) -> bool {
        self.next_slice >= self.length
    }

    pub fn slice(&self, i: u32) -> Vec<VoxelCoord> {
        let mut out = Vec::with_capacity((self.width * self.height) as usize);
        for up in (0..self.height as i32).rev() {
            for right in cross_section(self.width) {
                out.push(self.facing.local_to_world(self.origin, i as i32, right, up));
            }
        }
        out
    }

    pub fn next_slice(&mut self) -> Option<Vec<VoxelCoord>> {
        if self.is_done() {
            return None;
        }
        let cells = self.slice(self.next_slice);
        self.next_slice += 1;
        Some(cells)
    }
}
