// Path segments laid behind a tracked actor.
//
// The tracker keeps an anchor: the ground voxel where the last segment
// ended. Once the actor is at least `trigger` voxels away horizontally, a
// segment of `segment_len` centreline voxels is emitted from the anchor
// toward the actor along the dominant axis, and the anchor moves to its
// end. The centreline climbs or descends toward the actor's ground level
// by at most one voxel per step.
//
// Each centreline voxel gets a cross-section `width` wide. Every emitted
// cell carries a gradient scalar in `[0, G - 1]`: the lateral distance
// from the centreline as a fraction of the half-width. When the direction
// changes between segments, the cross-section at the join is widened by
// one cell each side so the turn leaves no diagonal gap.

use super::cross_section;
use crate::types::{Facing, Pos3, VoxelCoord, horizontal_dist_sq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cell of a path segment and its gradient scalar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathCell {
    pub pos: VoxelCoord,
    pub scalar: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTracker {
    anchor: Option<VoxelCoord>,
    facing: Option<Facing>,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<VoxelCoord> {
        self.anchor
    }

    /// The ground voxel under a standing position.
    pub fn ground_under(pos: Pos3) -> VoxelCoord {
        VoxelCoord::containing(pos).down()
    }

    /// Feed the actor's position. Returns the cells of a new segment, or
    /// nothing if the actor has not moved far enough.
    pub fn update(&mut self, actor: Pos3, width: u32, trigger: f64, segment_len: u32, g: usize) -> Vec<PathCell> {
        let ground = Self::ground_under(actor);
        let Some(anchor) = self.anchor else {
            self.anchor = Some(ground);
            return Vec::new();
        };
        let from = anchor.center();
        if horizontal_dist_sq(from, actor) < trigger * trigger {
            return Vec::new();
        }

        let dir = Facing::from_delta(actor[0] - from[0], actor[2] - from[2]);
        let (sx, sz) = dir.step();
        let forward_dist = ((ground.x - anchor.x) * sx + (ground.z - anchor.z) * sz).max(1);
        let slope = ((ground.y - anchor.y) as f64 / forward_dist as f64).clamp(-1.0, 1.0);

        let offsets = cross_section(width);
        let half = (*offsets.start()).abs().max(*offsets.end()).max(1) as f64;
        let top = g.saturating_sub(1) as f64;
        let scalar = |o: i32| ((o.abs() as f64 / half).min(1.0)) * top;

        let mut cells: BTreeMap<VoxelCoord, f64> = BTreeMap::new();
        let turned = self.facing.is_some_and(|f| f != dir);
        if self.facing.is_none() || turned {
            // First segment paves its start; a turn widens the join.
            let pad = i32::from(turned);
            for o in (offsets.start() - pad)..=(offsets.end() + pad) {
                cells.entry(dir.local_to_world(anchor, 0, o, 0)).or_insert(scalar(o));
            }
        }
        let mut last = anchor;
        for i in 1..=segment_len.max(1) as i32 {
            let dy = (slope * i as f64).round() as i32;
            let centre = dir.local_to_world(anchor, i, 0, dy);
            for o in offsets.clone() {
                cells.entry(dir.local_to_world(centre, 0, o, 0)).or_insert(scalar(o));
            }
            last = centre;
        }
        self.anchor = Some(last);
        self.facing = Some(dir);
        cells.into_iter().map(|(pos, scalar)| PathCell { pos, scalar }).collect()
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.facing = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_only_anchors() {
        let mut t = PathTracker::new();
        assert!(t.update([0.5, 1.0, 0.5], 3, 4.0, 3, 3).is_empty());
        assert_eq!(t.anchor(), Some(VoxelCoord::new(0, 0, 0)));
    }

    #[test]
    fn segment_emitted_after_trigger_distance() {
        let mut t = PathTracker::new();
        t.update([0.5, 1.0, 0.5], 3, 4.0, 3, 3);
        assert!(t.update([3.5, 1.0, 0.5], 3, 4.0, 3, 3).is_empty());
        let cells = t.update([5.5, 1.0, 0.5], 3, 4.0, 3, 3);
        // Start cross-section plus three centreline steps, 3 wide each.
        assert_eq!(cells.len(), 12);
        assert_eq!(t.anchor(), Some(VoxelCoord::new(3, 0, 0)));
        let centre = cells.iter().find(|c| c.pos == VoxelCoord::new(2, 0, 0)).unwrap();
        assert_eq!(centre.scalar, 0.0);
        let edge = cells.iter().find(|c| c.pos == VoxelCoord::new(2, 0, 1)).unwrap();
        assert_eq!(edge.scalar, 2.0);
    }

    #[test]
    fn turn_widens_the_join() {
        let mut t = PathTracker::new();
        t.update([0.5, 1.0, 0.5], 3, 4.0, 3, 3);
        t.update([5.5, 1.0, 0.5], 3, 4.0, 3, 3);
        // Now head south (+z) from anchor (3, 0, 0).
        let cells = t.update([3.5, 1.0, 6.5], 3, 4.0, 3, 3);
        // Join cross-section is 5 wide, then three 3-wide steps.
        assert_eq!(cells.len(), 5 + 9);
        assert!(cells.iter().any(|c| c.pos == VoxelCoord::new(5, 0, 0)));
        assert!(cells.iter().all(|c| c.scalar <= 2.0));
    }

    #[test]
    fn climbs_at_most_one_per_step() {
        let mut t = PathTracker::new();
        t.update([0.5, 1.0, 0.5], 1, 4.0, 3, 1);
        let cells = t.update([6.5, 9.0, 0.5], 1, 4.0, 3, 1);
        let ys: Vec<i32> = cells.iter().map(|c| c.pos.y).collect();
        assert_eq!(ys, vec![0, 1, 2, 3]);
    }
}
