// Wall modules matched toward a tracked actor.
//
// The matcher holds an anchor: where the next module's origin goes. Each
// step tries all eight orientations of the template and scores each by
// where its exit lands. An orientation qualifies when its exit brings the
// anchor horizontally closer to the actor and its vertical step does not
// overshoot the actor's vertical offset (a module climbing two voxels is
// rejected when the actor is only one voxel up). The closest qualifying
// exit wins; ties go to the earlier orientation in `Orientation::ALL`.
//
// When nothing qualifies the wall takes a gap turn: the anchor moves one
// voxel toward the actor along the dominant axis and no blocks are laid.

use crate::template::{ModuleTemplate, Orientation};
use crate::types::{Facing, MaterialId, Pos3, VoxelCoord, horizontal_dist_sq};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
pub enum WallStep {
    Module {
        orientation: Orientation,
        cells: Vec<(VoxelCoord, MaterialId)>,
    },
    Gap {
        facing: Facing,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallMatcher {
    anchor: VoxelCoord,
    last: Option<Orientation>,
}

impl WallMatcher {
    pub fn new(anchor: VoxelCoord) -> Self {
        Self { anchor, last: None }
    }

    pub fn anchor(&self) -> VoxelCoord {
        self.anchor
    }

    pub fn last_orientation(&self) -> Option<Orientation> {
        self.last
    }

    /// Horizontal distance from the anchor to the actor.
    pub fn distance_to(&self, actor: Pos3) -> f64 {
        horizontal_dist_sq(self.anchor.feet(), actor).sqrt()
    }

    pub fn step(&mut self, template: &ModuleTemplate, actor: Pos3) -> WallStep {
        let actor_voxel = VoxelCoord::containing(actor);
        let dy = actor_voxel.y - self.anchor.y;
        let current = horizontal_dist_sq(self.anchor.feet(), actor);

        let mut best: Option<(f64, Orientation, VoxelCoord)> = None;
        for o in Orientation::ALL {
            let exit = o.apply(template.exit);
            let overshoots = (exit.y > 0 && exit.y > dy) || (exit.y < 0 && exit.y < dy);
            if overshoots {
                continue;
            }
            let next = self.anchor.offset(exit.x, exit.y, exit.z);
            let d = horizontal_dist_sq(next.feet(), actor);
            if d < current && best.is_none_or(|(bd, _, _)| d < bd) {
                best = Some((d, o, next));
            }
        }

        match best {
            Some((_, orientation, next)) => {
                let cells = template.place_at(self.anchor, orientation);
                self.anchor = next;
                self.last = Some(orientation);
                WallStep::Module { orientation, cells }
            }
            None => {
                let from = self.anchor.feet();
                let facing = Facing::from_delta(actor[0] - from[0], actor[2] - from[2]);
                let (sx, sz) = facing.step();
                self.anchor = self.anchor.offset(sx, 0, sz);
                WallStep::Gap { facing }
            }
        }
    }
}
