// Headless host: every collaborator the engine needs, in memory.
//
// `HeadlessHost` bundles a `VoxelWorld`, a straight-line `WalkingNavigator`,
// a 36-slot `SlotInventory` and an `EffectLog` that records presentation
// calls instead of drawing them. Tests, benches and tools drive the engine
// through it exactly the way a game host would: build a `HostEnv` with
// `env()`, tick, then `advance()` to let the navigator move.
//
// The navigator ignores terrain. It walks in a straight line at the
// requested speed (voxels per tick) and arrives exactly on its target.
// Setting `blocked` makes every path request fail, which is how tests
// exercise stuck detection.
//
// See also: `host.rs` for the collaborator traits, `world.rs` for
// `VoxelWorld`, `inventory.rs` for `SlotInventory`.

use crate::host::{Effects, HostEnv, Navigator};
use crate::inventory::SlotInventory;
use crate::types::{AgentId, Hand, MaterialId, Pos3, VoxelCoord, dist_sq3};
use crate::world::{MaterialTable, VoxelWorld};

/// Slots in the agent's inventory.
pub const AGENT_SLOTS: usize = 36;

#[derive(Clone, Debug, Default)]
pub struct WalkingNavigator {
    position: Pos3,
    target: Option<Pos3>,
    speed: f64,
    /// Every path request fails while set.
    pub blocked: bool,
    pub teleports: u32,
}

impl WalkingNavigator {
    pub fn new(position: Pos3) -> Self {
        Self { position, ..Self::default() }
    }

    pub fn target(&self) -> Option<Pos3> {
        self.target
    }

    /// Move one tick toward the target.
    pub fn advance(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        let dist = dist_sq3(self.position, target).sqrt();
        if dist <= self.speed {
            self.position = target;
            self.target = None;
            return;
        }
        let t = self.speed / dist;
        for (p, goal) in self.position.iter_mut().zip(target) {
            *p += (goal - *p) * t;
        }
    }
}

impl Navigator for WalkingNavigator {
    fn position(&self) -> Pos3 {
        self.position
    }

    fn start_moving_to(&mut self, target: Pos3, speed: f64) -> bool {
        if self.blocked {
            self.target = None;
            return false;
        }
        self.target = Some(target);
        self.speed = speed.max(0.01);
        true
    }

    fn is_idle(&self) -> bool {
        self.target.is_none()
    }

    fn teleport(&mut self, target: Pos3) {
        self.position = target;
        self.target = None;
        self.teleports += 1;
    }

    fn stop(&mut self) {
        self.target = None;
    }
}

/// Presentation calls, recorded in order.
#[derive(Clone, Debug, Default)]
pub struct EffectLog {
    pub animations: Vec<(Hand, VoxelCoord, Option<VoxelCoord>)>,
    pub stages: Vec<(Hand, VoxelCoord, Option<u8>)>,
    pub particles: Vec<(VoxelCoord, MaterialId)>,
    pub cues: Vec<AgentId>,
}

impl EffectLog {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Effects for EffectLog {
    fn begin_hand_animation(&mut self, hand: Hand, target: VoxelCoord, preview: Option<VoxelCoord>) {
        self.animations.push((hand, target, preview));
    }

    fn breaking_stage(&mut self, _agent: AgentId, hand: Hand, pos: VoxelCoord, stage: Option<u8>) {
        self.stages.push((hand, pos, stage));
    }

    fn particle_burst(&mut self, pos: VoxelCoord, material: MaterialId) {
        self.particles.push((pos, material));
    }

    fn resource_cue(&mut self, agent: AgentId) {
        self.cues.push(agent);
    }
}

pub struct HeadlessHost {
    pub world: VoxelWorld,
    pub nav: WalkingNavigator,
    pub inventory: SlotInventory,
    pub effects: EffectLog,
}

impl HeadlessHost {
    pub fn new(size_x: u32, size_y: u32, size_z: u32, materials: MaterialTable, agent: Pos3) -> Self {
        Self {
            world: VoxelWorld::new(size_x, size_y, size_z, materials),
            nav: WalkingNavigator::new(agent),
            inventory: SlotInventory::new(AGENT_SLOTS),
            effects: EffectLog::default(),
        }
    }

    /// Borrow every collaborator for one engine call.
    pub fn env(&mut self) -> HostEnv<'_> {
        HostEnv {
            world: &mut self.world,
            nav: &mut self.nav,
            inventory: &mut self.inventory,
            effects: &mut self.effects,
        }
    }

    /// End of tick: let the navigator move.
    pub fn advance(&mut self) {
        self.nav.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walker_arrives_exactly() {
        let mut nav = WalkingNavigator::new([0.0, 1.0, 0.0]);
        assert!(nav.start_moving_to([3.0, 1.0, 4.0], 2.0));
        nav.advance();
        assert!(!nav.is_idle());
        assert!((dist_sq3(nav.position(), [0.0, 1.0, 0.0]) - 4.0).abs() < 1e-9);
        nav.advance();
        nav.advance();
        assert!(nav.is_idle());
        assert_eq!(nav.position(), [3.0, 1.0, 4.0]);
    }

    #[test]
    fn blocked_walker_stays_idle() {
        let mut nav = WalkingNavigator::new([0.0; 3]);
        nav.blocked = true;
        assert!(!nav.start_moving_to([5.0, 0.0, 0.0], 1.0));
        assert!(nav.is_idle());
        nav.teleport([5.0, 0.0, 0.0]);
        assert_eq!((nav.position(), nav.teleports), ([5.0, 0.0, 0.0], 1));
    }
}
