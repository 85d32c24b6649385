// Dual-hand block breaking.
//
// The builder mines with both hands at once. Each hand runs a
// `MiningSession`: a target voxel, accumulated break progress, a swing
// counter and the inventory slot of the tool in use. Each hand is paced at
// a quarter of baseline speed (`MiningConfig::hand_pace`), so two hands on
// two blocks give roughly twice the throughput of one block at a time
// without any single block breaking faster than the host's own rules allow.
//
// Per tick, an active session:
// 1. Finishes immediately with no drops if the target is no longer solid
//    (another hand or the world got there first).
// 2. Aborts if the material is unbreakable (negative hardness).
// 3. Resolves a tool from the `ToolCache` when the held one is no better
//    than bare hands.
// 4. Advances progress, broadcasts the 0–9 overlay stage, and every
//    `swing_interval` swings fires a hand animation and a particle burst.
// 5. On reaching the required ticks: deposits drops (inventory first, the
//    ground for overflow), clears the voxel, wears the tool by one point
//    and resets.
//
// Modes react to outcomes through `BreakHooks` (`on_block_already_air`,
// `on_block_broken`) without the session knowing about modes. The
// ore-vein follow-up used by mining mode is one such hook
// (`VeinFollower`).
//
// See also: `tool_cache.rs`, `modes/dig.rs` which pairs the miner with the
// planner, `world.rs` for hardness/drops.
//
// **Critical constraint: determinism.** Hands tick in fixed order (main,
// then off), so when both hands target the same voxel the main hand always
// gets the drops and the off hand always sees air.

use crate::config::MiningConfig;
use crate::host::HostEnv;
use crate::tool_cache::ToolCache;
use crate::types::{AgentId, Hand, MaterialId, VoxelCoord};
use crate::world::WorldAccess;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ticks needed to break a block of `hardness` at tool `speed`, or `None`
/// if the material is unbreakable.
pub fn break_ticks(hardness: f32, speed: f32, config: &MiningConfig) -> Option<u32> {
    if hardness < 0.0 {
        return None;
    }
    let pace = (speed.max(f32::EPSILON) * config.hand_pace).max(f32::EPSILON);
    let ticks = (hardness * config.ticks_per_hardness / pace).ceil();
    Some((ticks as u32).max(1))
}

/// What a hand did this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiningOutcome {
    Idle,
    Working { stage: u8 },
    /// The target was already empty; no drops were produced.
    AlreadyAir(VoxelCoord),
    Broken { pos: VoxelCoord, material: MaterialId },
    Unbreakable(VoxelCoord),
}

/// Mode-specific reactions to session outcomes.
pub trait BreakHooks {
    fn on_block_already_air(&mut self, _hand: Hand, _pos: VoxelCoord) {}

    /// Called after the voxel has been cleared. `material` is what it was.
    fn on_block_broken(
        &mut self,
        _hand: Hand,
        _pos: VoxelCoord,
        _material: MaterialId,
        _world: &dyn WorldAccess,
    ) {
    }
}

/// No reactions.
pub struct NoHooks;

impl BreakHooks for NoHooks {}

/// One hand's break simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningSession {
    pub hand: Hand,
    target: Option<VoxelCoord>,
    preview: Option<VoxelCoord>,
    progress: u32,
    swings: u32,
    tool_slot: Option<usize>,
}

impl MiningSession {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            target: None,
            preview: None,
            progress: 0,
            swings: 0,
            tool_slot: None,
        }
    }

    pub fn target(&self) -> Option<VoxelCoord> {
        self.target
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn tool_slot(&self) -> Option<usize> {
        self.tool_slot
    }

    pub fn is_idle(&self) -> bool {
        self.target.is_none()
    }

    /// Aim at `pos`. Re-aiming at the current target keeps its progress.
    pub fn start(&mut self, pos: VoxelCoord, preview: Option<VoxelCoord>) {
        if self.target != Some(pos) {
            self.target = Some(pos);
            self.progress = 0;
            self.swings = 0;
        }
        self.preview = preview;
    }

    fn reset(&mut self) {
        self.target = None;
        self.preview = None;
        self.progress = 0;
        self.swings = 0;
    }

    /// Drop the target and clear its overlay.
    pub fn cancel(&mut self, agent: AgentId, host: &mut HostEnv<'_>) {
        if let Some(pos) = self.target {
            host.effects.breaking_stage(agent, self.hand, pos, None);
        }
        self.reset();
    }

    /// Advance one tick. `other_slot` is the tool slot held by the other
    /// hand, which this hand avoids when choosing a tool.
    pub fn tick(
        &mut self,
        agent: AgentId,
        host: &mut HostEnv<'_>,
        cache: &mut ToolCache,
        config: &MiningConfig,
        other_slot: Option<usize>,
        hooks: &mut dyn BreakHooks,
    ) -> MiningOutcome {
        let Some(pos) = self.target else {
            return MiningOutcome::Idle;
        };
        let material = host.world.material(pos);
        let props = host.world.props(material);
        if !props.solid {
            host.effects.breaking_stage(agent, self.hand, pos, None);
            self.reset();
            hooks.on_block_already_air(self.hand, pos);
            return MiningOutcome::AlreadyAir(pos);
        }

        // Keep the held tool unless it has gone missing or is no better
        // than bare hands against this material.
        let held = self
            .tool_slot
            .and_then(|slot| host.inventory.slot(slot))
            .and_then(|s| s.kind.as_tool().copied());
        let held_speed = held.map_or(1.0, |t| host.world.mining_speed(material, Some(&t)));
        if held.is_none() || held_speed <= 1.0 {
            self.tool_slot = cache
                .best_for(&*host.inventory, &*host.world, material, other_slot)
                .map(|c| c.slot);
        }
        let tool = self
            .tool_slot
            .and_then(|slot| host.inventory.slot(slot))
            .and_then(|s| s.kind.as_tool().copied());
        let speed = host.world.mining_speed(material, tool.as_ref());

        let Some(required) = break_ticks(props.hardness, speed, config) else {
            log::debug!("{:?} hand: {} is unbreakable", self.hand, pos);
            host.effects.breaking_stage(agent, self.hand, pos, None);
            self.reset();
            return MiningOutcome::Unbreakable(pos);
        };

        self.progress += 1;
        self.swings += 1;
        let stage = ((self.progress as u64 * 10 / required as u64).min(9)) as u8;
        host.effects.breaking_stage(agent, self.hand, pos, Some(stage));
        // First swing animates, then every `swing_interval` swings.
        if config.swing_interval > 0 && (self.swings - 1) % config.swing_interval == 0 {
            host.effects.begin_hand_animation(self.hand, pos, self.preview);
            host.effects.particle_burst(pos, material);
        }
        if self.progress < required {
            return MiningOutcome::Working { stage };
        }

        for stack in host.world.drops(material, tool.as_ref()) {
            if let Some(leftover) = host.inventory.insert(stack) {
                host.world.spawn_item(pos.center(), leftover);
            }
        }
        host.world.set_material(pos, MaterialId::AIR);
        if let (Some(slot), Some(t)) = (self.tool_slot, tool) {
            if t.is_damageable() && host.inventory.damage_tool(slot, 1) {
                self.tool_slot = None;
                cache.invalidate();
            }
        }
        host.effects.breaking_stage(agent, self.hand, pos, None);
        self.reset();
        hooks.on_block_broken(self.hand, pos, material, &*host.world);
        MiningOutcome::Broken { pos, material }
    }
}

/// Both hands plus the shared tool cache.
#[derive(Clone, Debug)]
pub struct DualHandMiner {
    sessions: [MiningSession; 2],
    cache: ToolCache,
}

impl Default for DualHandMiner {
    fn default() -> Self {
        Self::new()
    }
}

impl DualHandMiner {
    pub fn new() -> Self {
        Self {
            sessions: [MiningSession::new(Hand::Main), MiningSession::new(Hand::Off)],
            cache: ToolCache::new(),
        }
    }

    pub fn session(&self, hand: Hand) -> &MiningSession {
        &self.sessions[hand.index()]
    }

    pub fn assign(&mut self, hand: Hand, pos: VoxelCoord, preview: Option<VoxelCoord>) {
        self.sessions[hand.index()].start(pos, preview);
    }

    pub fn is_idle(&self) -> bool {
        self.sessions.iter().all(MiningSession::is_idle)
    }

    /// Which hand, if any, is working on `pos`.
    pub fn hand_on(&self, pos: VoxelCoord) -> Option<Hand> {
        self.sessions
            .iter()
            .find(|s| s.target == Some(pos))
            .map(|s| s.hand)
    }

    pub fn cancel(&mut self, hand: Hand, agent: AgentId, host: &mut HostEnv<'_>) {
        self.sessions[hand.index()].cancel(agent, host);
    }

    pub fn cancel_all(&mut self, agent: AgentId, host: &mut HostEnv<'_>) {
        for s in &mut self.sessions {
            s.cancel(agent, host);
        }
    }

    /// Tick main hand, then off hand.
    pub fn tick(
        &mut self,
        agent: AgentId,
        host: &mut HostEnv<'_>,
        config: &MiningConfig,
        hooks: &mut dyn BreakHooks,
    ) -> [MiningOutcome; 2] {
        let mut out = [MiningOutcome::Idle; 2];
        for hand in Hand::ALL {
            let other = self.sessions[1 - hand.index()].tool_slot;
            out[hand.index()] =
                self.sessions[hand.index()].tick(agent, host, &mut self.cache, config, other, hooks);
        }
        out
    }

    /// Session snapshots for persistence.
    pub fn snapshot(&self) -> [MiningSession; 2] {
        self.sessions.clone()
    }

    pub fn restore(&mut self, sessions: [MiningSession; 2]) {
        self.sessions = sessions;
        self.cache.invalidate();
    }
}

// ---------------------------------------------------------------------------
// Ore-vein follow-up
// ---------------------------------------------------------------------------

/// Voxels a follower remembers before it starts forgetting distant ones.
pub const VEIN_MEMORY: usize = 4096;

/// Collects the solid face neighbours of every broken ore, each voxel at
/// most once while it is remembered.
#[derive(Clone, Debug, Default)]
pub struct VeinFollower {
    seen: BTreeSet<VoxelCoord>,
    found: Vec<VoxelCoord>,
}

impl VeinFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a voxel as already queued by other means.
    pub fn mark_seen(&mut self, pos: VoxelCoord) {
        self.seen.insert(pos);
    }

    /// Voxels found since the last call.
    pub fn take_found(&mut self) -> Vec<VoxelCoord> {
        std::mem::take(&mut self.found)
    }

    pub fn remembered(&self) -> usize {
        self.seen.len()
    }

    /// Forget voxels more than `radius` blocks from `center` on any axis.
    pub fn forget_beyond(&mut self, center: VoxelCoord, radius: i32) {
        self.seen.retain(|p| {
            (p.x - center.x).abs() <= radius && (p.y - center.y).abs() <= radius && (p.z - center.z).abs() <= radius
        });
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.found.clear();
    }
}

impl BreakHooks for VeinFollower {
    fn on_block_broken(&mut self, _hand: Hand, pos: VoxelCoord, material: MaterialId, world: &dyn WorldAccess) {
        self.seen.insert(pos);
        if !world.is_ore(material) {
            return;
        }
        for n in pos.face_neighbors() {
            if world.is_solid(n) && self.seen.insert(n) {
                self.found.push(n);
            }
        }
    }
}
