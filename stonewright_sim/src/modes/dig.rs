// Dig crew: the top-down planner paired with the dual-hand miner.
//
// The digging modes (excavation, mining, tunnel) queue voxels here and tick
// the crew. The planner walks the agent to a stand for the highest queued
// target; its action hands that target to an idle hand and, when the
// planner's preview is also solid and in reach, gives the preview to the
// other hand so both work at once. The action returns `Pending` until a
// hand breaks the block; the miner's outcomes then remove targets from the
// planner.
//
// Filtering happens once, at enqueue time: air, unbreakable blocks, the
// boundary marker and ores the `OrePolicy` forbids never enter the queue.
//
// Optional behaviours:
// - vein following (mining mode): every broken ore queues its solid
//   neighbours, each at most once. The memory behind that is dropped when
//   the crew drains and trimmed to the agent's surroundings when it grows
//   past `VEIN_MEMORY`;
// - floor support (mining and tunnel): a missing block under the agent's
//   feet is patched with the inventory's building-block fallback.
//
// Busy hands are saved under `dig.hand.main` / `dig.hand.off` so a resumed
// task carries on breaking the same blocks with their progress intact.
//
// See also: `mining.rs` for sessions and `VeinFollower`, `planner.rs`.

use crate::config::{OrePolicy, PlannerConfig};
use crate::error::EngineError;
use crate::event::EngineEvent;
use crate::host::{HostEnv, Inventory};
use crate::mining::{DualHandMiner, MiningOutcome, MiningSession, NoHooks, VEIN_MEMORY, VeinFollower};
use crate::persist::StateRecord;
use crate::planner::{BuildOrder, PlaceResult, PlacementPlanner, in_reach};
use crate::strategy::TaskContext;
use crate::types::{Hand, MaterialId, VoxelCoord};
use crate::world::WorldAccess;

const HAND_KEYS: [&str; 2] = ["dig.hand.main", "dig.hand.off"];

/// How far from the agent vein memory survives a trim.
const VEIN_KEEP_RADIUS: i32 = 16;

/// Hand sessions written by `DigCrew::write_hands`, if both are present.
pub fn read_hands(record: &StateRecord) -> Result<Option<[MiningSession; 2]>, EngineError> {
    let main = record.get(HAND_KEYS[0])?;
    let off = record.get(HAND_KEYS[1])?;
    Ok(main.zip(off).map(|(m, o)| [m, o]))
}

/// What a crew tick amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigStatus {
    Working,
    /// Queue empty and both hands idle.
    Drained,
    /// No free inventory slot; go unload.
    InventoryFull,
}

/// Whether the policy lets the agent mine ore with what it carries.
pub fn ore_allowed(policy: OrePolicy, inventory: &dyn Inventory) -> bool {
    policy.allows(None)
        || (0..inventory.slot_count())
            .filter_map(|i| inventory.slot(i))
            .any(|s| s.kind.as_tool().is_some_and(|t| policy.allows(Some(t))))
}

/// Whether `pos` should be dug at all.
pub fn diggable(
    world: &dyn WorldAccess,
    inventory: &dyn Inventory,
    pos: VoxelCoord,
    policy: OrePolicy,
    marker: Option<MaterialId>,
) -> bool {
    let material = world.material(pos);
    let props = world.props(material);
    if !props.solid || props.hardness < 0.0 || marker == Some(material) {
        return false;
    }
    !props.ore || ore_allowed(policy, inventory)
}

#[derive(Clone, Debug)]
pub struct DigCrew {
    planner: PlacementPlanner,
    miner: DualHandMiner,
    vein: Option<VeinFollower>,
    floor_support: bool,
}

impl DigCrew {
    pub fn new(config: PlannerConfig, follow_veins: bool, floor_support: bool) -> Self {
        Self {
            planner: PlacementPlanner::new(config, BuildOrder::TopDown),
            miner: DualHandMiner::new(),
            vein: follow_veins.then(VeinFollower::new),
            floor_support,
        }
    }

    pub fn planner(&self) -> &PlacementPlanner {
        &self.planner
    }

    pub fn miner(&self) -> &DualHandMiner {
        &self.miner
    }

    pub fn is_drained(&self) -> bool {
        self.planner.is_empty() && self.miner.is_idle()
    }

    /// Queue cells, dropping ones not worth digging. Returns how many were
    /// queued.
    pub fn enqueue(
        &mut self,
        ctx: &TaskContext,
        host: &HostEnv<'_>,
        cells: impl IntoIterator<Item = VoxelCoord>,
    ) -> usize {
        let policy = ctx.settings.ore_policy;
        let marker = ctx.config.boundary_marker;
        let mut queued = 0;
        for pos in cells {
            if let Some(v) = self.vein.as_mut() {
                v.mark_seen(pos);
            }
            if diggable(&*host.world, &*host.inventory, pos, policy, marker) && !self.planner.contains(pos) {
                self.planner.push(pos);
                queued += 1;
            }
        }
        queued
    }

    /// Patch a missing block under the agent's feet. Returns whether a
    /// block was placed.
    pub fn support_floor(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> bool {
        let below = VoxelCoord::containing(host.nav.position()).down();
        if host.world.is_solid(below) || below.y < host.world.min_y() {
            return false;
        }
        let Some(material) = host.inventory.building_block_fallback() else {
            return false;
        };
        if !host.inventory.take_block(material) {
            return false;
        }
        log::debug!("patching floor at {} with {}", below, material.0);
        host.world.set_material(below, material);
        ctx.blocks_placed += 1;
        ctx.events.push(EngineEvent::BlockPlaced { pos: below, material });
        true
    }

    pub fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> DigStatus {
        if host.inventory.is_full() {
            return DigStatus::InventoryFull;
        }
        if self.floor_support {
            self.support_floor(ctx, host);
        }

        let reach = self.planner.config().reach;
        let miner = &mut self.miner;
        self.planner.tick(host, &mut ctx.events, |host, pos, preview| {
            if !host.world.is_solid(pos) {
                return PlaceResult::Placed;
            }
            let idle_hand = |m: &DualHandMiner| Hand::ALL.into_iter().find(|&h| m.session(h).is_idle());
            if miner.hand_on(pos).is_none() {
                if let Some(hand) = idle_hand(miner) {
                    miner.assign(hand, pos, preview);
                }
            }
            if let Some(next) = preview.filter(|&n| n != pos) {
                let agent = host.nav.position();
                if miner.hand_on(next).is_none() && host.world.is_solid(next) && in_reach(agent, next, reach) {
                    if let Some(hand) = idle_hand(miner) {
                        miner.assign(hand, next, None);
                    }
                }
            }
            PlaceResult::Pending
        });

        // A hand left behind by the agent's walk gives its target back.
        let agent = host.nav.position();
        for hand in Hand::ALL {
            if let Some(t) = self.miner.session(hand).target() {
                if !in_reach(agent, t, reach) {
                    self.miner.cancel(hand, ctx.agent, host);
                }
            }
        }

        let outcomes = match self.vein.as_mut() {
            Some(vein) => self.miner.tick(ctx.agent, host, &ctx.config.mining, vein),
            None => self.miner.tick(ctx.agent, host, &ctx.config.mining, &mut NoHooks),
        };
        for (hand, outcome) in Hand::ALL.into_iter().zip(outcomes) {
            match outcome {
                MiningOutcome::Broken { pos, material } => {
                    self.planner.remove(pos);
                    ctx.blocks_mined += 1;
                    ctx.events.push(EngineEvent::BlockMined { pos, material, hand });
                }
                MiningOutcome::AlreadyAir(pos) | MiningOutcome::Unbreakable(pos) => {
                    self.planner.remove(pos);
                }
                MiningOutcome::Idle | MiningOutcome::Working { .. } => {}
            }
        }

        if let Some(vein) = self.vein.as_mut() {
            let found = vein.take_found();
            if !found.is_empty() {
                log::debug!("vein follow-up queued {} block(s)", found.len());
            }
            let policy = ctx.settings.ore_policy;
            let marker = ctx.config.boundary_marker;
            for pos in found {
                if diggable(&*host.world, &*host.inventory, pos, policy, marker) {
                    self.planner.push(pos);
                }
            }
            if self.planner.is_empty() && self.miner.is_idle() {
                vein.clear();
            } else if vein.remembered() > VEIN_MEMORY {
                vein.forget_beyond(VoxelCoord::containing(host.nav.position()), VEIN_KEEP_RADIUS);
            }
        }

        if self.is_drained() { DigStatus::Drained } else { DigStatus::Working }
    }

    /// Drop every target and release both hands.
    pub fn cancel(&mut self, ctx: &TaskContext, host: &mut HostEnv<'_>) {
        self.miner.cancel_all(ctx.agent, host);
        self.planner.clear();
        if let Some(v) = self.vein.as_mut() {
            v.clear();
        }
    }

    /// Save both hands, unless both are idle.
    pub fn write_hands(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if self.miner.is_idle() {
            return Ok(());
        }
        for (key, session) in HAND_KEYS.into_iter().zip(self.miner.snapshot()) {
            record.put(key, &session)?;
        }
        Ok(())
    }

    /// Put saved hands back to work. Their targets are queued again so the
    /// crew is not drained until they break.
    pub fn restore(&mut self, sessions: [MiningSession; 2]) {
        for s in sessions.iter() {
            if let Some(t) = s.target() {
                self.planner.push(t);
            }
        }
        self.miner.restore(sessions);
    }
}
