// Build modes: one `Strategy` per mode.
//
// Every mode is a thin state machine around a generator from
// `generators/` and one of two shared drivers:
// - `Builder` (here): a placement planner plus the material wanted at each
//   target, placing blocks from the inventory bottom-up;
// - `DigCrew` (`dig.rs`): a top-down planner feeding the dual-hand miner,
//   with ore filtering, vein follow-up and floor patching.
//
// Modes:
// - `path.rs`:       follows an actor, laying gradient-textured path.
// - `wall.rs`:       follows an actor, placing oriented wall modules.
// - `tower.rs`:      repeats a module upward, layer by layer.
// - `excavation.rs`: digs a pit ring by ring.
// - `mining.rs`:     branch mines forever, following ore veins.
// - `tunnel.rs`:     cuts a fixed tunnel, rotating over three depots.
// - `terraform.rs`:  fills an alpha shell with slope-classified gradients.
// - `tree.rs`:       grows a tree by wave function collapse.
//
// Generators are rebuilt lazily on the next tick after a setting change
// that invalidates them, so a mode never acts on a half-applied
// configuration.
//
// See also: `strategy.rs` for the trait and registry, `task.rs` for the
// driver that calls into modes.

pub mod dig;
pub mod excavation;
pub mod mining;
pub mod path;
pub mod terraform;
pub mod tower;
pub mod tree;
pub mod tunnel;
pub mod wall;

use crate::config::PlannerConfig;
use crate::host::HostEnv;
use crate::planner::{BuildOrder, PlaceResult, PlacementPlanner, PlannerStatus};
use crate::strategy::{PlaceLog, TaskContext, place_block};
use crate::types::{MaterialId, VoxelCoord};
use std::collections::BTreeMap;

/// Where the agent's feet are.
pub fn agent_feet(host: &HostEnv<'_>) -> VoxelCoord {
    VoxelCoord::containing(host.nav.position())
}

/// The configured origin, or the agent's feet when none is set.
pub fn origin_or_feet(ctx: &TaskContext, host: &HostEnv<'_>) -> VoxelCoord {
    ctx.settings.origin.unwrap_or_else(|| agent_feet(host))
}

/// What a `Builder` tick amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    Working,
    /// Nothing left in the batch.
    Drained,
    /// A placement failed for lack of this material.
    NeedsResources(MaterialId),
}

/// Placement driver shared by the building modes.
#[derive(Clone, Debug)]
pub struct Builder {
    planner: PlacementPlanner,
    desired: BTreeMap<VoxelCoord, MaterialId>,
}

impl Builder {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            planner: PlacementPlanner::new(config, BuildOrder::BottomUp),
            desired: BTreeMap::new(),
        }
    }

    pub fn planner(&self) -> &PlacementPlanner {
        &self.planner
    }

    /// Replace the batch. Cells already holding their material are skipped.
    pub fn set_batch(&mut self, cells: impl IntoIterator<Item = (VoxelCoord, MaterialId)>, host: &HostEnv<'_>) {
        self.desired = cells.into_iter().collect();
        let desired = &self.desired;
        let world = &*host.world;
        self.planner.set_blocks(desired.keys().copied(), host.nav.position(), |p| {
            desired.get(&p).is_some_and(|&m| world.material(p) == m)
        });
    }

    /// Add cells to the running batch.
    pub fn extend(&mut self, cells: impl IntoIterator<Item = (VoxelCoord, MaterialId)>, host: &HostEnv<'_>) {
        for (pos, material) in cells {
            if host.world.material(pos) == material {
                continue;
            }
            self.desired.insert(pos, material);
            self.planner.push(pos);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.planner.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.planner.remaining()
    }

    /// Cells of the batch not placed yet, with their materials.
    pub fn pending(&self) -> Vec<(VoxelCoord, MaterialId)> {
        self.desired
            .iter()
            .filter(|(pos, _)| self.planner.contains(**pos))
            .map(|(&pos, &m)| (pos, m))
            .collect()
    }

    /// Materials still owed by the current batch.
    pub fn outstanding(&self) -> BTreeMap<MaterialId, u32> {
        let mut out = BTreeMap::new();
        for (pos, m) in &self.desired {
            if self.planner.contains(*pos) {
                *out.entry(*m).or_insert(0) += 1;
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.planner.clear();
        self.desired.clear();
    }

    pub fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> BuildStatus {
        let desired = &self.desired;
        let mut log = PlaceLog::default();
        let status = self.planner.tick(host, &mut ctx.events, |host, pos, preview| match desired.get(&pos) {
            Some(&material) => place_block(&mut log, host, pos, material, preview),
            None => PlaceResult::Placed,
        });
        let missing = log.missing;
        log.flush(ctx);
        if let PlannerStatus::PlacedBlock(pos) = status {
            self.desired.remove(&pos);
        }
        if let Some(material) = missing {
            return BuildStatus::NeedsResources(material);
        }
        match status {
            PlannerStatus::Completed | PlannerStatus::Idle => {
                self.desired.clear();
                BuildStatus::Drained
            }
            _ => BuildStatus::Working,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::event::EngineEvent;
    use crate::headless::HeadlessHost;
    use crate::host::Inventory;
    use crate::types::{AgentId, ItemStack};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};
    use stonewright_hash::TaskSeed;

    const STONE: MaterialId = MaterialId(1);
    const PLANK: MaterialId = MaterialId(5);

    fn host() -> HeadlessHost {
        let mut table = MaterialTable::new();
        table.insert(STONE, MaterialProps::solid(1.5, None));
        table.insert(PLANK, MaterialProps::solid(2.0, None));
        let mut h = HeadlessHost::new(16, 8, 16, table, [4.5, 1.0, 4.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(15, 0, 15), STONE);
        h
    }

    fn ctx() -> TaskContext {
        TaskContext::new(AgentId(1), TaskSeed(9), EngineConfig::default())
    }

    #[test]
    fn builder_places_batch_and_drains() {
        let mut h = host();
        h.inventory.set_slot(0, Some(ItemStack::blocks(PLANK, 8)));
        let mut ctx = ctx();
        let mut b = Builder::new(ctx.config.planner.clone());
        let cells: Vec<_> = (3..6).map(|x| (VoxelCoord::new(x, 1, 6), PLANK)).collect();
        b.set_batch(cells.clone(), &h.env());
        assert_eq!(b.outstanding().get(&PLANK), Some(&3));
        let mut drained = false;
        for _ in 0..40 {
            if b.tick(&mut ctx, &mut h.env()) == BuildStatus::Drained {
                drained = true;
                break;
            }
            h.advance();
        }
        assert!(drained);
        for (pos, m) in cells {
            assert_eq!(h.world.material(pos), m);
        }
        assert_eq!(ctx.blocks_placed, 3);
        assert_eq!(h.inventory.count_blocks(PLANK), 5);
        let placed = ctx.events.iter().filter(|e| matches!(e, EngineEvent::BlockPlaced { .. })).count();
        assert_eq!(placed, 3);
    }

    #[test]
    fn builder_reports_missing_material() {
        let mut h = host();
        let mut ctx = ctx();
        let mut b = Builder::new(ctx.config.planner.clone());
        b.set_batch([(VoxelCoord::new(5, 1, 5), PLANK)], &h.env());
        let mut status = BuildStatus::Working;
        for _ in 0..10 {
            status = b.tick(&mut ctx, &mut h.env());
            if status != BuildStatus::Working {
                break;
            }
            h.advance();
        }
        assert_eq!(status, BuildStatus::NeedsResources(PLANK));
        assert!(!b.is_empty());
    }

    #[test]
    fn already_built_cells_are_skipped() {
        let mut h = host();
        h.world.set_material(VoxelCoord::new(5, 1, 5), PLANK);
        let mut b = Builder::new(EngineConfig::default().planner);
        b.set_batch([(VoxelCoord::new(5, 1, 5), PLANK), (VoxelCoord::new(6, 1, 5), PLANK)], &h.env());
        assert_eq!(b.remaining(), 1);
        b.extend([(VoxelCoord::new(5, 1, 5), PLANK)], &h.env());
        assert_eq!(b.remaining(), 1);
    }
}
