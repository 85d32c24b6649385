// Tree mode: grow a tree from a captured sample by wave function collapse.
//
// The captured template is the sample. It is cut into tiles at the
// preset's tile size and a `TreeCollapse` tiles the preset's grid, rooted
// at the origin (or the agent's feet). Building and solving interleave:
// - a decided cell that is not yet built, and sits on the grid floor or on
//   a built cell, becomes the next batch, lowest first, once the inventory
//   holds every block it still needs;
// - with nothing decided to build, the solver runs `wfc_steps_per_tick`
//   steps;
// - a settled grid with every cell built is a finished tree.
//
// Built cells are committed, so a solver restart after a contradiction
// never undoes anything already standing. Running out of restarts halts
// the task.
//
// The tile set is rebuilt from the template on resume; the solver state
// itself is persisted, so the same tree keeps growing.

use super::{BuildStatus, Builder, origin_or_feet};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::wfc::{CollapseStep, TileSet, TreeCollapse};
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::{MaterialId, VoxelCoord};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct TreeStrategy {
    tiles: Option<TileSet>,
    wfc: Option<TreeCollapse>,
    anchor: Option<VoxelCoord>,
    builder: Option<Builder>,
    /// Grid cell whose voxels are the builder's current batch.
    in_flight: Option<usize>,
    /// Committed cell to re-batch before anything else (after a depot run
    /// or a resume).
    replay: Option<usize>,
    done: bool,
}

impl TreeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collapse(&self) -> Option<&TreeCollapse> {
        self.wfc.as_ref()
    }

    fn build_solver(&mut self, ctx: &TaskContext, host: &HostEnv<'_>) -> Result<(), HaltReason> {
        let template = ctx.template.as_ref().ok_or(HaltReason::MissingTemplate)?;
        let preset = ctx.settings.tiling_preset;
        let tiles = TileSet::extract(template, preset.tile_size()).ok_or(HaltReason::MissingTemplate)?;
        let anchor = *self.anchor.get_or_insert_with(|| origin_or_feet(ctx, host));
        let wfc = match self.wfc.take() {
            Some(saved) if saved.grid() == preset.grid() => saved,
            _ => TreeCollapse::new(&tiles, preset.grid(), ctx.seed),
        };
        log::info!("tree at {}: {} tile(s), grid {:?}", anchor, tiles.len(), wfc.grid());
        self.tiles = Some(tiles);
        self.wfc = Some(wfc);
        Ok(())
    }
}

/// First material the inventory holds too little of for `cells`, counting
/// only cells not already built.
fn shortfall(cells: &[(VoxelCoord, MaterialId)], host: &HostEnv<'_>) -> Option<MaterialId> {
    let mut needed: BTreeMap<MaterialId, u32> = BTreeMap::new();
    for &(pos, m) in cells {
        if host.world.material(pos) != m {
            *needed.entry(m).or_insert(0) += 1;
        }
    }
    needed
        .into_iter()
        .find(|&(m, n)| host.inventory.count_blocks(m) < n)
        .map(|(m, _)| m)
}

impl Strategy for TreeStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Tree
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        self.builder = Some(Builder::new(ctx.config.planner.clone()));
        self.build_solver(ctx, host)
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.done {
            return TickOutcome::Complete;
        }
        if self.tiles.is_none() || self.wfc.is_none() {
            if let Err(reason) = self.build_solver(ctx, host) {
                return TickOutcome::Halt(reason);
            }
        }
        let builder = self.builder.get_or_insert_with(|| Builder::new(ctx.config.planner.clone()));
        let (Some(tiles), Some(wfc), Some(anchor)) = (self.tiles.as_ref(), self.wfc.as_mut(), self.anchor) else {
            return TickOutcome::Halt(HaltReason::MissingTemplate);
        };

        if builder.is_empty() {
            if let Some(idx) = self.replay.take() {
                builder.set_batch(wfc.cell_voxels(tiles, idx, anchor), host);
                self.in_flight = Some(idx);
            } else if let Some(&idx) = wfc.buildable_cells().first() {
                let cells = wfc.cell_voxels(tiles, idx, anchor);
                if let Some(m) = shortfall(&cells, host) {
                    return TickOutcome::NeedsResources(Some(m));
                }
                wfc.commit(idx);
                log::debug!("tree cell {:?}: {} voxel(s)", wfc.coords_of(idx), cells.len());
                builder.set_batch(cells, host);
                self.in_flight = Some(idx);
            } else if wfc.is_settled() {
                log::info!("tree complete after {} restart(s)", wfc.restarts());
                self.done = true;
                return TickOutcome::Complete;
            } else {
                self.in_flight = None;
                for _ in 0..ctx.config.wfc_steps_per_tick.max(1) {
                    match wfc.step(tiles, ctx.config.wfc_max_restarts) {
                        CollapseStep::GaveUp => {
                            log::warn!("tree tiling gave up after {} restart(s)", wfc.restarts());
                            return TickOutcome::Halt(HaltReason::TilingContradiction);
                        }
                        CollapseStep::Settled => break,
                        CollapseStep::Collapsed(_) | CollapseStep::Restarted => {}
                    }
                }
                return TickOutcome::Continue;
            }
        }
        match builder.tick(ctx, host) {
            BuildStatus::NeedsResources(m) => TickOutcome::NeedsResources(Some(m)),
            BuildStatus::Working | BuildStatus::Drained => TickOutcome::Continue,
        }
    }

    fn cleanup(&mut self, _ctx: &mut TaskContext, _host: &mut HostEnv<'_>) {
        if let Some(b) = self.builder.as_mut() {
            if !b.is_empty() {
                self.replay = self.in_flight;
            }
            b.clear();
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.tiles = None;
        self.wfc = None;
        self.anchor = None;
        self.replay = None;
        self.in_flight = None;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            if let Some(b) = self.builder.as_mut() {
                b.clear();
            }
            self.tiles = None;
            self.wfc = None;
            self.anchor = None;
            self.replay = None;
            self.in_flight = None;
            self.done = false;
        }
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if let Some(wfc) = &self.wfc {
            record.put("tree.collapse", wfc)?;
        }
        if let Some(anchor) = &self.anchor {
            record.put("tree.anchor", anchor)?;
        }
        let busy = self.builder.as_ref().is_some_and(|b| !b.is_empty());
        let replay = if busy { self.in_flight } else { self.replay };
        if let Some(idx) = replay {
            record.put("tree.replay", &idx)?;
        }
        record.put("tree.done", &self.done)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.wfc = record.get("tree.collapse")?;
        self.anchor = record.get("tree.anchor")?;
        self.replay = record.get("tree.replay")?;
        self.done = record.get("tree.done")?.unwrap_or(false);
        self.tiles = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, TilingPreset};
    use crate::headless::HeadlessHost;
    use crate::host::Inventory;
    use crate::template::ModuleTemplate;
    use crate::types::{AgentId, ItemStack};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};
    use stonewright_hash::TaskSeed;

    const STONE: MaterialId = MaterialId(1);
    const LOG: MaterialId = MaterialId(17);
    const LEAVES: MaterialId = MaterialId(18);

    fn sapling() -> ModuleTemplate {
        ModuleTemplate::new([
            (VoxelCoord::new(0, 0, 0), LOG),
            (VoxelCoord::new(0, 1, 0), LOG),
            (VoxelCoord::new(0, 2, 0), LEAVES),
        ])
    }

    fn host() -> HeadlessHost {
        let mut table = MaterialTable::new();
        table.insert(STONE, MaterialProps::solid(1.5, None));
        let mut h = HeadlessHost::new(24, 16, 24, table, [5.5, 1.0, 5.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(23, 0, 23), STONE);
        h
    }

    fn ctx() -> TaskContext {
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(21), EngineConfig::default());
        ctx.template = Some(sapling());
        ctx.settings.origin = Some(VoxelCoord::new(11, 1, 11));
        ctx.settings.tiling_preset = TilingPreset::Compact;
        ctx
    }

    #[test]
    fn missing_sample_halts() {
        let mut h = host();
        let mut ctx = ctx();
        ctx.template = None;
        let mut s = TreeStrategy::new();
        assert_eq!(s.initialize(&mut ctx, &mut h.env()), Err(HaltReason::MissingTemplate));
    }

    #[test]
    fn waits_for_blocks_before_building_a_cell() {
        let mut h = host();
        let mut ctx = ctx();
        let mut s = TreeStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        // Air cells decided next to the root commit for free; the trunk
        // cell is the first that needs blocks.
        let mut outcome = TickOutcome::Continue;
        for _ in 0..20 {
            outcome = s.tick(&mut ctx, &mut h.env(), None);
            if outcome != TickOutcome::Continue {
                break;
            }
        }
        assert_eq!(outcome, TickOutcome::NeedsResources(Some(LOG)));
        assert_eq!(ctx.blocks_placed, 0);
        let root = s.collapse().map(TreeCollapse::root_index);
        assert!(root.is_some_and(|r| !s.collapse().is_some_and(|w| w.is_committed(r))));
    }

    #[test]
    fn grows_the_trunk_from_the_origin() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(LOG, 64));
        let _ = h.inventory.insert(ItemStack::blocks(LEAVES, 64));
        let mut ctx = ctx();
        let mut s = TreeStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let mut outcome = TickOutcome::Continue;
        for _ in 0..3000 {
            outcome = s.tick(&mut ctx, &mut h.env(), None);
            if outcome != TickOutcome::Continue {
                break;
            }
            h.advance();
        }
        assert_eq!(outcome, TickOutcome::Complete);
        assert!(s.collapse().is_some_and(TreeCollapse::is_done));
        assert_eq!(h.world.material(VoxelCoord::new(11, 1, 11)), LOG);
        assert_eq!(h.world.material(VoxelCoord::new(11, 2, 11)), LOG);
        assert_eq!(h.world.material(VoxelCoord::new(11, 3, 11)), LEAVES);
    }

    #[test]
    fn every_built_cell_rests_on_a_built_cell() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(LOG, 64));
        let _ = h.inventory.insert(ItemStack::blocks(LEAVES, 64));
        let mut ctx = ctx();
        let mut s = TreeStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        for _ in 0..3000 {
            let outcome = s.tick(&mut ctx, &mut h.env(), None);
            let wfc = s.collapse().unwrap();
            for idx in (0..wfc.cell_count()).filter(|&i| wfc.is_committed(i)) {
                let (x, y, z) = wfc.coords_of(idx);
                if y > 0 {
                    let below = wfc.index_of(x, y - 1, z).unwrap();
                    assert!(wfc.is_committed(below), "cell {:?} built before the one below", (x, y, z));
                }
            }
            if outcome != TickOutcome::Continue {
                break;
            }
            h.advance();
        }
        assert!(s.is_complete());
    }

    #[test]
    fn solver_state_survives_a_round_trip() {
        let mut h = host();
        let mut ctx = ctx();
        let mut s = TreeStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let mut record = StateRecord::new();
        s.write_state(&mut record).unwrap();

        let mut resumed = TreeStrategy::new();
        resumed.read_state(&record).unwrap();
        resumed.initialize(&mut ctx, &mut h.env()).unwrap();
        assert_eq!(resumed.collapse(), s.collapse());
    }
}
