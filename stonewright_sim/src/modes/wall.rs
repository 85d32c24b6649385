// Wall mode: lay captured wall modules toward a tracked actor.
//
// The module template is captured by the host. Whenever the builder has
// finished its batch and the actor is at least `wall_trigger_distance` from
// the matcher's anchor, the matcher picks the orientation whose exit best
// closes the distance and the module's cells become the next batch. A gap
// step lays nothing and just moves the anchor. Runs until cancelled.
//
// The matcher is saved after its last step, so the unplaced cells of that
// step's module are saved with it and re-batched on resume.

use super::{BuildStatus, Builder, agent_feet};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::wall::{WallMatcher, WallStep};
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::{MaterialId, VoxelCoord};

#[derive(Clone, Debug, Default)]
pub struct WallStrategy {
    matcher: Option<WallMatcher>,
    builder: Option<Builder>,
    modules_laid: u32,
    resume_batch: Vec<(VoxelCoord, MaterialId)>,
}

impl WallStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modules_laid(&self) -> u32 {
        self.modules_laid
    }
}

impl Strategy for WallStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Wall
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { follows_player: true, ..Capabilities::default() }
    }

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        if ctx.template.as_ref().is_none_or(|t| t.is_empty()) {
            return Err(HaltReason::MissingTemplate);
        }
        let mut builder = Builder::new(ctx.config.planner.clone());
        let batch = std::mem::take(&mut self.resume_batch);
        if !batch.is_empty() {
            log::debug!("resuming wall module with {} cell(s) left", batch.len());
            builder.set_batch(batch, host);
        }
        self.builder = Some(builder);
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, tracked: Option<&TrackedActor>) -> TickOutcome {
        let Some(template) = ctx.template.as_ref() else {
            return TickOutcome::Halt(HaltReason::MissingTemplate);
        };
        let builder = self.builder.get_or_insert_with(|| Builder::new(ctx.config.planner.clone()));
        let matcher = self
            .matcher
            .get_or_insert_with(|| WallMatcher::new(ctx.settings.origin.unwrap_or_else(|| agent_feet(host))));

        if let Some(actor) = tracked {
            if builder.is_empty() && matcher.distance_to(actor.position) >= ctx.config.wall_trigger_distance {
                match matcher.step(template, actor.position) {
                    WallStep::Module { orientation, cells } => {
                        log::debug!("wall module {:?} at {}", orientation, matcher.anchor());
                        self.modules_laid += 1;
                        builder.set_batch(cells, host);
                    }
                    WallStep::Gap { facing } => {
                        log::debug!("wall gap turn {:?}", facing);
                    }
                }
            }
        }
        match builder.tick(ctx, host) {
            BuildStatus::NeedsResources(m) => TickOutcome::NeedsResources(Some(m)),
            BuildStatus::Working | BuildStatus::Drained => TickOutcome::Continue,
        }
    }

    fn cleanup(&mut self, _ctx: &mut TaskContext, _host: &mut HostEnv<'_>) {
        if let Some(b) = self.builder.as_mut() {
            b.clear();
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.matcher = None;
        self.resume_batch.clear();
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            self.matcher = None;
        }
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if let Some(m) = &self.matcher {
            record.put("wall.matcher", m)?;
        }
        if let Some(b) = self.builder.as_ref().filter(|b| !b.is_empty()) {
            record.put("wall.pending", &b.pending())?;
        }
        record.put("wall.modules", &self.modules_laid)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.matcher = record.get("wall.matcher")?;
        self.modules_laid = record.get("wall.modules")?.unwrap_or(0);
        self.resume_batch = record.get("wall.pending")?.unwrap_or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::headless::HeadlessHost;
    use crate::host::Inventory;
    use crate::template::ModuleTemplate;
    use crate::types::{AgentId, ItemStack};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};
    use stonewright_hash::TaskSeed;

    const DIRT: MaterialId = MaterialId(3);
    const BRICK: MaterialId = MaterialId(45);

    fn segment() -> ModuleTemplate {
        let mut cells = Vec::new();
        for x in 0..3 {
            for y in 0..2 {
                cells.push((VoxelCoord::new(x, y, 0), BRICK));
            }
        }
        ModuleTemplate::new(cells)
    }

    #[test]
    fn missing_template_halts() {
        let mut h = HeadlessHost::new(8, 8, 8, MaterialTable::new(), [0.5, 1.0, 0.5]);
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        let mut s = WallStrategy::new();
        assert_eq!(s.initialize(&mut ctx, &mut h.env()), Err(HaltReason::MissingTemplate));
    }

    #[test]
    fn lays_a_module_toward_the_actor() {
        let mut table = MaterialTable::new();
        table.insert(DIRT, MaterialProps::solid(0.5, None));
        let mut h = HeadlessHost::new(32, 8, 32, table, [5.5, 1.0, 5.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(31, 0, 31), DIRT);
        let _ = h.inventory.insert(ItemStack::blocks(BRICK, 64));

        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(2), EngineConfig::default());
        ctx.template = Some(segment());
        ctx.settings.origin = Some(VoxelCoord::new(10, 1, 10));
        let mut s = WallStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();

        let actor = TrackedActor { position: [20.5, 1.0, 10.5] };
        for _ in 0..60 {
            s.tick(&mut ctx, &mut h.env(), Some(&actor));
            h.advance();
        }
        assert!(s.modules_laid() >= 1);
        for x in 10..13 {
            assert_eq!(h.world.material(VoxelCoord::new(x, 1, 10)), BRICK);
            assert_eq!(h.world.material(VoxelCoord::new(x, 2, 10)), BRICK);
        }
    }

    #[test]
    fn module_in_progress_is_finished_after_resume() {
        let mut table = MaterialTable::new();
        table.insert(DIRT, MaterialProps::solid(0.5, None));
        let mut h = HeadlessHost::new(32, 8, 32, table, [5.5, 1.0, 5.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(31, 0, 31), DIRT);
        let _ = h.inventory.insert(ItemStack::blocks(BRICK, 64));

        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(2), EngineConfig::default());
        ctx.template = Some(segment());
        ctx.settings.origin = Some(VoxelCoord::new(10, 1, 10));
        let mut s = WallStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();

        let actor = TrackedActor { position: [20.5, 1.0, 10.5] };
        for _ in 0..60 {
            s.tick(&mut ctx, &mut h.env(), Some(&actor));
            h.advance();
            if ctx.blocks_placed >= 2 {
                break;
            }
        }
        assert_eq!(s.modules_laid(), 1);
        let placed = ctx.blocks_placed;
        assert!(placed >= 1 && placed < 6);

        let mut record = StateRecord::new();
        s.write_state(&mut record).unwrap();
        let pending: Vec<(VoxelCoord, MaterialId)> = record.get("wall.pending").unwrap().unwrap();
        assert_eq!(pending.len() as u64, 6 - placed);

        // Nobody to follow after the resume, so only the saved module can
        // finish the wall.
        let mut resumed = WallStrategy::new();
        resumed.read_state(&record).unwrap();
        resumed.initialize(&mut ctx, &mut h.env()).unwrap();
        for _ in 0..60 {
            resumed.tick(&mut ctx, &mut h.env(), None);
            h.advance();
        }
        assert_eq!(resumed.modules_laid(), 1);
        for x in 10..13 {
            assert_eq!(h.world.material(VoxelCoord::new(x, 1, 10)), BRICK);
            assert_eq!(h.world.material(VoxelCoord::new(x, 2, 10)), BRICK);
        }
    }
}
