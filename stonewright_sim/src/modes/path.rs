// Path mode: pave a gradient-textured path behind a tracked actor.
//
// Each tick the `PathTracker` is fed the actor's position; when the actor
// has moved far enough a new segment comes back, every cell is given a
// material by sampling the linear gradient at the cell's lateral scalar,
// and the cells join the builder's batch. Runs until cancelled.
//
// The tracker's anchor has already moved past every segment it returned, so
// cells not yet paved are saved alongside it.

use super::{BuildStatus, Builder};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::path::PathTracker;
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::{MaterialId, VoxelCoord};

#[derive(Clone, Debug, Default)]
pub struct PathStrategy {
    tracker: PathTracker,
    builder: Option<Builder>,
    resume_cells: Vec<(VoxelCoord, MaterialId)>,
}

impl PathStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> &PathTracker {
        &self.tracker
    }
}

impl Strategy for PathStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { follows_player: true, linear_gradient_ui: true, grouped_gradient_ui: false }
    }

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        if ctx.linear_gradient.is_empty() {
            return Err(HaltReason::EmptyPalette);
        }
        let mut builder = Builder::new(ctx.config.planner.clone());
        builder.extend(std::mem::take(&mut self.resume_cells), host);
        self.builder = Some(builder);
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, tracked: Option<&TrackedActor>) -> TickOutcome {
        let builder = self.builder.get_or_insert_with(|| Builder::new(ctx.config.planner.clone()));
        if let Some(actor) = tracked {
            let g = ctx.linear_gradient.effective_len();
            let segment = self.tracker.update(
                actor.position,
                ctx.settings.path_width,
                ctx.config.path_trigger_distance,
                ctx.config.path_segment_length,
                g,
            );
            if !segment.is_empty() {
                log::debug!("path segment of {} cells", segment.len());
                let cells: Vec<_> = segment
                    .iter()
                    .filter_map(|c| ctx.linear_gradient.sample(c.scalar, c.pos, ctx.seed).map(|m| (c.pos, m)))
                    .collect();
                builder.extend(cells, host);
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
        self.tracker.reset();
        self.resume_cells.clear();
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            self.tracker.reset();
        }
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if let Some(b) = self.builder.as_ref().filter(|b| !b.is_empty()) {
            record.put("path.pending", &b.pending())?;
        }
        record.put("path.tracker", &self.tracker)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.tracker = record.get("path.tracker")?.unwrap_or_default();
        self.resume_cells = record.get("path.pending")?.unwrap_or_default();
        Ok(())
    }
}
