// Tower mode: repeat a captured module upward, one layer per batch.
//
// The module is anchored at the origin. `TowerLayers` yields layers bottom
// first; each becomes the builder's batch, and the next layer is only
// pulled once the current one is placed, so nothing is ever built over a
// gap. When the linear gradient is set, every cell's material comes from
// sampling it at the layer's height fraction instead of the template's own
// material. Completes after the last layer.

use super::{BuildStatus, Builder};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::tower::TowerLayers;
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};

#[derive(Clone, Debug, Default)]
pub struct TowerStrategy {
    layers: Option<TowerLayers>,
    builder: Option<Builder>,
    /// Cursor restored from a saved task, applied when `layers` is rebuilt.
    resume_layer: Option<u32>,
    done: bool,
}

impl TowerStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_layers(&mut self, ctx: &TaskContext) -> Result<(), HaltReason> {
        let template = ctx.template.as_ref().ok_or(HaltReason::MissingTemplate)?;
        let origin = ctx.settings.origin.ok_or(HaltReason::MissingAnchor)?;
        let mut layers =
            TowerLayers::new(template, origin, ctx.settings.tower_modules).ok_or(HaltReason::MissingTemplate)?;
        if let Some(cursor) = self.resume_layer.take() {
            layers.set_cursor(cursor);
        }
        log::info!("tower at {}: {} layer(s)", origin, layers.total_layers());
        self.layers = Some(layers);
        Ok(())
    }
}

impl Strategy for TowerStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Tower
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { linear_gradient_ui: true, ..Capabilities::default() }
    }

    fn initialize(&mut self, ctx: &mut TaskContext, _host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        self.builder = Some(Builder::new(ctx.config.planner.clone()));
        self.build_layers(ctx)
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.done {
            return TickOutcome::Complete;
        }
        if self.layers.is_none() {
            if let Err(reason) = self.build_layers(ctx) {
                return TickOutcome::Halt(reason);
            }
        }
        let builder = self.builder.get_or_insert_with(|| Builder::new(ctx.config.planner.clone()));
        let (Some(layers), Some(template)) = (self.layers.as_mut(), ctx.template.as_ref()) else {
            return TickOutcome::Halt(HaltReason::MissingTemplate);
        };

        if builder.is_empty() {
            match layers.next_batch(template) {
                Some((layer, cells)) => {
                    let gradient = &ctx.linear_gradient;
                    let cells: Vec<_> = if gradient.is_empty() {
                        cells
                    } else {
                        let top = layers.total_layers().saturating_sub(1).max(1) as f64;
                        let g = gradient.effective_len().saturating_sub(1) as f64;
                        let s = layer as f64 / top * g;
                        cells
                            .into_iter()
                            .map(|(pos, m)| (pos, gradient.sample(s, pos, ctx.seed).unwrap_or(m)))
                            .collect()
                    };
                    log::debug!("tower layer {} ({} cells)", layer, cells.len());
                    builder.set_batch(cells, host);
                }
                None => {
                    log::info!("tower complete");
                    self.done = true;
                    return TickOutcome::Complete;
                }
            }
        }
        match builder.tick(ctx, host) {
            BuildStatus::NeedsResources(m) => TickOutcome::NeedsResources(Some(m)),
            BuildStatus::Working | BuildStatus::Drained => TickOutcome::Continue,
        }
    }

    fn cleanup(&mut self, _ctx: &mut TaskContext, _host: &mut HostEnv<'_>) {
        let Some(b) = self.builder.as_mut() else {
            return;
        };
        let in_flight = !b.is_empty();
        b.clear();
        // Re-emit the unfinished layer on the next tick.
        if let (true, Some(layers)) = (in_flight, self.layers.as_mut()) {
            let cursor = layers.cursor();
            layers.set_cursor(cursor.saturating_sub(1));
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.layers = None;
        self.resume_layer = None;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() || key == SettingKey::TowerModules {
            // Cells already standing are skipped, so restarting from the
            // bottom only re-walks the finished layers.
            self.layers = None;
            self.done = false;
        }
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        // The layer in flight is rebuilt on resume.
        let in_flight = self.builder.as_ref().is_some_and(|b| !b.is_empty());
        if let Some(layers) = &self.layers {
            let cursor = layers.cursor().saturating_sub(u32::from(in_flight));
            record.put("tower.layer", &cursor)?;
        }
        record.put("tower.done", &self.done)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.resume_layer = record.get("tower.layer")?;
        self.done = record.get("tower.done")?.unwrap_or(false);
        self.layers = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::gradient::Gradient;
    use crate::headless::HeadlessHost;
    use crate::host::Inventory;
    use crate::template::ModuleTemplate;
    use crate::types::{AgentId, ItemStack, MaterialId, VoxelCoord};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};
    use stonewright_hash::TaskSeed;

    const STONE: MaterialId = MaterialId(1);
    const PLANK: MaterialId = MaterialId(5);
    const GLASS: MaterialId = MaterialId(20);

    fn host() -> HeadlessHost {
        let mut table = MaterialTable::new();
        table.insert(STONE, MaterialProps::solid(1.5, None));
        let mut h = HeadlessHost::new(24, 16, 24, table, [4.5, 1.0, 4.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(23, 0, 23), STONE);
        h
    }

    fn pillar() -> ModuleTemplate {
        ModuleTemplate::new((0..2).map(|y| (VoxelCoord::new(0, y, 0), PLANK)))
    }

    #[test]
    fn missing_anchor_halts() {
        let mut h = host();
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.template = Some(pillar());
        let mut s = TowerStrategy::new();
        assert_eq!(s.initialize(&mut ctx, &mut h.env()), Err(HaltReason::MissingAnchor));
    }

    #[test]
    fn gradient_overrides_template_by_height() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(STONE, 64));
        let _ = h.inventory.insert(ItemStack::blocks(GLASS, 64));
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.template = Some(pillar());
        ctx.settings.origin = Some(VoxelCoord::new(8, 1, 8));
        ctx.settings.tower_modules = 2;
        ctx.linear_gradient = Gradient::new(&[Some(STONE), Some(GLASS)], 0.0, 1);
        let mut s = TowerStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let mut outcome = TickOutcome::Continue;
        for _ in 0..200 {
            outcome = s.tick(&mut ctx, &mut h.env(), None);
            if outcome != TickOutcome::Continue {
                break;
            }
            h.advance();
        }
        assert_eq!(outcome, TickOutcome::Complete);
        assert!(s.is_complete());
        assert_eq!(h.world.material(VoxelCoord::new(8, 1, 8)), STONE);
        assert_eq!(h.world.material(VoxelCoord::new(8, 2, 8)), STONE);
        assert_eq!(h.world.material(VoxelCoord::new(8, 4, 8)), GLASS);
        assert_eq!(ctx.blocks_placed, 4);
    }

    #[test]
    fn cleanup_replays_only_an_unfinished_layer() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(PLANK, 64));
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.template = Some(pillar());
        ctx.settings.origin = Some(VoxelCoord::new(8, 1, 8));
        ctx.settings.tower_modules = 3;
        let mut s = TowerStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let cursor = |s: &TowerStrategy| s.layers.as_ref().map(|l| l.cursor());

        // Layer 0 queued and unfinished: cleanup steps back to it.
        s.tick(&mut ctx, &mut h.env(), None);
        assert_eq!(cursor(&s), Some(1));
        s.cleanup(&mut ctx, &mut h.env());
        assert_eq!(cursor(&s), Some(0));

        // Layer 0 (a single cell) finished: cleanup leaves the cursor alone.
        for _ in 0..100 {
            s.tick(&mut ctx, &mut h.env(), None);
            h.advance();
            if ctx.blocks_placed == 1 {
                break;
            }
        }
        assert_eq!(ctx.blocks_placed, 1);
        assert!(s.builder.as_ref().is_some_and(Builder::is_empty));
        assert_eq!(cursor(&s), Some(1));
        s.cleanup(&mut ctx, &mut h.env());
        s.cleanup(&mut ctx, &mut h.env());
        assert_eq!(cursor(&s), Some(1));
    }
}
