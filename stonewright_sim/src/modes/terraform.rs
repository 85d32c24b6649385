// Terraform mode: fill the alpha shell of a captured skeleton.
//
// The captured template is the skeleton. Anchored at the origin, it is
// closed with a ball of radius `terraform_alpha` into an `AlphaShell`, and
// the shell is laid one level per batch, bottom first. Each cell's
// material comes from the grouped gradient matching its slope class,
// sampled at its depth below the surface (capped at the palette's last
// entry), so a hill gets a grass skin over dirt over stone without any
// per-cell configuration. A class with
// no palette borrows the first non-empty one.
//
// The shell is recomputed from the template on resume; only the level
// cursor is persisted.

use super::{BuildStatus, Builder};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::alpha_shape::{AlphaShell, ShellCell};
use crate::gradient::GradientGroup;
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::{MaterialId, VoxelCoord};
use stonewright_hash::TaskSeed;

#[derive(Clone, Debug, Default)]
pub struct TerraformStrategy {
    /// Shell levels, lowest first.
    layers: Option<Vec<Vec<ShellCell>>>,
    builder: Option<Builder>,
    next_layer: usize,
    done: bool,
}

/// Material for one shell cell. Depth is capped at the last palette entry,
/// so everything below the palette's length gets the deepest material.
fn shell_material(group: &GradientGroup, cell: &ShellCell, seed: TaskSeed) -> Option<MaterialId> {
    let gradient = group.resolve(cell.class)?;
    let deepest = gradient.effective_len().saturating_sub(1) as f64;
    gradient.sample((cell.depth as f64).min(deepest), cell.pos, seed)
}

impl TerraformStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell_size(&self) -> usize {
        self.layers.as_ref().map_or(0, |l| l.iter().map(Vec::len).sum())
    }

    fn build_shell(&mut self, ctx: &TaskContext) -> Result<(), HaltReason> {
        let template = ctx.template.as_ref().filter(|t| !t.is_empty()).ok_or(HaltReason::MissingTemplate)?;
        let origin = ctx.settings.origin.ok_or(HaltReason::MissingAnchor)?;
        if ctx.grouped_gradients.is_empty() {
            return Err(HaltReason::EmptyPalette);
        }
        let skeleton: Vec<VoxelCoord> = template
            .cells()
            .iter()
            .map(|(p, _)| origin.offset(p.x, p.y, p.z))
            .collect();
        let shell = AlphaShell::build(&skeleton, ctx.config.terraform_alpha);
        log::info!(
            "terraform shell: {} voxel(s) from a {}-voxel skeleton (alpha {})",
            shell.len(),
            skeleton.len(),
            ctx.config.terraform_alpha
        );
        self.layers = Some(shell.layers().into_values().collect());
        Ok(())
    }
}

impl Strategy for TerraformStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Terraform
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { grouped_gradient_ui: true, ..Capabilities::default() }
    }

    fn initialize(&mut self, ctx: &mut TaskContext, _host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        self.builder = Some(Builder::new(ctx.config.planner.clone()));
        self.build_shell(ctx)
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.done {
            return TickOutcome::Complete;
        }
        if self.layers.is_none() {
            if let Err(reason) = self.build_shell(ctx) {
                return TickOutcome::Halt(reason);
            }
        }
        let builder = self.builder.get_or_insert_with(|| Builder::new(ctx.config.planner.clone()));
        let Some(layers) = self.layers.as_ref() else {
            return TickOutcome::Halt(HaltReason::MissingTemplate);
        };

        if builder.is_empty() {
            let Some(layer) = layers.get(self.next_layer) else {
                log::info!("terraform complete");
                self.done = true;
                return TickOutcome::Complete;
            };
            self.next_layer += 1;
            let cells: Vec<_> = layer
                .iter()
                .filter_map(|c| shell_material(&ctx.grouped_gradients, c, ctx.seed).map(|m| (c.pos, m)))
                .collect();
            builder.set_batch(cells, host);
        }
        match builder.tick(ctx, host) {
            BuildStatus::NeedsResources(m) => TickOutcome::NeedsResources(Some(m)),
            BuildStatus::Working | BuildStatus::Drained => TickOutcome::Continue,
        }
    }

    fn cleanup(&mut self, _ctx: &mut TaskContext, _host: &mut HostEnv<'_>) {
        if let Some(b) = self.builder.as_mut() {
            if !b.is_empty() {
                self.next_layer = self.next_layer.saturating_sub(1);
            }
            b.clear();
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.layers = None;
        self.next_layer = 0;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            self.layers = None;
            self.next_layer = 0;
            self.done = false;
        }
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        let in_flight = self.builder.as_ref().is_some_and(|b| !b.is_empty());
        record.put("terraform.layer", &self.next_layer.saturating_sub(usize::from(in_flight)))?;
        record.put("terraform.done", &self.done)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.next_layer = record.get("terraform.layer")?.unwrap_or(0);
        self.done = record.get("terraform.done")?.unwrap_or(false);
        self.layers = None;
        Ok(())
    }
}
