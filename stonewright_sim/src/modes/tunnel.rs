// Tunnel mode: cut a fixed-length tunnel slice by slice.
//
// Slices come from `TunnelSlicer` one at a time, each queued when the crew
// drains, so the face advances evenly. The floor under each slice is
// patched where it is missing. A full inventory sends the agent to a
// depot; tunnels rotate over up to three depots so a long tunnel can be
// served from containers placed along it. Completes once the last slice is
// clear.

use super::dig::{DigCrew, DigStatus, read_hands};
use super::origin_or_feet;
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::tunnel::TunnelSlicer;
use crate::host::{HostEnv, TrackedActor};
use crate::mining::MiningSession;
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::VoxelCoord;

const DEPOT_ROTATION: usize = 3;

#[derive(Clone, Debug, Default)]
pub struct TunnelStrategy {
    slicer: Option<TunnelSlicer>,
    crew: Option<DigCrew>,
    anchor: Option<VoxelCoord>,
    resume_slice: Option<u32>,
    resume_hands: Option<[MiningSession; 2]>,
    done: bool,
}

impl TunnelStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_slicer(&mut self, ctx: &TaskContext, host: &HostEnv<'_>) {
        let anchor = *self.anchor.get_or_insert_with(|| origin_or_feet(ctx, host));
        let s = &ctx.settings;
        let mut slicer = TunnelSlicer::new(anchor, s.facing, s.tunnel_width, s.tunnel_height, s.tunnel_length);
        if let Some(slice) = self.resume_slice.take() {
            slicer.set_cursor(slice);
        }
        log::info!("tunnelling {} slice(s) from {} facing {:?}", s.tunnel_length, anchor, s.facing);
        self.slicer = Some(slicer);
    }
}

impl Strategy for TunnelStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Tunnel
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        let mut crew = DigCrew::new(ctx.config.planner.clone(), false, true);
        if let Some(hands) = self.resume_hands.take() {
            crew.restore(hands);
        }
        self.crew = Some(crew);
        self.build_slicer(ctx, host);
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.done {
            return TickOutcome::Complete;
        }
        if self.slicer.is_none() {
            self.build_slicer(ctx, host);
        }
        let crew = self.crew.get_or_insert_with(|| DigCrew::new(ctx.config.planner.clone(), false, true));
        let Some(slicer) = self.slicer.as_mut() else {
            return TickOutcome::Halt(HaltReason::MissingAnchor);
        };

        if crew.is_drained() {
            // Slices that are already open cost nothing; move past them.
            loop {
                let Some(cells) = slicer.next_slice() else {
                    log::info!("tunnel complete");
                    self.done = true;
                    return TickOutcome::Complete;
                };
                if crew.enqueue(ctx, host, cells) > 0 {
                    break;
                }
            }
        }
        match crew.tick(ctx, host) {
            DigStatus::InventoryFull => TickOutcome::NeedsDepot,
            DigStatus::Working | DigStatus::Drained => TickOutcome::Continue,
        }
    }

    fn cleanup(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        let Some(crew) = self.crew.as_mut() else {
            return;
        };
        let in_flight = !crew.is_drained();
        crew.cancel(ctx, host);
        if let (true, Some(slicer)) = (in_flight, self.slicer.as_mut()) {
            let slice = slicer.cursor();
            slicer.set_cursor(slice.saturating_sub(1));
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.slicer = None;
        self.anchor = None;
        self.resume_slice = None;
        self.resume_hands = None;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            self.slicer = None;
            self.anchor = None;
            self.done = false;
        } else if matches!(key, SettingKey::TunnelWidth | SettingKey::TunnelHeight | SettingKey::TunnelLength) {
            self.resume_slice = self.slicer.as_ref().map(TunnelSlicer::cursor);
            self.slicer = None;
            self.done = false;
        }
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn depot_rotation(&self) -> usize {
        DEPOT_ROTATION
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        let in_flight = self.crew.as_ref().is_some_and(|c| !c.is_drained());
        if let Some(anchor) = &self.anchor {
            record.put("tunnel.anchor", anchor)?;
        }
        if let Some(slicer) = &self.slicer {
            record.put("tunnel.slice", &slicer.cursor().saturating_sub(u32::from(in_flight)))?;
        }
        if let Some(crew) = &self.crew {
            crew.write_hands(record)?;
        }
        record.put("tunnel.done", &self.done)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.anchor = record.get("tunnel.anchor")?;
        self.resume_slice = record.get("tunnel.slice")?;
        self.resume_hands = read_hands(record)?;
        self.done = record.get("tunnel.done")?.unwrap_or(false);
        self.slicer = None;
        Ok(())
    }
}
