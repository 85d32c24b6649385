// Excavation mode: dig a pit ring by ring from an anchored corner.
//
// Each time the dig crew drains, the next ring of columns is queued. A
// ring with nothing diggable left in it (already open, or all marker
// blocks) is skipped in the same tick. A full inventory sends the agent to
// a depot; the ring in flight survives the trip because `cleanup` only
// releases the hands and the queue is rebuilt from the ring cursor.

use super::dig::{DigCrew, DigStatus, read_hands};
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::excavation::RingExcavator;
use crate::host::{HostEnv, TrackedActor};
use crate::mining::MiningSession;
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};

/// Rings examined per tick when consecutive rings turn out empty.
const RING_SCAN_LIMIT: usize = 4;

#[derive(Clone, Debug, Default)]
pub struct ExcavationStrategy {
    excavator: Option<RingExcavator>,
    crew: Option<DigCrew>,
    resume_ring: Option<u32>,
    resume_hands: Option<[MiningSession; 2]>,
    done: bool,
}

impl ExcavationStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_excavator(&mut self, ctx: &TaskContext) -> Result<(), HaltReason> {
        let origin = ctx.settings.origin.ok_or(HaltReason::MissingAnchor)?;
        let s = &ctx.settings;
        let mut ex = RingExcavator::new(
            origin,
            s.facing,
            s.excavation_width,
            s.excavation_height,
            s.excavation_depth,
            ctx.config.excavation_max_rings,
        );
        if let Some(ring) = self.resume_ring.take() {
            ex.set_cursor(ring);
        }
        log::info!("excavating from {} facing {:?}", origin, s.facing);
        self.excavator = Some(ex);
        Ok(())
    }
}

impl Strategy for ExcavationStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Excavation
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize(&mut self, ctx: &mut TaskContext, _host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        let mut crew = DigCrew::new(ctx.config.planner.clone(), false, false);
        if let Some(hands) = self.resume_hands.take() {
            crew.restore(hands);
        }
        self.crew = Some(crew);
        self.build_excavator(ctx)
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.done {
            return TickOutcome::Complete;
        }
        if self.excavator.is_none() {
            if let Err(reason) = self.build_excavator(ctx) {
                return TickOutcome::Halt(reason);
            }
        }
        let crew = self.crew.get_or_insert_with(|| DigCrew::new(ctx.config.planner.clone(), false, false));
        let Some(ex) = self.excavator.as_mut() else {
            return TickOutcome::Halt(HaltReason::MissingAnchor);
        };

        if crew.is_drained() {
            for _ in 0..RING_SCAN_LIMIT {
                let Some(cells) = ex.next_ring(&*host.world, ctx.config.boundary_marker) else {
                    log::info!("excavation complete after {} ring(s)", ex.cursor());
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
        if let (true, Some(ex)) = (in_flight, self.excavator.as_mut()) {
            let ring = ex.cursor();
            ex.set_cursor(ring.saturating_sub(1));
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.excavator = None;
        self.resume_ring = None;
        self.resume_hands = None;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        let reshapes = matches!(
            key,
            SettingKey::ExcavationWidth | SettingKey::ExcavationHeight | SettingKey::ExcavationDepth
        );
        if key.rebuilds_generator() || reshapes {
            self.excavator = None;
            self.done = false;
        }
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        let in_flight = self.crew.as_ref().is_some_and(|c| !c.is_drained());
        if let Some(ex) = &self.excavator {
            record.put("excavation.ring", &ex.cursor().saturating_sub(u32::from(in_flight)))?;
        }
        if let Some(crew) = &self.crew {
            crew.write_hands(record)?;
        }
        record.put("excavation.done", &self.done)
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.resume_ring = record.get("excavation.ring")?;
        self.resume_hands = read_hands(record)?;
        self.done = record.get("excavation.done")?.unwrap_or(false);
        self.excavator = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::headless::HeadlessHost;
    use crate::types::{AgentId, Hand, MaterialId, VoxelCoord};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};
    use stonewright_hash::TaskSeed;

    const DIRT: MaterialId = MaterialId(3);

    fn host() -> HeadlessHost {
        let mut table = MaterialTable::new();
        table.insert(DIRT, MaterialProps::solid(0.05, None));
        let mut h = HeadlessHost::new(16, 12, 16, table, [1.5, 5.0, 1.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(15, 4, 15), DIRT);
        h
    }

    #[test]
    fn missing_origin_halts() {
        let mut h = host();
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        let mut s = ExcavationStrategy::new();
        assert_eq!(s.initialize(&mut ctx, &mut h.env()), Err(HaltReason::MissingAnchor));
    }

    #[test]
    fn digs_a_small_pit_and_completes() {
        let mut h = host();
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.settings.origin = Some(VoxelCoord::new(6, 4, 6));
        ctx.settings.excavation_width = 2;
        ctx.settings.excavation_height = 1;
        ctx.settings.excavation_depth = 1;
        let mut s = ExcavationStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let mut outcome = TickOutcome::Continue;
        for _ in 0..400 {
            outcome = s.tick(&mut ctx, &mut h.env(), None);
            if outcome != TickOutcome::Continue {
                break;
            }
            h.advance();
        }
        assert_eq!(outcome, TickOutcome::Complete);
        // Two rings: a 2×2 square, two levels deep.
        assert_eq!(ctx.blocks_mined, 8);
        assert!(!h.world.is_solid(VoxelCoord::new(6, 3, 6)));
        assert!(h.world.is_solid(VoxelCoord::new(6, 2, 6)));
    }

    #[test]
    fn state_keeps_ring_cursor() {
        let mut h = host();
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.settings.origin = Some(VoxelCoord::new(6, 4, 6));
        let mut s = ExcavationStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        s.tick(&mut ctx, &mut h.env(), None);
        let mut record = StateRecord::new();
        s.write_state(&mut record).unwrap();
        // Ring 0 is in flight, so it is replayed on resume.
        assert_eq!(record.get::<u32>("excavation.ring").unwrap(), Some(0));

        let mut resumed = ExcavationStrategy::new();
        resumed.read_state(&record).unwrap();
        assert!(!resumed.is_complete());
    }

    #[test]
    fn resumed_hands_finish_the_pit() {
        let mut h = host();
        let mut ctx = TaskContext::new(AgentId(1), TaskSeed(1), EngineConfig::default());
        ctx.settings.origin = Some(VoxelCoord::new(6, 4, 6));
        ctx.settings.excavation_width = 2;
        ctx.settings.excavation_height = 1;
        ctx.settings.excavation_depth = 1;
        let mut s = ExcavationStrategy::new();
        s.initialize(&mut ctx, &mut h.env()).unwrap();
        let main = |s: &ExcavationStrategy| s.crew.as_ref().map(|c| c.miner().session(Hand::Main).clone());
        for _ in 0..100 {
            s.tick(&mut ctx, &mut h.env(), None);
            h.advance();
            if main(&s).is_some_and(|m| m.progress() >= 2) {
                break;
            }
        }
        let saved = main(&s).unwrap();
        let target = saved.target().unwrap();
        assert!(saved.progress() >= 2);

        let mut record = StateRecord::new();
        s.write_state(&mut record).unwrap();
        assert!(record.contains("dig.hand.main"));
        let mut resumed = ExcavationStrategy::new();
        resumed.read_state(&record).unwrap();
        resumed.initialize(&mut ctx, &mut h.env()).unwrap();
        assert_eq!(main(&resumed), Some(saved));

        let mut outcome = TickOutcome::Continue;
        for _ in 0..400 {
            outcome = resumed.tick(&mut ctx, &mut h.env(), None);
            if outcome != TickOutcome::Continue {
                break;
            }
            h.advance();
        }
        assert_eq!(outcome, TickOutcome::Complete);
        assert!(!h.world.is_solid(target));
        assert_eq!(ctx.blocks_mined, 8);
    }
}
