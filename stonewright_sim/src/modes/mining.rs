// Mining mode: an endless branch mine that follows ore veins.
//
// The spine starts at the origin (or the agent's feet) and advances along
// the facing. Chunks are pulled from `BranchMine` whenever the crew's queue
// falls below `queue_low_water`, so the agent never walks far ahead of
// what it has dug. Broken ore queues its neighbours through the crew's
// vein follower, gated by the ore policy, and the walkway is patched with
// the fallback building block wherever the agent finds a gap underfoot.
// Runs until cancelled.

use super::dig::{DigCrew, DigStatus, read_hands};
use super::origin_or_feet;
use crate::config::SettingKey;
use crate::error::EngineError;
use crate::event::HaltReason;
use crate::generators::mining::BranchMine;
use crate::host::{HostEnv, TrackedActor};
use crate::mining::MiningSession;
use crate::persist::StateRecord;
use crate::strategy::{BuildMode, Capabilities, Strategy, TaskContext, TickOutcome};
use crate::types::VoxelCoord;

/// Chunks pulled per tick at most, so a stretch of open cave does not stall
/// one tick.
const CHUNKS_PER_TICK: usize = 8;

/// Step back far enough to regenerate whatever was still queued.
fn rewound(step: u32) -> u32 {
    step.saturating_sub(CHUNKS_PER_TICK as u32)
}

#[derive(Clone, Debug, Default)]
pub struct MiningStrategy {
    mine: Option<BranchMine>,
    crew: Option<DigCrew>,
    /// Anchor chosen when the mine was first laid out, kept so a resumed
    /// task continues the same spine.
    anchor: Option<VoxelCoord>,
    resume_step: Option<u32>,
    resume_hands: Option<[MiningSession; 2]>,
}

impl MiningStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<u32> {
        self.mine.as_ref().map(BranchMine::cursor)
    }

    fn build_mine(&mut self, ctx: &TaskContext, host: &HostEnv<'_>) {
        let anchor = *self.anchor.get_or_insert_with(|| origin_or_feet(ctx, host));
        let s = &ctx.settings;
        let mut mine = BranchMine::new(anchor, s.facing, s.branch_spacing, s.branch_depth);
        if let Some(step) = self.resume_step.take() {
            mine.set_cursor(step);
        }
        log::info!("branch mining from {} facing {:?}", anchor, s.facing);
        self.mine = Some(mine);
    }
}

impl Strategy for MiningStrategy {
    fn mode(&self) -> BuildMode {
        BuildMode::Mining
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason> {
        let mut crew = DigCrew::new(ctx.config.planner.clone(), true, true);
        if let Some(hands) = self.resume_hands.take() {
            crew.restore(hands);
        }
        self.crew = Some(crew);
        self.build_mine(ctx, host);
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, _tracked: Option<&TrackedActor>) -> TickOutcome {
        if self.mine.is_none() {
            self.build_mine(ctx, host);
        }
        let crew = self.crew.get_or_insert_with(|| DigCrew::new(ctx.config.planner.clone(), true, true));
        let Some(mine) = self.mine.as_mut() else {
            return TickOutcome::Halt(HaltReason::MissingAnchor);
        };

        let mut pulled = 0;
        while crew.planner().remaining() < ctx.config.queue_low_water && pulled < CHUNKS_PER_TICK {
            let cells = mine.next_chunk();
            crew.enqueue(ctx, host, cells);
            pulled += 1;
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
        let queued = crew.planner().remaining();
        crew.cancel(ctx, host);
        if let (true, Some(mine)) = (queued > 0, self.mine.as_mut()) {
            mine.set_cursor(rewound(mine.cursor()));
        }
    }

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
        self.mine = None;
        self.anchor = None;
        self.resume_step = None;
        self.resume_hands = None;
    }

    fn on_configuration_changed(&mut self, _ctx: &TaskContext, key: SettingKey) {
        if key.rebuilds_generator() {
            self.mine = None;
            self.anchor = None;
        } else if matches!(key, SettingKey::BranchSpacing | SettingKey::BranchDepth) {
            // Same spine, new branch pattern from the current step on.
            self.resume_step = self.cursor();
            self.mine = None;
        }
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if let Some(anchor) = &self.anchor {
            record.put("mining.anchor", anchor)?;
        }
        let queued = self.crew.as_ref().map_or(0, |c| c.planner().remaining());
        if let Some(step) = self.cursor() {
            let step = if queued > 0 { rewound(step) } else { step };
            record.put("mining.step", &step)?;
        }
        match &self.crew {
            Some(crew) => crew.write_hands(record),
            None => Ok(()),
        }
    }

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.anchor = record.get("mining.anchor")?;
        self.resume_step = record.get("mining.step")?;
        self.resume_hands = read_hands(record)?;
        self.mine = None;
        Ok(())
    }
}
