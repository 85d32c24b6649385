// Engine events: the narrative output of a build task.
//
// Every observable thing the engine does (a block placed or mined, a target
// deferred, a forced teleport, a depot run, a halt) is appended to the
// task's event buffer as an `EngineEvent`. The host drains the buffer after
// each tick via `BuildTask::drain_events()` and turns events into UI
// updates, sounds or log lines. The engine never reads events back.
//
// See also: `task.rs` which owns the buffer, `planner.rs` and `mining.rs`
// which emit most events.
//
// **Critical constraint: determinism.** Events are appended in the order
// the work happens within a tick, so two runs of the same task produce
// identical event streams.

use crate::strategy::BuildMode;
use crate::types::{Hand, MaterialId, Pos3, VoxelCoord};
use serde::{Deserialize, Serialize};

/// Why a strategy stopped itself without completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The mode needs an origin or anchor and none is set.
    MissingAnchor,
    /// The mode replays a captured template and none is set.
    MissingTemplate,
    /// Every gradient the mode samples from is empty.
    EmptyPalette,
    /// The tree tiling kept contradicting itself past the restart budget.
    TilingContradiction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    ModeSelected { mode: BuildMode },
    /// The task was started or resumed by the host's start signal.
    Started { mode: BuildMode },
    BlockPlaced { pos: VoxelCoord, material: MaterialId },
    BlockMined { pos: VoxelCoord, material: MaterialId, hand: Hand },
    TargetDeferred { pos: VoxelCoord, attempts: u32 },
    Teleported { to: Pos3 },
    /// Placement stopped until the host resumes the task.
    WaitingForResources { material: Option<MaterialId> },
    DepotUnloaded { depot: VoxelCoord, stacks: u32 },
    TaskComplete { mode: BuildMode },
    Cancelled,
    Halted { reason: HaltReason },
}
