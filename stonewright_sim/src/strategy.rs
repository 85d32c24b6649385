// Per-mode strategies, the shared task context, and the mode registry.
//
// A `Strategy` is one build mode's state machine. It owns its spatial
// generator and whatever shared engines it drives (a placement planner, a
// dig crew with two mining hands) and is ticked once per engine step by
// `BuildTask`. Everything that used to be shared mutable state between
// modes (counters, gradients, the captured template, anchors, the event
// buffer) lives in `TaskContext`, which the task passes to every hook.
//
// Lifecycle:
// - `initialize`: validate settings and build the generator. An error
//   (`HaltReason`) disables the task silently.
// - `tick`: one step. Reports a `TickOutcome`; never panics, never errors.
// - `cleanup`: drop transient state (planner queue, mining sessions,
//   overlays) but keep generator cursors. Used before depot runs.
// - `stop`: terminal; also drops generator state.
// - `on_configuration_changed`: a setting changed. Keys that move the
//   anchor or change the tiling clear the generator so the next tick
//   rebuilds it.
// - `write_state` / `read_state`: minimal resumable subset. Queues are not
//   persisted; the generator regenerates them from its cursor.
//
// `StrategyRegistry` maps `BuildMode` to a factory function. It is a lookup
// table, nothing more.
//
// See also: `task.rs` (the driver), `modes/` (the eight implementations),
// `planner.rs`, `mining.rs`.

use crate::config::{EngineConfig, ModeSettings, SettingKey};
use crate::error::EngineError;
use crate::event::{EngineEvent, HaltReason};
use crate::gradient::{Gradient, GradientGroup};
use crate::host::{HostEnv, TrackedActor};
use crate::modes;
use crate::persist::StateRecord;
use crate::planner::PlaceResult;
use crate::template::ModuleTemplate;
use crate::types::{AgentId, Hand, MaterialId, VoxelCoord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use stonewright_hash::TaskSeed;

// ---------------------------------------------------------------------------
// Modes and capabilities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildMode {
    Path,
    Wall,
    Tower,
    Excavation,
    Mining,
    Tunnel,
    Terraform,
    Tree,
}

impl BuildMode {
    pub const ALL: [BuildMode; 8] = [
        BuildMode::Path,
        BuildMode::Wall,
        BuildMode::Tower,
        BuildMode::Excavation,
        BuildMode::Mining,
        BuildMode::Tunnel,
        BuildMode::Terraform,
        BuildMode::Tree,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuildMode::Path => "path",
            BuildMode::Wall => "wall",
            BuildMode::Tower => "tower",
            BuildMode::Excavation => "excavation",
            BuildMode::Mining => "mining",
            BuildMode::Tunnel => "tunnel",
            BuildMode::Terraform => "terraform",
            BuildMode::Tree => "tree",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildMode::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| EngineError::UnknownMode(s.to_string()))
    }
}

/// Flags the host uses to decide which screens apply to a mode. They do not
/// change engine behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub follows_player: bool,
    pub linear_gradient_ui: bool,
    pub grouped_gradient_ui: bool,
}

/// What a strategy tick asks of the task driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Stop and wait for the host's start signal.
    NeedsResources(Option<MaterialId>),
    /// Inventory is full; go unload at a depot.
    NeedsDepot,
    Complete,
    Halt(HaltReason),
}

// ---------------------------------------------------------------------------
// Shared task context
// ---------------------------------------------------------------------------

/// State shared by every mode for one agent's task.
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub agent: AgentId,
    pub seed: TaskSeed,
    pub config: EngineConfig,
    pub settings: ModeSettings,
    /// Single gradient for path and tower modes.
    pub linear_gradient: Gradient,
    /// Vertical/horizontal/sloped gradients for terraforming.
    pub grouped_gradients: GradientGroup,
    /// Captured module, skeleton or sample, depending on the mode.
    pub template: Option<ModuleTemplate>,
    pub events: Vec<EngineEvent>,
    /// Ticks spent in the ticking state.
    pub ticks: u64,
    pub blocks_placed: u64,
    pub blocks_mined: u64,
}

impl TaskContext {
    pub fn new(agent: AgentId, seed: TaskSeed, config: EngineConfig) -> Self {
        Self {
            agent,
            seed,
            config,
            settings: ModeSettings::default(),
            linear_gradient: Gradient::default(),
            grouped_gradients: GradientGroup::default(),
            template: None,
            events: Vec::new(),
            ticks: 0,
            blocks_placed: 0,
            blocks_mined: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy trait
// ---------------------------------------------------------------------------

pub trait Strategy {
    fn mode(&self) -> BuildMode;

    fn capabilities(&self) -> Capabilities;

    fn initialize(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) -> Result<(), HaltReason>;

    fn tick(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>, tracked: Option<&TrackedActor>) -> TickOutcome;

    fn cleanup(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>);

    fn stop(&mut self, ctx: &mut TaskContext, host: &mut HostEnv<'_>) {
        self.cleanup(ctx, host);
    }

    fn on_configuration_changed(&mut self, ctx: &TaskContext, key: SettingKey);

    /// Natural completion. Modes that run until cancelled always say no.
    fn is_complete(&self) -> bool {
        false
    }

    /// How many depot containers this mode rotates over.
    fn depot_rotation(&self) -> usize {
        1
    }

    fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError>;

    fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type StrategyFactory = fn() -> Box<dyn Strategy>;

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<BuildMode, StrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in mode.
    pub fn with_builtin_modes() -> Self {
        let mut r = Self::new();
        r.register(BuildMode::Path, || Box::new(modes::path::PathStrategy::new()));
        r.register(BuildMode::Wall, || Box::new(modes::wall::WallStrategy::new()));
        r.register(BuildMode::Tower, || Box::new(modes::tower::TowerStrategy::new()));
        r.register(BuildMode::Excavation, || Box::new(modes::excavation::ExcavationStrategy::new()));
        r.register(BuildMode::Mining, || Box::new(modes::mining::MiningStrategy::new()));
        r.register(BuildMode::Tunnel, || Box::new(modes::tunnel::TunnelStrategy::new()));
        r.register(BuildMode::Terraform, || Box::new(modes::terraform::TerraformStrategy::new()));
        r.register(BuildMode::Tree, || Box::new(modes::tree::TreeStrategy::new()));
        r
    }

    pub fn register(&mut self, mode: BuildMode, factory: StrategyFactory) {
        self.factories.insert(mode, factory);
    }

    pub fn create(&self, mode: BuildMode) -> Option<Box<dyn Strategy>> {
        self.factories.get(&mode).map(|f| f())
    }

    pub fn contains(&self, mode: BuildMode) -> bool {
        self.factories.contains_key(&mode)
    }

    pub fn modes(&self) -> impl Iterator<Item = BuildMode> + '_ {
        self.factories.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Shared placement action
// ---------------------------------------------------------------------------

/// Side effects of placement callbacks, folded into the context after the
/// planner tick (the callback cannot borrow the context itself).
#[derive(Clone, Debug, Default)]
pub struct PlaceLog {
    pub placed: Vec<(VoxelCoord, MaterialId)>,
    pub missing: Option<MaterialId>,
}

impl PlaceLog {
    pub fn flush(self, ctx: &mut TaskContext) {
        for (pos, material) in self.placed {
            ctx.blocks_placed += 1;
            ctx.events.push(EngineEvent::BlockPlaced { pos, material });
        }
    }
}

/// Place one block of `material` at `pos` from the inventory. A different
/// block already there is replaced and its drops collected; an unbreakable
/// one is left alone.
pub fn place_block(
    log: &mut PlaceLog,
    host: &mut HostEnv<'_>,
    pos: VoxelCoord,
    material: MaterialId,
    preview: Option<VoxelCoord>,
) -> PlaceResult {
    let existing = host.world.material(pos);
    if existing == material {
        return PlaceResult::Placed;
    }
    if !existing.is_air() && host.world.hardness(existing) < 0.0 {
        log::debug!("skipping unbreakable cell {}", pos);
        return PlaceResult::Placed;
    }
    if !host.inventory.take_block(material) {
        log.missing = Some(material);
        return PlaceResult::Failed;
    }
    if !existing.is_air() {
        for stack in host.world.drops(existing, None) {
            if let Some(left) = host.inventory.insert(stack) {
                host.world.spawn_item(pos.center(), left);
            }
        }
    }
    host.effects.begin_hand_animation(Hand::Main, pos, preview);
    host.world.set_material(pos, material);
    log.placed.push((pos, material));
    PlaceResult::Placed
}
