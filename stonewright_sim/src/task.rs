// Build task: one agent's autonomous job, driving one strategy.
//
// `BuildTask` is the outer state machine the host talks to. It owns the
// selected mode's `Strategy`, the shared `TaskContext` and the lifecycle:
//
//   Idle --feed--> Initializing --ok--> Ticking --Complete--> Complete
//                        |                 |  ^
//                        +--halt--> Idle   |  +--unloaded-- ReturningToDepot
//                                          +--NeedsDepot--------^
//
// - `feed()` is the host's start signal (the agent was handed a resource
//   token). It starts an idle task and clears the waiting flag of one that
//   ran out of materials. Nothing else clears that flag.
// - `on_owner_attacked()` cancels: the strategy is stopped and the task
//   goes to `Stopped`.
// - A strategy `Halt` (missing anchor, template or palette, or a tiling
//   that kept contradicting itself) disables the task quietly: a `warn!`
//   log, a `Halted` event, back to `Idle`. Nothing is surfaced to the host
//   as an error.
// - While waiting for resources the task does nothing but show a resource
//   cue every `resource_cue_interval` ticks.
// - Depot runs walk to a stand next to the next depot container (rotating
//   over as many depots as the mode asks for), unload every non-tool stack
//   except the fallback building block, and resume ticking.
//
// Persistence (`write_state` / `read_state`) covers the task-level keys
// (`task.*`) plus the strategy's own. A resumed task re-enters
// `Initializing` so the strategy rebuilds its generator from the restored
// cursors before the next tick.
//
// See also: `strategy.rs` for the strategy trait and registry, `modes/`
// for the modes, `event.rs` for what the host drains each tick.
//
// **Critical constraint: determinism.** The task seed is a pure function of
// the agent id and the task serial, and both are persisted, so a resumed
// task samples the same gradients and grows the same tree.

use crate::config::{EngineConfig, SettingKey};
use crate::error::EngineError;
use crate::event::{EngineEvent, HaltReason};
use crate::gradient::{Gradient, GradientGroup};
use crate::host::{HostEnv, TrackedActor};
use crate::persist::StateRecord;
use crate::planner::{find_stand_position, in_reach};
use crate::strategy::{BuildMode, Strategy, StrategyRegistry, TaskContext, TickOutcome};
use crate::template::ModuleTemplate;
use crate::types::{AgentId, Facing, ItemKind, MaterialId, VoxelCoord};
use serde::{Deserialize, Serialize};
use stonewright_hash::TaskSeed;

/// Lifecycle state of a build task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// No work in progress. Waiting for the start signal.
    #[default]
    Idle,
    /// Started; the strategy initializes on the next tick.
    Initializing,
    Ticking,
    /// Walking to a depot container to unload.
    ReturningToDepot,
    /// The mode finished on its own.
    Complete,
    /// Cancelled by the owner.
    Stopped,
}

impl TaskState {
    /// States from which the start signal (re)starts the task.
    fn is_startable(self) -> bool {
        matches!(self, TaskState::Idle | TaskState::Complete | TaskState::Stopped)
    }
}

pub struct BuildTask {
    registry: StrategyRegistry,
    mode: Option<BuildMode>,
    strategy: Option<Box<dyn Strategy>>,
    ctx: TaskContext,
    state: TaskState,
    /// Set when placement ran out of a material; `Some(None)` when the
    /// inventory filled up with no depot to unload into.
    waiting: Option<Option<MaterialId>>,
    wait_ticks: u64,
    serial: u64,
    depot_cursor: usize,
    depot_target: Option<VoxelCoord>,
    depot_idle_ticks: u32,
}

impl std::fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildTask")
            .field("agent", &self.ctx.agent)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("waiting", &self.waiting)
            .finish_non_exhaustive()
    }
}

impl BuildTask {
    /// A task with every built-in mode available.
    pub fn new(agent: AgentId, config: EngineConfig) -> Self {
        Self::with_registry(agent, config, StrategyRegistry::with_builtin_modes())
    }

    pub fn with_registry(agent: AgentId, config: EngineConfig, registry: StrategyRegistry) -> Self {
        Self {
            registry,
            mode: None,
            strategy: None,
            ctx: TaskContext::new(agent, TaskSeed::new(agent.0, 0), config),
            state: TaskState::Idle,
            waiting: None,
            wait_ticks: 0,
            serial: 0,
            depot_cursor: 0,
            depot_target: None,
            depot_idle_ticks: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn mode(&self) -> Option<BuildMode> {
        self.mode
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }

    /// The material the task is waiting for, if it is waiting for one.
    pub fn waiting_for(&self) -> Option<MaterialId> {
        self.waiting.flatten()
    }

    pub fn strategy(&self) -> Option<&dyn Strategy> {
        self.strategy.as_deref()
    }

    /// Drain the events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    // -----------------------------------------------------------------------
    // Host surface
    // -----------------------------------------------------------------------

    /// Switch to `mode`. Any running strategy is stopped first; the new one
    /// waits for the start signal.
    pub fn select_mode(&mut self, mode: BuildMode, host: &mut HostEnv<'_>) -> Result<(), EngineError> {
        let strategy = self
            .registry
            .create(mode)
            .ok_or_else(|| EngineError::UnknownMode(mode.to_string()))?;
        if let Some(mut old) = self.strategy.take() {
            old.stop(&mut self.ctx, host);
        }
        host.nav.stop();
        self.serial += 1;
        self.ctx.seed = TaskSeed::new(self.ctx.agent.0, self.serial);
        self.strategy = Some(strategy);
        self.mode = Some(mode);
        self.state = TaskState::Idle;
        self.waiting = None;
        self.depot_target = None;
        log::info!("agent {} selected {} mode", self.ctx.agent.0, mode);
        self.ctx.events.push(EngineEvent::ModeSelected { mode });
        Ok(())
    }

    /// The start signal: start an idle task, or resume one waiting for
    /// resources.
    pub fn feed(&mut self) {
        let Some(mode) = self.mode else {
            return;
        };
        if self.waiting.take().is_some() {
            log::info!("agent {} resumed {} mode", self.ctx.agent.0, mode);
            self.ctx.events.push(EngineEvent::Started { mode });
            return;
        }
        if self.state.is_startable() {
            if self.state != TaskState::Idle {
                // A finished or cancelled strategy starts over from scratch.
                self.strategy = self.registry.create(mode);
            }
            self.state = TaskState::Initializing;
        }
    }

    /// The owner attacked the agent: cancel whatever is in progress.
    pub fn on_owner_attacked(&mut self, host: &mut HostEnv<'_>) {
        if matches!(self.state, TaskState::Idle | TaskState::Stopped) {
            return;
        }
        if let Some(s) = self.strategy.as_mut() {
            s.stop(&mut self.ctx, host);
        }
        host.nav.stop();
        self.state = TaskState::Stopped;
        self.waiting = None;
        self.depot_target = None;
        log::info!("agent {} cancelled by its owner", self.ctx.agent.0);
        self.ctx.events.push(EngineEvent::Cancelled);
    }

    /// Apply an integer-valued setting and notify the strategy.
    pub fn set_setting(&mut self, key: SettingKey, value: i64) -> Result<(), EngineError> {
        self.ctx.settings.apply(key, value)?;
        self.notify(key);
        Ok(())
    }

    pub fn set_origin(&mut self, origin: Option<VoxelCoord>) {
        self.ctx.settings.origin = origin;
        self.notify(SettingKey::Origin);
    }

    pub fn set_facing(&mut self, facing: Facing) {
        self.ctx.settings.facing = facing;
        self.notify(SettingKey::Facing);
    }

    pub fn set_depots(&mut self, depots: Vec<VoxelCoord>) {
        self.ctx.settings.depots = depots;
        self.depot_cursor = 0;
    }

    /// Captured template: a module, skeleton or tree sample depending on
    /// the mode. Takes effect at the next initialization.
    pub fn set_template(&mut self, template: Option<ModuleTemplate>) {
        self.ctx.template = template;
    }

    pub fn set_linear_gradient(&mut self, gradient: Gradient) {
        self.ctx.linear_gradient = gradient;
    }

    pub fn set_grouped_gradients(&mut self, group: GradientGroup) {
        self.ctx.grouped_gradients = group;
    }

    fn notify(&mut self, key: SettingKey) {
        if let Some(s) = self.strategy.as_mut() {
            s.on_configuration_changed(&self.ctx, key);
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// One engine step. Returns the state after the step.
    pub fn tick(&mut self, host: &mut HostEnv<'_>, tracked: Option<&TrackedActor>) -> TaskState {
        match self.state {
            TaskState::Idle | TaskState::Complete | TaskState::Stopped => {}
            TaskState::Initializing => self.initialize(host),
            TaskState::Ticking => self.tick_strategy(host, tracked),
            TaskState::ReturningToDepot => self.tick_depot_run(host),
        }
        self.state
    }

    fn initialize(&mut self, host: &mut HostEnv<'_>) {
        let (Some(strategy), Some(mode)) = (self.strategy.as_mut(), self.mode) else {
            self.state = TaskState::Idle;
            return;
        };
        match strategy.initialize(&mut self.ctx, host) {
            Ok(()) => {
                log::info!("agent {} started {} mode", self.ctx.agent.0, mode);
                self.ctx.events.push(EngineEvent::Started { mode });
                self.state = TaskState::Ticking;
            }
            Err(reason) => self.halt(reason, host),
        }
    }

    fn tick_strategy(&mut self, host: &mut HostEnv<'_>, tracked: Option<&TrackedActor>) {
        if self.waiting.is_some() {
            self.wait_ticks += 1;
            let interval = self.ctx.config.resource_cue_interval.max(1);
            if self.wait_ticks % interval == 1 || interval == 1 {
                host.effects.resource_cue(self.ctx.agent);
            }
            return;
        }
        let Some(strategy) = self.strategy.as_mut() else {
            self.state = TaskState::Idle;
            return;
        };
        self.ctx.ticks += 1;
        let outcome = if strategy.is_complete() {
            TickOutcome::Complete
        } else {
            strategy.tick(&mut self.ctx, host, tracked)
        };
        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::NeedsResources(material) => self.wait(material, host),
            TickOutcome::NeedsDepot => self.start_depot_run(host),
            TickOutcome::Complete => {
                let mode = strategy.mode();
                strategy.cleanup(&mut self.ctx, host);
                host.nav.stop();
                log::info!("agent {} completed {} mode", self.ctx.agent.0, mode);
                self.ctx.events.push(EngineEvent::TaskComplete { mode });
                self.state = TaskState::Complete;
            }
            TickOutcome::Halt(reason) => self.halt(reason, host),
        }
    }

    fn wait(&mut self, material: Option<MaterialId>, host: &mut HostEnv<'_>) {
        host.nav.stop();
        log::info!("agent {} waiting for {:?}", self.ctx.agent.0, material.map(|m| m.0));
        self.ctx.events.push(EngineEvent::WaitingForResources { material });
        self.waiting = Some(material);
        self.wait_ticks = 0;
    }

    fn halt(&mut self, reason: HaltReason, host: &mut HostEnv<'_>) {
        log::warn!("agent {} disabled its {:?} task: {:?}", self.ctx.agent.0, self.mode, reason);
        if let Some(s) = self.strategy.as_mut() {
            s.stop(&mut self.ctx, host);
        }
        host.nav.stop();
        self.ctx.events.push(EngineEvent::Halted { reason });
        self.state = TaskState::Idle;
    }

    // -----------------------------------------------------------------------
    // Depot runs
    // -----------------------------------------------------------------------

    /// The depot the next run goes to.
    fn next_depot(&self) -> Option<VoxelCoord> {
        let depots = &self.ctx.settings.depots;
        let rotation = self.strategy.as_ref().map_or(1, |s| s.depot_rotation()).max(1);
        let usable = depots.len().min(rotation);
        if usable == 0 {
            return None;
        }
        depots.get(self.depot_cursor % usable).copied()
    }

    fn start_depot_run(&mut self, host: &mut HostEnv<'_>) {
        let Some(depot) = self.next_depot() else {
            // Nowhere to unload; wait for the host to make room.
            self.wait(None, host);
            return;
        };
        if let Some(s) = self.strategy.as_mut() {
            s.cleanup(&mut self.ctx, host);
        }
        host.nav.stop();
        log::info!("agent {} inventory full; heading to depot {}", self.ctx.agent.0, depot);
        self.depot_target = Some(depot);
        self.depot_idle_ticks = 0;
        self.state = TaskState::ReturningToDepot;
    }

    fn tick_depot_run(&mut self, host: &mut HostEnv<'_>) {
        let Some(depot) = self.depot_target else {
            self.state = TaskState::Ticking;
            return;
        };
        let agent = host.nav.position();
        let unload_distance = self.ctx.config.depot_unload_distance;
        if in_reach(agent, depot, unload_distance) {
            let stacks = unload(host, depot);
            log::info!("agent {} unloaded {} stack(s) at {}", self.ctx.agent.0, stacks, depot);
            self.ctx.events.push(EngineEvent::DepotUnloaded { depot, stacks });
            host.nav.stop();
            self.depot_cursor += 1;
            self.depot_target = None;
            self.state = TaskState::Ticking;
            if host.inventory.is_full() {
                // The container is full or nothing was unloadable; going
                // back to work would only bring the agent straight back.
                log::warn!("agent {} could not make room at depot {}", self.ctx.agent.0, depot);
                self.wait(None, host);
            }
            return;
        }
        if !host.nav.is_idle() {
            return;
        }
        let stand = find_stand_position(&*host.world, depot, agent, unload_distance).unwrap_or(depot.up());
        self.depot_idle_ticks += 1;
        let planner = &self.ctx.config.planner;
        if self.depot_idle_ticks > planner.stuck_threshold {
            let [x, y, z] = stand.feet();
            let to = [x, y + planner.teleport_lift, z];
            log::info!("agent {} stuck on the way to depot {}; teleporting", self.ctx.agent.0, depot);
            host.nav.teleport(to);
            self.depot_idle_ticks = 0;
            self.ctx.events.push(EngineEvent::Teleported { to });
        } else {
            host.nav.start_moving_to(stand.feet(), planner.move_speed);
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn write_state(&self, record: &mut StateRecord) -> Result<(), EngineError> {
        if let Some(mode) = self.mode {
            record.put("task.mode", &mode)?;
        }
        // Mid-run states resume by re-initializing.
        let state = match self.state {
            TaskState::Ticking | TaskState::ReturningToDepot => TaskState::Initializing,
            s => s,
        };
        record.put("task.state", &state)?;
        record.put("task.waiting", &self.waiting.is_some())?;
        record.put("task.waiting_for", &self.waiting.flatten())?;
        record.put("task.serial", &self.serial)?;
        record.put("task.seed", &self.ctx.seed)?;
        record.put("task.settings", &self.ctx.settings)?;
        record.put("task.template", &self.ctx.template)?;
        record.put("task.linear_gradient", &self.ctx.linear_gradient)?;
        record.put("task.grouped_gradients", &self.ctx.grouped_gradients)?;
        record.put("task.counters", &(self.ctx.ticks, self.ctx.blocks_placed, self.ctx.blocks_mined))?;
        record.put("task.depot_cursor", &self.depot_cursor)?;
        if let Some(s) = &self.strategy {
            s.write_state(record)?;
        }
        Ok(())
    }

    /// Restore a task saved with `write_state`. The selected mode comes
    /// from the record.
    pub fn read_state(&mut self, record: &StateRecord) -> Result<(), EngineError> {
        self.mode = record.get("task.mode")?;
        self.strategy = match self.mode {
            Some(mode) => Some(
                self.registry
                    .create(mode)
                    .ok_or_else(|| EngineError::UnknownMode(mode.to_string()))?,
            ),
            None => None,
        };
        self.state = record.get("task.state")?.unwrap_or_default();
        let waiting: bool = record.get("task.waiting")?.unwrap_or(false);
        let waiting_for: Option<MaterialId> = record.get("task.waiting_for")?.flatten();
        self.waiting = waiting.then_some(waiting_for);
        self.serial = record.get("task.serial")?.unwrap_or(0);
        self.ctx.seed = record.require("task.seed")?;
        self.ctx.settings = record.get("task.settings")?.unwrap_or_default();
        self.ctx.template = record.get("task.template")?.flatten();
        self.ctx.linear_gradient = record.get("task.linear_gradient")?.unwrap_or_default();
        self.ctx.grouped_gradients = record.get("task.grouped_gradients")?.unwrap_or_default();
        let (ticks, placed, mined): (u64, u64, u64) = record.get("task.counters")?.unwrap_or_default();
        self.ctx.ticks = ticks;
        self.ctx.blocks_placed = placed;
        self.ctx.blocks_mined = mined;
        self.depot_cursor = record.get("task.depot_cursor")?.unwrap_or(0);
        self.depot_target = None;
        if let Some(s) = self.strategy.as_mut() {
            s.read_state(record)?;
        }
        Ok(())
    }
}

/// Move every stack into the container at `depot` except tools and one
/// stack of the fallback building block. Returns how many slots were
/// emptied or reduced.
fn unload(host: &mut HostEnv<'_>, depot: VoxelCoord) -> u32 {
    let mut keep = host.inventory.building_block_fallback();
    let mut moved = 0;
    for i in 0..host.inventory.slot_count() {
        let Some(stack) = host.inventory.slot(i) else {
            continue;
        };
        let kept = match stack.kind {
            ItemKind::Tool(_) => true,
            ItemKind::Block(m) if Some(m) == keep => {
                keep = None;
                true
            }
            _ => false,
        };
        if kept {
            continue;
        }
        let before = stack.count;
        let leftover = host.world.insert_into_container(depot, stack);
        if leftover.as_ref().is_none_or(|l| l.count < before) {
            moved += 1;
        }
        host.inventory.set_slot(i, leftover);
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::host::Inventory;
    use crate::inventory::SlotInventory;
    use crate::types::{ItemStack, Tool, ToolKind};
    use crate::world::{MaterialProps, MaterialTable, WorldAccess};

    const STONE: MaterialId = MaterialId(1);
    const DIRT: MaterialId = MaterialId(3);
    const PLANK: MaterialId = MaterialId(5);
    const CHEST: MaterialId = MaterialId(54);

    fn host() -> HeadlessHost {
        let mut table = MaterialTable::new();
        table.insert(STONE, MaterialProps::solid(1.5, None));
        table.insert(DIRT, MaterialProps::solid(0.05, None));
        let mut h = HeadlessHost::new(24, 12, 24, table, [4.5, 1.0, 4.5]);
        h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(23, 0, 23), STONE);
        h
    }

    fn pillar() -> ModuleTemplate {
        ModuleTemplate::new((0..2).map(|y| (VoxelCoord::new(0, y, 0), PLANK)))
    }

    fn run(task: &mut BuildTask, h: &mut HeadlessHost, max: usize) -> TaskState {
        for _ in 0..max {
            let state = task.tick(&mut h.env(), None);
            if matches!(state, TaskState::Complete | TaskState::Idle | TaskState::Stopped) || task.is_waiting() {
                return state;
            }
            h.advance();
        }
        task.state()
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let mut h = host();
        let mut task = BuildTask::with_registry(AgentId(1), EngineConfig::default(), StrategyRegistry::new());
        let err = task.select_mode(BuildMode::Tower, &mut h.env()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownMode(_)));
    }

    #[test]
    fn nothing_happens_before_the_start_signal() {
        let mut h = host();
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Tower, &mut h.env()).unwrap();
        assert_eq!(task.tick(&mut h.env(), None), TaskState::Idle);
        let events = task.drain_events();
        assert_eq!(events, vec![EngineEvent::ModeSelected { mode: BuildMode::Tower }]);
        assert!(task.drain_events().is_empty());
    }

    #[test]
    fn invalid_configuration_halts_silently() {
        let mut h = host();
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Tower, &mut h.env()).unwrap();
        task.set_template(Some(pillar()));
        task.feed();
        assert_eq!(task.state(), TaskState::Initializing);
        assert_eq!(task.tick(&mut h.env(), None), TaskState::Idle);
        let events = task.drain_events();
        assert!(events.contains(&EngineEvent::Halted { reason: HaltReason::MissingAnchor }));
    }

    #[test]
    fn tower_runs_to_completion() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(PLANK, 16));
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Tower, &mut h.env()).unwrap();
        task.set_template(Some(pillar()));
        task.set_origin(Some(VoxelCoord::new(8, 1, 8)));
        task.feed();
        assert_eq!(run(&mut task, &mut h, 300), TaskState::Complete);
        assert_eq!(h.world.material(VoxelCoord::new(8, 2, 8)), PLANK);
        let events = task.drain_events();
        assert!(events.contains(&EngineEvent::TaskComplete { mode: BuildMode::Tower }));
    }

    #[test]
    fn running_out_waits_until_fed_again() {
        let mut h = host();
        let _ = h.inventory.insert(ItemStack::blocks(PLANK, 1));
        let mut config = EngineConfig::default();
        config.resource_cue_interval = 5;
        let mut task = BuildTask::new(AgentId(1), config);
        task.select_mode(BuildMode::Tower, &mut h.env()).unwrap();
        task.set_template(Some(pillar()));
        task.set_origin(Some(VoxelCoord::new(8, 1, 8)));
        task.feed();
        run(&mut task, &mut h, 300);
        assert!(task.is_waiting());
        assert_eq!(task.waiting_for(), Some(PLANK));

        // Still waiting however long it ticks; the cue repeats.
        for _ in 0..20 {
            assert_eq!(task.tick(&mut h.env(), None), TaskState::Ticking);
        }
        assert!(task.is_waiting());
        assert_eq!(h.effects.cues.len(), 4);

        let _ = h.inventory.insert(ItemStack::blocks(PLANK, 4));
        task.feed();
        assert!(!task.is_waiting());
        assert_eq!(run(&mut task, &mut h, 300), TaskState::Complete);
    }

    #[test]
    fn owner_attack_cancels() {
        let mut h = host();
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Mining, &mut h.env()).unwrap();
        task.feed();
        task.tick(&mut h.env(), None);
        assert_eq!(task.state(), TaskState::Ticking);
        task.on_owner_attacked(&mut h.env());
        assert_eq!(task.state(), TaskState::Stopped);
        assert!(task.drain_events().contains(&EngineEvent::Cancelled));
        assert_eq!(task.tick(&mut h.env(), None), TaskState::Stopped);
    }

    #[test]
    fn full_inventory_unloads_at_depot_and_keeps_fallback() {
        let mut h = host();
        let depot = VoxelCoord::new(12, 1, 4);
        h.world.place_container(depot, CHEST);
        let mut stacks = vec![ItemStack::new(ItemKind::Tool(Tool::new(ToolKind::Pickaxe, 4.0, 200)), 1)];
        stacks.push(ItemStack::blocks(STONE, 64));
        stacks.push(ItemStack::blocks(STONE, 64));
        stacks.push(ItemStack::blocks(DIRT, 10));
        h.inventory = SlotInventory::with_items(4, &stacks);

        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Excavation, &mut h.env()).unwrap();
        task.set_origin(Some(VoxelCoord::new(6, 0, 6)));
        task.set_depots(vec![depot]);
        task.feed();
        task.tick(&mut h.env(), None);
        assert_eq!(task.tick(&mut h.env(), None), TaskState::ReturningToDepot);
        for _ in 0..100 {
            h.advance();
            if task.tick(&mut h.env(), None) == TaskState::Ticking {
                break;
            }
        }
        assert_eq!(task.state(), TaskState::Ticking);
        // Stone is the fallback (largest count): one stack stays, the rest
        // goes into the chest with the dirt.
        assert_eq!(h.inventory.count_blocks(STONE), 64);
        assert_eq!(h.inventory.count_blocks(DIRT), 0);
        let contents = h.world.container_contents(depot).unwrap();
        assert_eq!(contents, &[ItemStack::blocks(STONE, 64), ItemStack::blocks(DIRT, 10)]);
        assert!(h.inventory.slot(0).is_some_and(|s| s.kind.as_tool().is_some()));
    }

    fn dirt_only_excavation(h: &mut HeadlessHost, depot: VoxelCoord) -> BuildTask {
        h.inventory = SlotInventory::with_items(3, &[ItemStack::blocks(DIRT, 64); 3]);
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        task.select_mode(BuildMode::Excavation, &mut h.env()).unwrap();
        task.set_origin(Some(VoxelCoord::new(6, 0, 6)));
        task.set_depots(vec![depot]);
        task.feed();
        task.tick(&mut h.env(), None);
        assert_eq!(task.tick(&mut h.env(), None), TaskState::ReturningToDepot);
        task
    }

    #[test]
    fn inventory_of_only_the_fallback_still_makes_room() {
        let mut h = host();
        let depot = VoxelCoord::new(12, 1, 4);
        h.world.place_container(depot, CHEST);
        let mut task = dirt_only_excavation(&mut h, depot);
        for _ in 0..100 {
            h.advance();
            if task.tick(&mut h.env(), None) == TaskState::Ticking {
                break;
            }
        }
        assert_eq!(task.state(), TaskState::Ticking);
        assert!(!task.is_waiting());
        assert_eq!(h.inventory.count_blocks(DIRT), 64);
        assert_eq!(h.inventory.empty_slots(), 2);
        assert_eq!(h.world.container_contents(depot).unwrap(), &[ItemStack::blocks(DIRT, 64); 2]);

        // Back at work, not straight back to the chest.
        for _ in 0..20 {
            h.advance();
            assert_eq!(task.tick(&mut h.env(), None), TaskState::Ticking);
        }
    }

    #[test]
    fn depot_that_takes_nothing_waits_instead_of_looping() {
        let mut h = host();
        // No container at the depot anchor: every stack comes back.
        let depot = VoxelCoord::new(12, 1, 4);
        let mut task = dirt_only_excavation(&mut h, depot);
        for _ in 0..100 {
            h.advance();
            if task.tick(&mut h.env(), None) == TaskState::Ticking {
                break;
            }
        }
        assert!(task.is_waiting());
        assert_eq!(task.waiting_for(), None);
        let events = task.drain_events();
        assert!(events.contains(&EngineEvent::DepotUnloaded { depot, stacks: 0 }));
        assert!(events.contains(&EngineEvent::WaitingForResources { material: None }));
        for _ in 0..50 {
            h.advance();
            assert_eq!(task.tick(&mut h.env(), None), TaskState::Ticking);
        }
        assert_eq!(h.inventory.count_blocks(DIRT), 192);
    }

    #[test]
    fn state_round_trip_resumes_the_same_task() {
        let mut h = host();
        let mut task = BuildTask::new(AgentId(7), EngineConfig::default());
        task.select_mode(BuildMode::Tunnel, &mut h.env()).unwrap();
        task.set_setting(SettingKey::TunnelLength, 12).unwrap();
        task.feed();
        task.tick(&mut h.env(), None);
        let mut record = StateRecord::new();
        task.write_state(&mut record).unwrap();

        let mut resumed = BuildTask::new(AgentId(7), EngineConfig::default());
        resumed.read_state(&record).unwrap();
        assert_eq!(resumed.mode(), Some(BuildMode::Tunnel));
        assert_eq!(resumed.state(), TaskState::Initializing);
        assert_eq!(resumed.context().seed, task.context().seed);
        assert_eq!(resumed.context().settings.tunnel_length, 12);
        assert_eq!(resumed.tick(&mut h.env(), None), TaskState::Ticking);
    }

    #[test]
    fn invalid_setting_value_is_rejected() {
        let mut task = BuildTask::new(AgentId(1), EngineConfig::default());
        assert!(task.set_setting(SettingKey::OrePolicy, 99).is_err());
        assert!(task.set_setting(SettingKey::PathWidth, 99).is_ok());
        assert_eq!(task.context().settings.path_width, 9);
    }
}
