// stonewright_sim: autonomous voxel build-task engine.
//
// This crate contains the logic that lets an agent carry out a build job in
// a voxel world on its own: pave a path behind a player, lay wall modules,
// raise a tower, dig a pit, branch mine, cut a tunnel, terraform a hill or
// grow a tree. The host owns the world, the agent's body and its inventory
// and exposes them through the collaborator traits in `host.rs`; the engine
// decides what to do each tick and calls back into them.
//
// Module overview:
// - `task.rs`:        BuildTask: the per-agent lifecycle the host drives.
// - `strategy.rs`:    Strategy trait, TaskContext, StrategyRegistry.
// - `modes/`:         The eight build modes plus the shared Builder and DigCrew drivers.
// - `generators/`:    Spatial generators (path, wall, tower, excavation, mining, tunnel, alpha shell, WFC).
// - `planner.rs`:     Reach-aware placement planner (stand search, deferral, forced teleport).
// - `mining.rs`:      Dual-hand mining sessions and ore-vein follow-up.
// - `tool_cache.rs`:  Per-material best-tool cache keyed by inventory revision.
// - `gradient.rs`:    Material gradients with windowed noise, and slope classes.
// - `template.rs`:    Captured module templates and their orientations.
// - `host.rs`:        Navigator / Inventory / Effects traits and HostEnv.
// - `world.rs`:       WorldAccess trait, material table, dense VoxelWorld.
// - `inventory.rs`:   SlotInventory, the reference inventory.
// - `headless.rs`:    HeadlessHost for tests, benches and offline runs.
// - `config.rs`:      EngineConfig + ModeSettings: every tunable.
// - `event.rs`:       EngineEvent: the narrative output drained by the host.
// - `persist.rs`:     StateRecord: flat key-value save format.
// - `error.rs`:       EngineError for the host-facing fallible calls.
// - `types.rs`:       VoxelCoord, MaterialId, Facing, items and tools.
// - `hash`:           Re-exported from `stonewright_hash`: pure spatial hashing and TaskSeed.
//
// The engine never installs a logger and never touches rendering, input or
// networking; hosts wire those up around it.
//
// **Critical constraint: determinism.** A task is a pure function of its
// seed, its settings and what the host reports. All "randomness" is a hash
// of coordinates and the task seed (`stonewright_hash`). No `HashMap` on any
// path whose iteration order could leak, no system time, no OS entropy.
// Use `BTreeMap` for ordered collections.

pub mod config;
pub mod error;
pub mod event;
pub mod generators;
pub mod gradient;
pub use stonewright_hash as hash;
pub mod headless;
pub mod host;
pub mod inventory;
pub mod mining;
pub mod modes;
pub mod persist;
pub mod planner;
pub mod strategy;
pub mod task;
pub mod template;
pub mod tool_cache;
pub mod types;
pub mod world;
