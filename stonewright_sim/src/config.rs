// Data-driven engine configuration and per-mode settings.
//
// Two layers:
//
// - `EngineConfig`: every tunable constant of the shared engines (reach,
//   stuck threshold, break pacing, swing interval, WFC budget, ...), loaded
//   from JSON at startup and never mutated while a task runs. The engine
//   never uses magic numbers; it reads from here.
// - `ModeSettings`: the sliders a host UI exposes per build mode (path
//   width, excavation height × depth, branch spacing, ore policy, tiling
//   preset) plus the anchors (origin, facing, depot containers). Changed at
//   any time through `BuildTask::set_setting()`; keys for which
//   `SettingKey::rebuilds_generator()` is true make the active strategy
//   clear its in-flight generator state.
//
// See also: `task.rs` which owns both, `strategy.rs` for
// `on_configuration_changed`, `planner.rs`/`mining.rs` for the consumers
// of the planner and mining sections.
//
// **Critical constraint: determinism.** Config values feed straight into
// target generation. Two hosts with the same config and world produce the
// same build.

use crate::error::EngineError;
use crate::types::{Facing, MaterialId, Tool, VoxelCoord};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine tunables
// ---------------------------------------------------------------------------

/// Placement planner tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Euclidean reach from the agent's feet voxel centre to a target centre.
    pub reach: f64,
    /// Distance from the stand position at which the agent counts as arrived.
    pub arrival_threshold: f64,
    /// Attempts before a deferred target jumps to the front of the queue.
    pub max_attempts: u32,
    /// Idle-navigator ticks before teleporting to the stand position.
    pub stuck_threshold: u32,
    /// Upward offset applied when teleporting, to avoid clipping into the floor.
    pub teleport_lift: f64,
    /// Speed passed to `Navigator::start_moving_to`.
    pub move_speed: f64,
    /// Queued candidates examined per tick when looking for a reachable one.
    pub candidate_scan_limit: usize,
}

/// Mining session tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Baseline ticks per point of hardness for a speed-1 tool.
    pub ticks_per_hardness: f32,
    /// Each hand runs at this fraction of baseline speed.
    pub hand_pace: f32,
    /// Swing ticks between hand animations and particle bursts.
    pub swing_interval: u32,
}

/// Top-level engine configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub planner: PlannerConfig,
    pub mining: MiningConfig,

    /// Path mode: horizontal separation from the last anchor that triggers
    /// a new segment.
    pub path_trigger_distance: f64,
    /// Path mode: centreline voxels per emitted segment.
    pub path_segment_length: u32,

    /// Wall mode: the anchor must be at least this far (horizontally) from
    /// the tracked actor before another module is laid.
    pub wall_trigger_distance: f64,

    /// Tunnel/mining/excavation: pending targets at or below which the next
    /// chunk is generated.
    pub queue_low_water: usize,

    /// Distance from a depot container at which unloading happens.
    pub depot_unload_distance: f64,

    /// Ticks between host resource cues while waiting for materials.
    pub resource_cue_interval: u64,

    /// Marker material bounding infinite-depth excavation (a gold block in
    /// the usual registry).
    pub boundary_marker: Option<MaterialId>,
    /// Ring cap for infinite-depth excavation when no marker is found.
    pub excavation_max_rings: u32,

    /// Terraforming: alpha radius (voxels) of the shell around the skeleton.
    pub terraform_alpha: f64,

    /// Tree mode: WFC observations per tick.
    pub wfc_steps_per_tick: u32,
    /// Tree mode: contradictions tolerated before the task halts.
    pub wfc_max_restarts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig {
                reach: 4.5,
                arrival_threshold: 1.0,
                max_attempts: 3,
                stuck_threshold: 20,
                teleport_lift: 0.2,
                move_speed: 1.0,
                candidate_scan_limit: 12,
            },
            mining: MiningConfig {
                ticks_per_hardness: 30.0,
                hand_pace: 0.25,
                swing_interval: 5,
            },
            path_trigger_distance: 4.0,
            path_segment_length: 3,
            wall_trigger_distance: 3.0,
            queue_low_water: 2,
            depot_unload_distance: 2.5,
            resource_cue_interval: 20,
            boundary_marker: Some(MaterialId(41)),
            excavation_max_rings: 64,
            terraform_alpha: 2.5,
            wfc_steps_per_tick: 1,
            wfc_max_restarts: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Per-mode settings
// ---------------------------------------------------------------------------

/// Whether the mining-family modes break ore blocks they come across.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrePolicy {
    /// Leave ores in place.
    Never,
    /// Mine ores with whatever tool is best.
    #[default]
    Always,
    /// Mine ores only with a silk-touch or fortune III (or better) tool.
    SilkOrFortune3,
}

impl OrePolicy {
    pub fn from_index(i: i64) -> Option<Self> {
        match i {
            0 => Some(OrePolicy::Never),
            1 => Some(OrePolicy::Always),
            2 => Some(OrePolicy::SilkOrFortune3),
            _ => None,
        }
    }

    /// Whether an ore may be mined given the best carried tool.
    pub fn allows(self, tool: Option<&Tool>) -> bool {
        match self {
            OrePolicy::Never => false,
            OrePolicy::Always => true,
            OrePolicy::SilkOrFortune3 => tool.is_some_and(|t| t.silk_touch || t.fortune >= 3),
        }
    }
}

/// Tree-mode tiling presets: tile edge length and output grid in tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TilingPreset {
    Compact,
    #[default]
    Standard,
    Sprawling,
}

impl TilingPreset {
    pub fn from_index(i: i64) -> Option<Self> {
        match i {
            0 => Some(TilingPreset::Compact),
            1 => Some(TilingPreset::Standard),
            2 => Some(TilingPreset::Sprawling),
            _ => None,
        }
    }

    /// Edge length of one cubic tile, in voxels.
    pub fn tile_size(self) -> i32 {
        match self {
            TilingPreset::Compact => 2,
            TilingPreset::Standard | TilingPreset::Sprawling => 3,
        }
    }

    /// Output grid dimensions in tiles (x, y, z).
    pub fn grid(self) -> (i32, i32, i32) {
        match self {
            TilingPreset::Compact => (3, 4, 3),
            TilingPreset::Standard => (3, 5, 3),
            TilingPreset::Sprawling => (5, 6, 5),
        }
    }
}

/// Host-settable knobs. Integer-valued keys go through `ModeSettings::apply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    Origin,
    Facing,
    PathWidth,
    TowerModules,
    ExcavationWidth,
    ExcavationHeight,
    ExcavationDepth,
    BranchSpacing,
    BranchDepth,
    TunnelWidth,
    TunnelHeight,
    TunnelLength,
    OrePolicy,
    TilingPreset,
}

impl SettingKey {
    /// Keys whose change invalidates generator state already computed.
    pub fn rebuilds_generator(self) -> bool {
        matches!(self, SettingKey::Origin | SettingKey::Facing | SettingKey::TilingPreset)
    }
}

/// Per-mode sliders and anchors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeSettings {
    /// Anchor corner / start point for anchored modes.
    pub origin: Option<VoxelCoord>,
    /// Direction linear jobs advance in.
    pub facing: Facing,
    /// Depot containers. Tunnel mode rotates over the first three.
    pub depots: Vec<VoxelCoord>,

    /// Path cross-section width (odd widths are symmetric).
    pub path_width: u32,
    /// Tower: how many times the module repeats upward.
    pub tower_modules: u32,
    /// Excavation: rings to dig.
    pub excavation_width: u32,
    /// Excavation: layers cleared at and above the origin.
    pub excavation_height: u32,
    /// Excavation: layers dug below the origin; 0 digs to the world floor
    /// and bounds the rings by the boundary marker instead.
    pub excavation_depth: u32,
    /// Mining: spine blocks between branches.
    pub branch_spacing: u32,
    /// Mining: branch length on each side.
    pub branch_depth: u32,
    pub tunnel_width: u32,
    pub tunnel_height: u32,
    /// Tunnel slices to cut.
    pub tunnel_length: u32,
    pub ore_policy: OrePolicy,
    pub tiling_preset: TilingPreset,
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self {
            origin: None,
            facing: Facing::North,
            depots: Vec::new(),
            path_width: 3,
            tower_modules: 1,
            excavation_width: 8,
            excavation_height: 3,
            excavation_depth: 4,
            branch_spacing: 3,
            branch_depth: 12,
            tunnel_width: 3,
            tunnel_height: 3,
            tunnel_length: 32,
            ore_policy: OrePolicy::Always,
            tiling_preset: TilingPreset::Standard,
        }
    }
}

impl ModeSettings {
    /// Apply an integer-valued setting. Values are clamped into each
    /// slider's range; enum keys take the variant index.
    pub fn apply(&mut self, key: SettingKey, value: i64) -> Result<(), EngineError> {
        let clamp = |lo: i64, hi: i64| value.clamp(lo, hi) as u32;
        match key {
            SettingKey::PathWidth => self.path_width = clamp(1, 9),
            SettingKey::TowerModules => self.tower_modules = clamp(1, 64),
            SettingKey::ExcavationWidth => self.excavation_width = clamp(1, 64),
            SettingKey::ExcavationHeight => self.excavation_height = clamp(1, 16),
            SettingKey::ExcavationDepth => self.excavation_depth = clamp(0, 256),
            SettingKey::BranchSpacing => self.branch_spacing = clamp(1, 16),
            SettingKey::BranchDepth => self.branch_depth = clamp(1, 64),
            SettingKey::TunnelWidth => self.tunnel_width = clamp(1, 9),
            SettingKey::TunnelHeight => self.tunnel_height = clamp(2, 9),
            SettingKey::TunnelLength => self.tunnel_length = clamp(1, 4096),
            SettingKey::OrePolicy => {
                self.ore_policy = OrePolicy::from_index(value)
                    .ok_or(EngineError::InvalidSetting { key, value })?;
            }
            SettingKey::TilingPreset => {
                self.tiling_preset = TilingPreset::from_index(value)
                    .ok_or(EngineError::InvalidSetting { key, value })?;
            }
            SettingKey::Facing => {
                self.facing = usize::try_from(value)
                    .ok()
                    .and_then(|i| Facing::ALL.get(i).copied())
                    .ok_or(EngineError::InvalidSetting { key, value })?;
            }
            SettingKey::Origin => return Err(EngineError::InvalidSetting { key, value }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        let restored = EngineConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
        assert_eq!(restored.planner.stuck_threshold, 20);
        assert_eq!(restored.mining.swing_interval, 5);
    }

    #[test]
    fn config_rejects_malformed_json() {
        assert!(EngineConfig::from_json("{\"planner\": 3}").is_err());
    }

    #[test]
    fn settings_clamp_sliders() {
        let mut s = ModeSettings::default();
        s.apply(SettingKey::PathWidth, 40).unwrap();
        assert_eq!(s.path_width, 9);
        s.apply(SettingKey::TunnelHeight, 0).unwrap();
        assert_eq!(s.tunnel_height, 2);
    }

    #[test]
    fn settings_reject_unknown_enum_index() {
        let mut s = ModeSettings::default();
        assert!(s.apply(SettingKey::OrePolicy, 7).is_err());
        assert_eq!(s.ore_policy, OrePolicy::Always);
        s.apply(SettingKey::OrePolicy, 2).unwrap();
        assert_eq!(s.ore_policy, OrePolicy::SilkOrFortune3);
        s.apply(SettingKey::Facing, 1).unwrap();
        assert_eq!(s.facing, Facing::East);
    }

    #[test]
    fn ore_policy_gates_on_enchantments() {
        use crate::types::ToolKind;
        let mut pick = Tool::new(ToolKind::Pickaxe, 8.0, 1000);
        assert!(!OrePolicy::SilkOrFortune3.allows(Some(&pick)));
        pick.fortune = 3;
        assert!(OrePolicy::SilkOrFortune3.allows(Some(&pick)));
        assert!(!OrePolicy::SilkOrFortune3.allows(None));
        assert!(!OrePolicy::Never.allows(Some(&pick)));
        assert!(OrePolicy::Always.allows(None));
    }

    #[test]
    fn only_anchor_keys_rebuild_generators() {
        assert!(SettingKey::Origin.rebuilds_generator());
        assert!(SettingKey::TilingPreset.rebuilds_generator());
        assert!(!SettingKey::PathWidth.rebuilds_generator());
    }
}
