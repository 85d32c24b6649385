// Integration tests for the digging modes driven through BuildTask.
//
// These run excavation and tunnel jobs end to end on a headless host and
// check the mining event stream: every broken voxel is reported exactly
// once, with the hand that broke it, and both hands take part.

use std::collections::BTreeSet;

use stonewright_sim::config::{EngineConfig, SettingKey};
use stonewright_sim::event::EngineEvent;
use stonewright_sim::headless::HeadlessHost;
use stonewright_sim::strategy::BuildMode;
use stonewright_sim::task::{BuildTask, TaskState};
use stonewright_sim::types::{AgentId, Facing, Hand, MaterialId, VoxelCoord};
use stonewright_sim::world::{MaterialProps, MaterialTable, WorldAccess};

const DIRT: MaterialId = MaterialId(3);

fn dirt_host(agent: [f64; 3]) -> HeadlessHost {
    let mut table = MaterialTable::new();
    table.insert(DIRT, MaterialProps::solid(0.05, None));
    let mut h = HeadlessHost::new(24, 12, 24, table, agent);
    h.world.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(23, 4, 23), DIRT);
    h
}

fn run(task: &mut BuildTask, h: &mut HeadlessHost, max: usize) -> TaskState {
    for _ in 0..max {
        let state = task.tick(&mut h.env(), None);
        if matches!(state, TaskState::Complete | TaskState::Idle | TaskState::Stopped) {
            return state;
        }
        h.advance();
    }
    task.state()
}

fn mined(events: &[EngineEvent]) -> Vec<(VoxelCoord, Hand)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::BlockMined { pos, hand, .. } => Some((*pos, *hand)),
            _ => None,
        })
        .collect()
}

#[test]
fn excavation_reports_each_voxel_once() {
    let mut h = dirt_host([1.5, 5.0, 1.5]);
    let mut task = BuildTask::new(AgentId(2), EngineConfig::default());
    task.select_mode(BuildMode::Excavation, &mut h.env()).unwrap();
    task.set_origin(Some(VoxelCoord::new(6, 4, 6)));
    task.set_setting(SettingKey::ExcavationWidth, 2).unwrap();
    task.set_setting(SettingKey::ExcavationHeight, 1).unwrap();
    task.set_setting(SettingKey::ExcavationDepth, 1).unwrap();
    task.feed();

    assert_eq!(run(&mut task, &mut h, 600), TaskState::Complete);
    let broken = mined(&task.drain_events());
    let unique: BTreeSet<_> = broken.iter().map(|&(p, _)| p).collect();
    assert_eq!(broken.len(), 8);
    assert_eq!(unique.len(), 8);
    assert_eq!(task.context().blocks_mined, 8);
    for &p in &unique {
        assert!(!h.world.is_solid(p));
    }
}

#[test]
fn tunnel_uses_both_hands() {
    let mut h = dirt_host([3.5, 5.0, 10.5]);
    h.world.fill(VoxelCoord::new(4, 5, 6), VoxelCoord::new(20, 8, 14), DIRT);
    let mut task = BuildTask::new(AgentId(2), EngineConfig::default());
    task.select_mode(BuildMode::Tunnel, &mut h.env()).unwrap();
    task.set_origin(Some(VoxelCoord::new(4, 5, 10)));
    task.set_facing(Facing::East);
    task.set_setting(SettingKey::TunnelWidth, 1).unwrap();
    task.set_setting(SettingKey::TunnelHeight, 2).unwrap();
    task.set_setting(SettingKey::TunnelLength, 4).unwrap();
    task.feed();

    assert_eq!(run(&mut task, &mut h, 600), TaskState::Complete);
    let broken = mined(&task.drain_events());
    assert_eq!(broken.len(), 8);
    assert!(broken.iter().any(|&(_, hand)| hand == Hand::Main));
    assert!(broken.iter().any(|&(_, hand)| hand == Hand::Off));
    assert!(h.world.is_solid(VoxelCoord::new(8, 5, 10)));
}
