// Benchmarks for the per-tick hot paths: stand-position search, gradient
// sampling, and the two heavier generators (alpha shell, WFC collapse).
//
// Run with `cargo bench -p stonewright_sim`.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use stonewright_sim::generators::alpha_shape::AlphaShell;
use stonewright_sim::generators::wfc::{CollapseStep, TileSet, TreeCollapse};
use stonewright_sim::gradient::{Gradient, sample_index};
use stonewright_sim::hash::TaskSeed;
use stonewright_sim::planner::{find_stand_position, stand_candidates};
use stonewright_sim::template::ModuleTemplate;
use stonewright_sim::types::{MaterialId, VoxelCoord};
use stonewright_sim::world::{MaterialProps, MaterialTable, VoxelWorld};

const STONE: MaterialId = MaterialId(1);
const LOG: MaterialId = MaterialId(17);
const LEAVES: MaterialId = MaterialId(18);

/// A 64×32×64 world with rolling terrain so stand search has to climb.
fn terrain() -> VoxelWorld {
    let mut table = MaterialTable::new();
    table.insert(STONE, MaterialProps::solid(1.5, None));
    let mut world = VoxelWorld::new(64, 32, 64, table);
    for z in 0..64 {
        for x in 0..64 {
            let h = 4 + ((x / 5 + z / 7) % 4);
            world.fill(VoxelCoord::new(x, 0, z), VoxelCoord::new(x, h, z), STONE);
        }
    }
    world
}

fn bench_stand_search(c: &mut Criterion) {
    let world = terrain();
    let agent = [10.5, 9.0, 10.5];
    let targets: Vec<VoxelCoord> = (0..16).map(|i| VoxelCoord::new(20 + i, 10, 30 - i)).collect();

    c.bench_function("find_stand_position_16", |b| {
        b.iter(|| {
            for &t in &targets {
                black_box(find_stand_position(&world, black_box(t), agent, 4.5));
            }
        });
    });

    c.bench_function("stand_candidates_single", |b| {
        b.iter(|| stand_candidates(&world, black_box(VoxelCoord::new(32, 10, 32)), agent, 4.5));
    });
}

fn bench_gradient(c: &mut Criterion) {
    let palette: Vec<Option<MaterialId>> = (1..=8).map(|i| Some(MaterialId(i))).collect();
    let gradient = Gradient::new(&palette, 2.0, 3);
    let seed = TaskSeed(0x5eed);

    c.bench_function("gradient_sample_4096", |b| {
        b.iter(|| {
            for i in 0..4096 {
                let pos = VoxelCoord::new(i % 64, i / 64, 7);
                black_box(gradient.sample(i as f64 / 512.0, pos, seed));
            }
        });
    });

    c.bench_function("sample_index_no_window", |b| {
        b.iter(|| sample_index(black_box(3.4), 0.0, 8, VoxelCoord::new(1, 2, 3), 1, seed));
    });
}

fn bench_alpha_shell(c: &mut Criterion) {
    // A ridge: two offset bars of skeleton voxels.
    let skeleton: Vec<VoxelCoord> = (0..24)
        .flat_map(|i| [VoxelCoord::new(i, 4, 10), VoxelCoord::new(i, 2 + i % 3, 14)])
        .collect();

    c.bench_function("alpha_shell_ridge", |b| {
        b.iter(|| AlphaShell::build(black_box(&skeleton), 2.5));
    });
}

fn bench_wfc(c: &mut Criterion) {
    let mut cells = Vec::new();
    for y in 0..4 {
        cells.push((VoxelCoord::new(0, y, 0), LOG));
    }
    for (x, z) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
        cells.push((VoxelCoord::new(x, 4, z), LEAVES));
        cells.push((VoxelCoord::new(x, 5, z), LEAVES));
    }
    cells.push((VoxelCoord::new(0, 4, 0), LOG));
    cells.push((VoxelCoord::new(0, 5, 0), LEAVES));
    let Some(tiles) = TileSet::extract(&ModuleTemplate::new(cells), 2) else {
        return;
    };

    c.bench_function("wfc_collapse_3x4x3", |b| {
        b.iter(|| {
            let mut collapse = TreeCollapse::new(&tiles, (3, 4, 3), TaskSeed(42));
            for _ in 0..256 {
                match collapse.step(&tiles, 8) {
                    CollapseStep::Settled | CollapseStep::GaveUp => break,
                    CollapseStep::Collapsed(_) | CollapseStep::Restarted => {}
                }
            }
            collapse
        });
    });
}

criterion_group!(benches, bench_stand_search, bench_gradient, bench_alpha_shell, bench_wfc);
criterion_main!(benches);
