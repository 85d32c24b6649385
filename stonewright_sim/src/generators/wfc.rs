// Wave function collapse over tiles cut from a captured sample.
//
// `TileSet::extract` cuts the sample template into non-overlapping cubes of
// `tile_size`, deduplicates them (weight = how often each occurs), and
// records which tiles were seen next to which along each of the six face
// directions. Anything outside the sample counts as the all-air tile, which
// is always present, so the sample's own silhouette teaches the solver where
// a structure may end.
//
// `TreeCollapse` then tiles a `grid` of cells:
// - every cell starts with all tiles possible (a `u64` bitmask, so at most
//   `MAX_TILES` tiles; extra tiles are folded into air with a warning);
// - cells on the grid boundary may only hold tiles that were seen next to
//   air in that direction;
// - the root cell (bottom centre) is fixed to the tile at the bottom centre
//   of the sample, so the tree grows from its trunk;
// - each `step()` collapses the undecided cell with the fewest options
//   (ties broken by hash) to one weighted choice and propagates (AC-3).
//
// On a contradiction the solver restarts from scratch but keeps every cell
// the strategy already committed (built), so nothing in the world is ever
// contradicted. After `max_restarts` restarts it gives up.
//
// Grid cell index is `(y * gz + z) * gx + x`, so index order is bottom-up.
//
// **Critical constraint: determinism.** Every choice is a pure hash of the
// cell index, step count, restart count and task seed.

use crate::template::ModuleTemplate;
use crate::types::{FACE_OFFSETS, MaterialId, VoxelCoord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use stonewright_hash::{TaskSeed, hash_words, weighted_index};

pub const MAX_TILES: usize = 64;

/// The all-air tile is always index 0.
pub const AIR_TILE: usize = 0;

fn bit(t: usize) -> u64 {
    1u64 << t
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Solid cells, relative to the tile's low corner.
    pub cells: Vec<(VoxelCoord, MaterialId)>,
    pub weight: u32,
}

#[derive(Clone, Debug)]
pub struct TileSet {
    size: i32,
    tiles: Vec<Tile>,
    /// `allow[d][t]`: tiles that may sit in direction `d` of tile `t`.
    allow: [Vec<u64>; 6],
    /// Tiles that may sit against the grid boundary in direction `d`.
    edge: [u64; 6],
    root: usize,
}

impl TileSet {
    /// `None` for an empty sample.
    pub fn extract(sample: &ModuleTemplate, tile_size: i32) -> Option<Self> {
        let n = tile_size.max(1);
        let (lo, hi) = sample.bounds()?;
        let blocks = |lo: i32, hi: i32| (hi - lo) / n + 1;
        let (bx, by, bz) = (blocks(lo.x, hi.x), blocks(lo.y, hi.y), blocks(lo.z, hi.z));

        // Cut the sample into blocks.
        let mut contents: BTreeMap<(i32, i32, i32), Vec<(VoxelCoord, MaterialId)>> = BTreeMap::new();
        for &(p, m) in sample.cells() {
            let key = ((p.x - lo.x) / n, (p.y - lo.y) / n, (p.z - lo.z) / n);
            let local = VoxelCoord::new((p.x - lo.x) % n, (p.y - lo.y) % n, (p.z - lo.z) % n);
            contents.entry(key).or_default().push((local, m));
        }

        let mut tiles = vec![Tile { cells: Vec::new(), weight: 0 }];
        let mut index: BTreeMap<Vec<(VoxelCoord, MaterialId)>, usize> = BTreeMap::new();
        index.insert(Vec::new(), AIR_TILE);
        let mut grid: BTreeMap<(i32, i32, i32), usize> = BTreeMap::new();
        let mut truncated = 0usize;
        for y in 0..by {
            for z in 0..bz {
                for x in 0..bx {
                    let mut cells = contents.remove(&(x, y, z)).unwrap_or_default();
                    cells.sort_unstable();
                    let t = match index.get(&cells) {
                        Some(&t) => t,
                        None if tiles.len() < MAX_TILES => {
                            let t = tiles.len();
                            index.insert(cells.clone(), t);
                            tiles.push(Tile { cells, weight: 0 });
                            t
                        }
                        None => {
                            truncated += 1;
                            AIR_TILE
                        }
                    };
                    tiles[t].weight += 1;
                    grid.insert((x, y, z), t);
                }
            }
        }
        if truncated > 0 {
            log::warn!("tree sample has more than {} distinct tiles; {} block(s) treated as air", MAX_TILES, truncated);
        }
        tiles[AIR_TILE].weight = tiles[AIR_TILE].weight.max(1);

        let mut allow: [Vec<u64>; 6] = std::array::from_fn(|_| vec![0u64; tiles.len()]);
        for row in allow.iter_mut() {
            row[AIR_TILE] |= bit(AIR_TILE);
        }
        for (&(x, y, z), &t) in &grid {
            for (d, &(dx, dy, dz)) in FACE_OFFSETS.iter().enumerate() {
                let u = grid.get(&(x + dx, y + dy, z + dz)).copied().unwrap_or(AIR_TILE);
                allow[d][t] |= bit(u);
                allow[d ^ 1][u] |= bit(t);
            }
        }
        let mut edge = [0u64; 6];
        for (d, e) in edge.iter_mut().enumerate() {
            for t in 0..tiles.len() {
                if allow[d][t] & bit(AIR_TILE) != 0 {
                    *e |= bit(t);
                }
            }
        }
        let root = grid.get(&(bx / 2, 0, bz / 2)).copied().unwrap_or(AIR_TILE);
        Some(Self { size: n, tiles, allow, edge, root })
    }

    pub fn tile_size(&self) -> i32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, t: usize) -> &Tile {
        &self.tiles[t]
    }

    pub fn root(&self) -> usize {
        self.root
    }

    fn all_mask(&self) -> u64 {
        if self.tiles.len() >= 64 { u64::MAX } else { bit(self.tiles.len()) - 1 }
    }

    fn support(&self, d: usize, domain: u64) -> u64 {
        let mut out = 0;
        let mut rest = domain;
        while rest != 0 {
            let t = rest.trailing_zeros() as usize;
            out |= self.allow[d][t];
            rest &= rest - 1;
        }
        out
    }
}

/// What a collapse step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollapseStep {
    /// Cell `index` was decided.
    Collapsed(usize),
    /// Nothing left to decide.
    Settled,
    /// A contradiction forced a restart.
    Restarted,
    /// Out of restarts.
    GaveUp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeCollapse {
    grid: (i32, i32, i32),
    domains: Vec<u64>,
    committed: Vec<bool>,
    steps: u64,
    restarts: u32,
    seed: TaskSeed,
}

impl TreeCollapse {
    pub fn new(tiles: &TileSet, grid: (i32, i32, i32), seed: TaskSeed) -> Self {
        let grid = (grid.0.max(1), grid.1.max(1), grid.2.max(1));
        let count = (grid.0 * grid.1 * grid.2) as usize;
        let mut wfc = Self {
            grid,
            domains: vec![0; count],
            committed: vec![false; count],
            steps: 0,
            restarts: 0,
            seed,
        };
        if !wfc.reset(tiles) {
            log::warn!("tree tiling is contradictory from the start");
        }
        wfc
    }

    pub fn grid(&self) -> (i32, i32, i32) {
        self.grid
    }

    pub fn cell_count(&self) -> usize {
        self.domains.len()
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn index_of(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let (gx, gy, gz) = self.grid;
        if x < 0 || y < 0 || z < 0 || x >= gx || y >= gy || z >= gz {
            return None;
        }
        Some(((y * gz + z) * gx + x) as usize)
    }

    pub fn coords_of(&self, idx: usize) -> (i32, i32, i32) {
        let (gx, _, gz) = self.grid;
        let i = idx as i32;
        (i % gx, i / (gx * gz), (i / gx) % gz)
    }

    pub fn root_index(&self) -> usize {
        let (gx, _, gz) = self.grid;
        ((gz / 2) * gx + gx / 2) as usize
    }

    /// The decided tile of a cell.
    pub fn tile_at(&self, idx: usize) -> Option<usize> {
        let d = *self.domains.get(idx)?;
        (d.count_ones() == 1).then(|| d.trailing_zeros() as usize)
    }

    pub fn is_committed(&self, idx: usize) -> bool {
        self.committed.get(idx).copied().unwrap_or(false)
    }

    /// Decided cells not yet committed, bottom-up.
    pub fn ready_cells(&self) -> Vec<usize> {
        (0..self.domains.len())
            .filter(|&i| !self.committed[i] && self.tile_at(i).is_some())
            .collect()
    }

    /// Ready cells standing on the grid floor or on a committed cell,
    /// bottom-up.
    pub fn buildable_cells(&self) -> Vec<usize> {
        self.ready_cells()
            .into_iter()
            .filter(|&i| {
                let (x, y, z) = self.coords_of(i);
                y == 0 || self.index_of(x, y - 1, z).is_some_and(|below| self.committed[below])
            })
            .collect()
    }

    pub fn commit(&mut self, idx: usize) {
        if let Some(c) = self.committed.get_mut(idx) {
            *c = true;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.domains.iter().all(|d| d.count_ones() == 1)
    }

    pub fn is_done(&self) -> bool {
        self.is_settled() && self.committed.iter().all(|&c| c)
    }

    /// World cells of `tile` placed in grid cell `idx`. The grid is centred
    /// horizontally on `origin` and rises from it.
    pub fn cell_voxels(&self, tiles: &TileSet, idx: usize, origin: VoxelCoord) -> Vec<(VoxelCoord, MaterialId)> {
        let Some(t) = self.tile_at(idx) else {
            return Vec::new();
        };
        let n = tiles.tile_size();
        let (gx, _, gz) = self.grid;
        let (cx, cy, cz) = self.coords_of(idx);
        let base = origin.offset((cx - gx / 2) * n, cy * n, (cz - gz / 2) * n);
        tiles
            .tile(t)
            .cells
            .iter()
            .map(|&(p, m)| (base.offset(p.x, p.y, p.z), m))
            .collect()
    }

    /// Rebuild all domains, keeping committed cells. False on contradiction.
    fn reset(&mut self, tiles: &TileSet) -> bool {
        let all = tiles.all_mask();
        let kept: Vec<(usize, u64)> = (0..self.domains.len())
            .filter(|&i| self.committed[i])
            .map(|i| (i, self.domains[i]))
            .collect();
        let (gx, gy, gz) = self.grid;
        for idx in 0..self.domains.len() {
            let (x, y, z) = self.coords_of(idx);
            let mut d = all;
            let bounds = [x == gx - 1, x == 0, y == gy - 1, y == 0, z == gz - 1, z == 0];
            for (dir, at_edge) in bounds.into_iter().enumerate() {
                if at_edge {
                    d &= tiles.edge[dir];
                }
            }
            self.domains[idx] = d;
        }
        let root = self.root_index();
        self.domains[root] &= bit(tiles.root());
        for (i, d) in kept {
            self.domains[i] = d;
        }
        if self.domains.contains(&0) {
            return false;
        }
        self.propagate(tiles, (0..self.domains.len()).collect())
    }

    fn propagate(&mut self, tiles: &TileSet, mut queue: VecDeque<usize>) -> bool {
        while let Some(c) = queue.pop_front() {
            let (x, y, z) = self.coords_of(c);
            for (d, &(dx, dy, dz)) in FACE_OFFSETS.iter().enumerate() {
                let Some(nb) = self.index_of(x + dx, y + dy, z + dz) else {
                    continue;
                };
                let narrowed = self.domains[nb] & tiles.support(d, self.domains[c]);
                if narrowed != self.domains[nb] {
                    if narrowed == 0 {
                        return false;
                    }
                    self.domains[nb] = narrowed;
                    queue.push_back(nb);
                }
            }
        }
        true
    }

    fn restart(&mut self, tiles: &TileSet, max_restarts: u32) -> CollapseStep {
        self.restarts += 1;
        if self.restarts > max_restarts {
            log::warn!("tree tiling gave up after {} restarts", max_restarts);
            return CollapseStep::GaveUp;
        }
        log::debug!("tree tiling contradiction; restart {}", self.restarts);
        if self.reset(tiles) { CollapseStep::Restarted } else { self.restart(tiles, max_restarts) }
    }

    /// Decide one cell.
    pub fn step(&mut self, tiles: &TileSet, max_restarts: u32) -> CollapseStep {
        if self.restarts > max_restarts {
            return CollapseStep::GaveUp;
        }
        if self.domains.contains(&0) {
            return self.restart(tiles, max_restarts);
        }
        let salt = |idx: usize, steps: u64, restarts: u32| [idx as u64, steps, u64::from(restarts)];
        let pick = (0..self.domains.len())
            .filter(|&i| self.domains[i].count_ones() > 1)
            .min_by_key(|&i| {
                let h = hash_words(&salt(i, self.steps, self.restarts), self.seed.derive(1));
                (self.domains[i].count_ones(), h, i)
            });
        let Some(idx) = pick else {
            return CollapseStep::Settled;
        };

        let options: Vec<usize> = (0..tiles.len()).filter(|&t| self.domains[idx] & bit(t) != 0).collect();
        let weights: Vec<u32> = options.iter().map(|&t| tiles.tile(t).weight.max(1)).collect();
        let h = hash_words(&salt(idx, self.steps, self.restarts), self.seed);
        let choice = weighted_index(h, &weights).map_or(options[0], |i| options[i]);
        self.steps += 1;
        self.domains[idx] = bit(choice);
        if self.propagate(tiles, VecDeque::from([idx])) {
            CollapseStep::Collapsed(idx)
        } else {
            self.restart(tiles, max_restarts)
        }
    }
}
