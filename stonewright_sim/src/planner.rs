// Reach-aware placement planner.
//
// The planner turns an unordered set of target voxels into a sequence of
// "walk somewhere you can reach it from, then act on it" steps. Every build
// mode funnels its targets through one: placement modes act by placing a
// block, the digging modes act by handing the target to a mining hand.
//
// Targets live in exactly one of three partitions:
// - `pending`: not yet attempted,
// - `deferred`: attempted and postponed, each with an attempt counter
//   (`attempts`, which survives across partitions until the target is done),
// - `current`: the single target being walked to / acted on.
//
// Per tick (`tick()`), at most one navigation start and at most one call to
// the action callback happen:
// 1. With no current target, pick the best pending candidate (lowest level
//    for `BottomUp`, highest for `TopDown`, then nearest to the agent) that
//    has a stand position. Only `candidate_scan_limit` candidates are
//    examined per tick; if none of them has a stand, the best one is
//    deferred. When `pending` is empty the deferred queue is served from
//    its front.
// 2. Stand search (`find_stand_position`): every cell in the cube of radius
//    `ceil(reach)` around the target whose centre is within `reach` of the
//    target centre, with solid footing and two open cells for feet and
//    head. Sorted by distance to the agent, with candidates passing a coarse
//    straight-line clearance check first. If nothing qualifies and the
//    target has already failed `max_attempts - 1` times, the closest open
//    cell in reach is used anyway (or the cell above the target) and the
//    agent is teleported there.
// 3. Walk to the stand. While the navigator reports idle short of the
//    arrival threshold a stuck counter grows; at `stuck_threshold` the agent
//    is teleported to the stand (lifted slightly so it does not clip into
//    the floor).
// 4. Once arrived (or idle within reach), call the action callback with the
//    target and a preview of the next one. `Placed` removes the target,
//    `Failed` defers it, `Pending` keeps it current for another tick.
// 5. Deferral bumps the attempt counter. Below `max_attempts` the target goes
//    to the back of the deferred queue, at or above it goes to the front so
//    the forced path in step 2 is reached soon.
//
// See also: `mining.rs` for the digging action, `strategy.rs` for the
// placement action, `config.rs` for `PlannerConfig`.
//
// **Critical constraint: determinism.** Candidate ordering breaks every tie
// by coordinate, and stand search scans the cube in a fixed order.

use crate::config::PlannerConfig;
use crate::event::EngineEvent;
use crate::host::HostEnv;
use crate::types::{Pos3, VoxelCoord, dist_sq3};
use crate::world::WorldAccess;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

/// Vertical ordering of candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOrder {
    /// Lowest level first. Used for placing, so nothing floats.
    #[default]
    BottomUp,
    /// Highest level first. Used for digging, so nothing is undercut.
    TopDown,
}

/// What the action callback did with the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceResult {
    Placed,
    Failed,
    /// Still working on it (e.g. a block that takes several ticks to mine).
    Pending,
}

/// The single transition a planner tick made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerStatus {
    /// Walking, selecting, or waiting on a pending action.
    Working,
    PlacedBlock(VoxelCoord),
    Deferred(VoxelCoord),
    /// The queue just ran dry. Reported once per batch.
    Completed,
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Current {
    target: VoxelCoord,
    stand: VoxelCoord,
    forced: bool,
    moving: bool,
    stuck_ticks: u32,
}

#[derive(Clone, Debug)]
pub struct PlacementPlanner {
    config: PlannerConfig,
    order: BuildOrder,
    pending: Vec<VoxelCoord>,
    deferred: VecDeque<VoxelCoord>,
    attempts: BTreeMap<VoxelCoord, u32>,
    current: Option<Current>,
    /// Set while a batch is in flight; cleared when `Completed` is reported.
    has_work: bool,
}

impl PlacementPlanner {
    pub fn new(config: PlannerConfig, order: BuildOrder) -> Self {
        Self {
            config,
            order,
            pending: Vec::new(),
            deferred: VecDeque::new(),
            attempts: BTreeMap::new(),
            current: None,
            has_work: false,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Replace the whole queue. Targets for which `is_already_correct`
    /// returns true are dropped, duplicates are collapsed.
    pub fn set_blocks<I, F>(&mut self, targets: I, agent: Pos3, is_already_correct: F)
    where
        I: IntoIterator<Item = VoxelCoord>,
        F: Fn(VoxelCoord) -> bool,
    {
        self.clear();
        let mut list: Vec<VoxelCoord> = targets.into_iter().filter(|&p| !is_already_correct(p)).collect();
        list.sort_unstable();
        list.dedup();
        self.sort_by_key(&mut list, agent);
        self.has_work = !list.is_empty();
        self.pending = list;
    }

    /// Add one target unless it is already tracked.
    pub fn push(&mut self, pos: VoxelCoord) {
        if !self.contains(pos) {
            self.pending.push(pos);
            self.has_work = true;
        }
    }

    /// Forget `pos` wherever it is. Returns whether it was tracked.
    pub fn remove(&mut self, pos: VoxelCoord) -> bool {
        let mut found = false;
        if self.current.is_some_and(|c| c.target == pos) {
            self.current = None;
            found = true;
        }
        if let Some(i) = self.pending.iter().position(|&p| p == pos) {
            self.pending.remove(i);
            found = true;
        }
        if let Some(i) = self.deferred.iter().position(|&p| p == pos) {
            self.deferred.remove(i);
            found = true;
        }
        self.attempts.remove(&pos);
        found
    }

    pub fn contains(&self, pos: VoxelCoord) -> bool {
        self.current.is_some_and(|c| c.target == pos)
            || self.pending.contains(&pos)
            || self.deferred.contains(&pos)
    }

    /// Drop every target and any navigation state.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.deferred.clear();
        self.attempts.clear();
        self.current = None;
        self.has_work = false;
    }

    pub fn current_target(&self) -> Option<VoxelCoord> {
        self.current.map(|c| c.target)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Targets not yet done, in every partition.
    pub fn remaining(&self) -> usize {
        self.pending.len() + self.deferred.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn attempts(&self, pos: VoxelCoord) -> u32 {
        self.attempts.get(&pos).copied().unwrap_or(0)
    }

    /// The target that would be selected next after the current one.
    pub fn peek_next(&self, agent: Pos3) -> Option<VoxelCoord> {
        self.pending
            .iter()
            .copied()
            .min_by(|&a, &b| self.compare(a, b, agent))
            .or_else(|| self.deferred.front().copied())
    }

    fn compare(&self, a: VoxelCoord, b: VoxelCoord, agent: Pos3) -> Ordering {
        let level = match self.order {
            BuildOrder::BottomUp => a.y.cmp(&b.y),
            BuildOrder::TopDown => b.y.cmp(&a.y),
        };
        level
            .then_with(|| dist_sq3(a.center(), agent).total_cmp(&dist_sq3(b.center(), agent)))
            .then_with(|| a.cmp(&b))
    }

    fn sort_by_key(&self, list: &mut [VoxelCoord], agent: Pos3) {
        list.sort_by(|&a, &b| self.compare(a, b, agent));
    }

    fn defer(&mut self, pos: VoxelCoord, events: &mut Vec<EngineEvent>) -> PlannerStatus {
        let attempts = self.attempts.entry(pos).or_insert(0);
        *attempts += 1;
        let n = *attempts;
        if n < self.config.max_attempts {
            self.deferred.push_back(pos);
        } else {
            self.deferred.push_front(pos);
        }
        log::debug!("deferred {} after {} attempt(s)", pos, n);
        events.push(EngineEvent::TargetDeferred { pos, attempts: n });
        PlannerStatus::Deferred(pos)
    }

    /// Stand for `target`, falling back to a forced one once the target
    /// has used up its normal attempts.
    fn resolve_stand(&self, world: &dyn WorldAccess, target: VoxelCoord, agent: Pos3) -> Option<(VoxelCoord, bool)> {
        if let Some(stand) = find_stand_position(world, target, agent, self.config.reach) {
            return Some((stand, false));
        }
        if self.attempts(target) + 1 >= self.config.max_attempts {
            let stand = fallback_stand(world, target, agent, self.config.reach);
            log::debug!("no stand for {}; forcing teleport to {}", target, stand);
            return Some((stand, true));
        }
        None
    }

    /// Pick the next current target, or defer one. `None` means a target
    /// was selected and the tick may continue to navigation.
    fn select(&mut self, world: &dyn WorldAccess, agent: Pos3, events: &mut Vec<EngineEvent>) -> Option<PlannerStatus> {
        if !self.pending.is_empty() {
            let mut ranked = std::mem::take(&mut self.pending);
            self.sort_by_key(&mut ranked, agent);
            let limit = self.config.candidate_scan_limit.max(1).min(ranked.len());
            let hit = (0..limit).find_map(|i| self.resolve_stand(world, ranked[i], agent).map(|s| (i, s)));
            match hit {
                Some((i, (stand, forced))) => {
                    let target = ranked.remove(i);
                    self.pending = ranked;
                    self.current = Some(Current { target, stand, forced, moving: false, stuck_ticks: 0 });
                    None
                }
                None => {
                    let target = ranked.remove(0);
                    self.pending = ranked;
                    Some(self.defer(target, events))
                }
            }
        } else if let Some(target) = self.deferred.pop_front() {
            match self.resolve_stand(world, target, agent) {
                Some((stand, forced)) => {
                    self.current = Some(Current { target, stand, forced, moving: false, stuck_ticks: 0 });
                    None
                }
                None => Some(self.defer(target, events)),
            }
        } else if self.has_work {
            self.has_work = false;
            Some(PlannerStatus::Completed)
        } else {
            Some(PlannerStatus::Idle)
        }
    }

    fn teleport(&self, host: &mut HostEnv<'_>, stand: VoxelCoord, events: &mut Vec<EngineEvent>) {
        let [x, y, z] = stand.feet();
        let to = [x, y + self.config.teleport_lift, z];
        host.nav.teleport(to);
        events.push(EngineEvent::Teleported { to });
    }

    /// Advance one step. `act` is called with `(target, preview)` when the
    /// agent can reach the current target.
    pub fn tick<F>(&mut self, host: &mut HostEnv<'_>, events: &mut Vec<EngineEvent>, mut act: F) -> PlannerStatus
    where
        F: FnMut(&mut HostEnv<'_>, VoxelCoord, Option<VoxelCoord>) -> PlaceResult,
    {
        let agent = host.nav.position();
        if self.current.is_none() {
            if let Some(status) = self.select(&*host.world, agent, events) {
                return status;
            }
        }
        let Some(mut cur) = self.current else {
            return PlannerStatus::Idle;
        };

        if cur.forced {
            log::info!("forced teleport to {} for unreachable {}", cur.stand, cur.target);
            self.teleport(host, cur.stand, events);
            cur.forced = false;
            cur.moving = false;
            self.current = Some(cur);
            return PlannerStatus::Working;
        }

        let stand_feet = cur.stand.feet();
        let near_stand = dist_sq3(agent, stand_feet) <= self.config.arrival_threshold.powi(2);
        let reachable = in_reach(agent, cur.target, self.config.reach);
        if reachable && (near_stand || host.nav.is_idle()) {
            let preview = self.peek_next(agent);
            return match act(host, cur.target, preview) {
                PlaceResult::Placed => {
                    self.current = None;
                    self.attempts.remove(&cur.target);
                    PlannerStatus::PlacedBlock(cur.target)
                }
                PlaceResult::Pending => PlannerStatus::Working,
                PlaceResult::Failed => {
                    self.current = None;
                    self.defer(cur.target, events)
                }
            };
        }

        if !cur.moving {
            if !host.nav.start_moving_to(stand_feet, self.config.move_speed) {
                log::debug!("no path to stand {}", cur.stand);
            }
            cur.moving = true;
        } else if host.nav.is_idle() {
            cur.stuck_ticks += 1;
            if cur.stuck_ticks >= self.config.stuck_threshold {
                log::info!("stuck for {} ticks; teleporting to {}", cur.stuck_ticks, cur.stand);
                self.teleport(host, cur.stand, events);
                cur.stuck_ticks = 0;
                cur.moving = false;
            }
        } else {
            cur.stuck_ticks = 0;
        }
        self.current = Some(cur);
        PlannerStatus::Working
    }
}

// ---------------------------------------------------------------------------
// Stand search
// ---------------------------------------------------------------------------

/// Whether an agent with feet at `agent` can reach `target`: the distance
/// from the centre of the agent's feet voxel to the target centre.
pub fn in_reach(agent: Pos3, target: VoxelCoord, reach: f64) -> bool {
    dist_sq3(VoxelCoord::containing(agent).center(), target.center()) <= reach * reach
}

fn open_body(world: &dyn WorldAccess, feet: VoxelCoord) -> bool {
    !world.is_solid(feet) && !world.is_solid(feet.up())
}

/// Every stand for `target`, best first: cells within `reach` of the target
/// centre with solid footing (other than the target) and open feet and head
/// cells, never the target itself or the cell under it. Candidates whose
/// straight-line route from the agent is clear come first; each group is
/// sorted by distance to the agent.
pub fn stand_candidates(world: &dyn WorldAccess, target: VoxelCoord, agent: Pos3, reach: f64) -> Vec<VoxelCoord> {
    let r = reach.ceil() as i32;
    let reach_sq = reach * reach;
    let target_center = target.center();
    let mut out: Vec<(bool, f64, VoxelCoord)> = Vec::new();
    for dy in -r..=r {
        for dz in -r..=r {
            for dx in -r..=r {
                let cand = target.offset(dx, dy, dz);
                if cand == target || cand.up() == target {
                    continue;
                }
                if dist_sq3(cand.center(), target_center) > reach_sq {
                    continue;
                }
                let footing = cand.down();
                if footing == target || !world.is_solid(footing) || !open_body(world, cand) {
                    continue;
                }
                let blocked = !ground_clear(world, agent, cand);
                out.push((blocked, dist_sq3(cand.feet(), agent), cand));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));
    out.into_iter().map(|(_, _, c)| c).collect()
}

/// The best stand for `target`, if any.
pub fn find_stand_position(world: &dyn WorldAccess, target: VoxelCoord, agent: Pos3, reach: f64) -> Option<VoxelCoord> {
    stand_candidates(world, target, agent, reach).into_iter().next()
}

/// Forced stand: the closest open cell within reach (footing not
/// required), else the cell above the target.
pub fn fallback_stand(world: &dyn WorldAccess, target: VoxelCoord, agent: Pos3, reach: f64) -> VoxelCoord {
    let r = reach.ceil() as i32;
    let reach_sq = reach * reach;
    let mut best: Option<(f64, VoxelCoord)> = None;
    for dy in -r..=r {
        for dz in -r..=r {
            for dx in -r..=r {
                let cand = target.offset(dx, dy, dz);
                if cand == target || cand.up() == target || !open_body(world, cand) {
                    continue;
                }
                if dist_sq3(cand.center(), target.center()) > reach_sq {
                    continue;
                }
                let d = dist_sq3(cand.feet(), agent);
                if best.is_none_or(|(bd, bc)| d.total_cmp(&bd).then(cand.cmp(&bc)) == Ordering::Less) {
                    best = Some((d, cand));
                }
            }
        }
    }
    best.map_or(target.up(), |(_, c)| c)
}

/// Coarse straight-line clearance from the agent to `to`: walk the xz line
/// in half-voxel steps and fail if any column has two or more consecutive
/// solid cells starting at the agent's feet level.
fn ground_clear(world: &dyn WorldAccess, agent: Pos3, to: VoxelCoord) -> bool {
    let from = VoxelCoord::containing(agent);
    let (dx, dz) = ((to.x - from.x) as f64, (to.z - from.z) as f64);
    let steps = (dx.abs().max(dz.abs()) * 2.0).ceil() as i32;
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let x = (from.x as f64 + 0.5 + dx * t).floor() as i32;
        let z = (from.z as f64 + 0.5 + dz * t).floor() as i32;
        let base = VoxelCoord::new(x, from.y, z);
        if world.is_solid(base) && world.is_solid(base.up()) {
            return false;
        }
    }
    true
}
