// Host collaborator contracts besides the world.
//
// The engine never owns the agent's body, its inventory or any presentation
// layer. It talks to them through three traits:
//
// - `Navigator`: path-following movement and the teleport primitive.
// - `Inventory`: slot-level storage. Stacking, block counting, tool wear and
//   the building-block fallback are provided methods built on four required
//   ones, so a host adapter stays small.
// - `Effects`: fire-and-forget animation, breaking overlay, particles and
//   the "waiting for resources" cue. The engine never reads anything back.
//
// `HostEnv` bundles one mutable borrow of each collaborator (plus the world)
// for the duration of a tick. Keeping them as separate fields lets the
// mining code hold the world and the inventory at the same time.
//
// See also: `world.rs` for `WorldAccess`, `inventory.rs` for the slot
// inventory implementation, `headless.rs` for the reference host.

use crate::types::{AgentId, Hand, ItemKind, ItemStack, MaterialId, Pos3, VoxelCoord};
use crate::world::WorldAccess;
use serde::{Deserialize, Serialize};

/// Agent movement.
pub trait Navigator {
    /// Current feet position of the agent.
    fn position(&self) -> Pos3;

    /// Begin pathing toward `target`. Returns `false` if no path was found;
    /// the navigator is then idle.
    fn start_moving_to(&mut self, target: Pos3, speed: f64) -> bool;

    /// True when the navigator has no active path.
    fn is_idle(&self) -> bool;

    /// Move the agent instantly, dropping any active path.
    fn teleport(&mut self, target: Pos3);

    fn stop(&mut self);
}

/// Slot storage carried by the agent.
pub trait Inventory {
    fn slot_count(&self) -> usize;

    fn slot(&self, index: usize) -> Option<ItemStack>;

    fn set_slot(&mut self, index: usize, stack: Option<ItemStack>);

    /// Monotonic counter bumped by every mutation. Caches compare it.
    fn revision(&self) -> u64;

    /// Material used to patch gaps under the agent's feet. Defaults to the
    /// block the agent carries the most of.
    fn building_block_fallback(&self) -> Option<MaterialId> {
        let mut totals: Vec<(MaterialId, u32)> = Vec::new();
        for i in 0..self.slot_count() {
            if let Some(ItemStack { kind: ItemKind::Block(m), count }) = self.slot(i) {
                match totals.iter_mut().find(|(t, _)| *t == m) {
                    Some((_, c)) => *c += count,
                    None => totals.push((m, count)),
                }
            }
        }
        // Largest count wins; lowest id breaks ties.
        totals
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(m, _)| m)
    }

    fn count_blocks(&self, material: MaterialId) -> u32 {
        (0..self.slot_count())
            .filter_map(|i| self.slot(i))
            .filter(|s| s.kind == ItemKind::Block(material))
            .map(|s| s.count)
            .sum()
    }

    /// Remove one block of `material`. Returns `false` if none is carried.
    fn take_block(&mut self, material: MaterialId) -> bool {
        for i in 0..self.slot_count() {
            if let Some(mut stack) = self.slot(i) {
                if stack.kind == ItemKind::Block(material) && stack.count > 0 {
                    stack.count -= 1;
                    self.set_slot(i, (stack.count > 0).then_some(stack));
                    return true;
                }
            }
        }
        false
    }

    /// Merge into existing stacks first, then empty slots. Returns the
    /// remainder that did not fit.
    fn insert(&mut self, mut stack: ItemStack) -> Option<ItemStack> {
        for i in 0..self.slot_count() {
            if stack.count == 0 {
                return None;
            }
            if let Some(mut existing) = self.slot(i) {
                if existing.stacks_with(&stack) {
                    let room = existing.kind.max_stack().saturating_sub(existing.count);
                    let moved = room.min(stack.count);
                    if moved > 0 {
                        existing.count += moved;
                        stack.count -= moved;
                        self.set_slot(i, Some(existing));
                    }
                }
            }
        }
        for i in 0..self.slot_count() {
            if stack.count == 0 {
                return None;
            }
            if self.slot(i).is_none() {
                let moved = stack.count.min(stack.kind.max_stack());
                self.set_slot(i, Some(ItemStack::new(stack.kind, moved)));
                stack.count -= moved;
            }
        }
        (stack.count > 0).then_some(stack)
    }

    /// No empty slot left.
    fn is_full(&self) -> bool {
        (0..self.slot_count()).all(|i| self.slot(i).is_some())
    }

    /// Wear the tool in `slot`. Returns `true` if the tool broke.
    fn damage_tool(&mut self, slot: usize, amount: u32) -> bool {
        let Some(mut stack) = self.slot(slot) else {
            return false;
        };
        let ItemKind::Tool(mut tool) = stack.kind else {
            return false;
        };
        if !tool.is_damageable() {
            return false;
        }
        tool.damage += amount;
        if tool.damage >= tool.max_damage {
            self.set_slot(slot, None);
            return true;
        }
        stack.kind = ItemKind::Tool(tool);
        self.set_slot(slot, Some(stack));
        false
    }
}

/// Presentation side effects. Nothing here is read back by the engine.
pub trait Effects {
    fn begin_hand_animation(&mut self, hand: Hand, target: VoxelCoord, preview: Option<VoxelCoord>);

    /// Breaking overlay stage 0–9, or `None` to clear it.
    fn breaking_stage(&mut self, agent: AgentId, hand: Hand, pos: VoxelCoord, stage: Option<u8>);

    fn particle_burst(&mut self, pos: VoxelCoord, material: MaterialId);

    /// Visual hint that the agent is waiting for materials.
    fn resource_cue(&mut self, agent: AgentId);
}

/// A player or entity a following mode tracks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedActor {
    pub position: Pos3,
}

/// One tick's borrow of every host collaborator.
pub struct HostEnv<'a> {
    pub world: &'a mut dyn WorldAccess,
    pub nav: &'a mut dyn Navigator,
    pub inventory: &'a mut dyn Inventory,
    pub effects: &'a mut dyn Effects,
}
