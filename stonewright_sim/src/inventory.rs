// Slot inventory used by the headless host.
//
// A fixed number of `Option<ItemStack>` slots plus a revision counter that
// every mutation bumps (the tool cache keys off it). Optionally pins the
// building-block fallback to a specific material; otherwise the `Inventory`
// default (most-carried block) applies.
//
// See also: `host.rs` for the provided `Inventory` methods (stacking,
// counting, tool wear) this type inherits.

use crate::host::Inventory;
use crate::types::{ItemKind, ItemStack, MaterialId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotInventory {
    slots: Vec<Option<ItemStack>>,
    revision: u64,
    /// Pinned floor-patching material, if the owner chose one.
    pub fallback: Option<MaterialId>,
}

impl SlotInventory {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            revision: 0,
            fallback: None,
        }
    }

    /// Convenience constructor: insert every stack, dropping overflow.
    pub fn with_items(slot_count: usize, stacks: &[ItemStack]) -> Self {
        let mut inv = Self::new(slot_count);
        for &stack in stacks {
            let _ = inv.insert(stack);
        }
        inv
    }

    pub fn empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }
}

impl Inventory for SlotInventory {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> Option<ItemStack> {
        self.slots.get(index).copied().flatten()
    }

    fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = stack.filter(|s| s.count > 0);
            self.revision += 1;
        }
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn building_block_fallback(&self) -> Option<MaterialId> {
        let mut totals: BTreeMap<MaterialId, u32> = BTreeMap::new();
        for stack in self.slots.iter().flatten() {
            if let ItemKind::Block(m) = stack.kind {
                *totals.entry(m).or_insert(0) += stack.count;
            }
        }
        if let Some(m) = self.fallback.filter(|m| totals.contains_key(m)) {
            return Some(m);
        }
        // Same policy as the trait default: most carried, lowest id on ties.
        totals
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(m, _)| m)
    }
}
