// Memoized list of tool-bearing inventory slots.
//
// Both mining hands ask "which carried tool mines this material fastest?"
// every time their current tool turns out to be no better than bare hands.
// Scanning the whole inventory for that is wasteful, so the cache keeps the
// indices of slots that held a tool at the last scan and compares the
// inventory's revision counter on each query. Any inventory mutation bumps
// the revision and the next query rescans.
//
// See also: `mining.rs` (the only consumer), `host.rs` for
// `Inventory::revision()`.

use crate::host::Inventory;
use crate::types::{MaterialId, Tool};
use crate::world::WorldAccess;
use smallvec::SmallVec;

#[derive(Clone, Debug, Default)]
pub struct ToolCache {
    revision: Option<u64>,
    slots: SmallVec<[usize; 8]>,
}

/// A tool chosen for a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolChoice {
    pub slot: usize,
    pub tool: Tool,
    pub speed: f32,
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a rescan on the next query.
    pub fn invalidate(&mut self) {
        self.revision = None;
    }

    /// Slots holding a tool, rescanning if the inventory changed.
    pub fn tool_slots(&mut self, inventory: &dyn Inventory) -> &[usize] {
        let rev = inventory.revision();
        if self.revision != Some(rev) {
            self.slots.clear();
            for i in 0..inventory.slot_count() {
                if inventory.slot(i).is_some_and(|s| s.kind.as_tool().is_some()) {
                    self.slots.push(i);
                }
            }
            self.revision = Some(rev);
        }
        &self.slots
    }

    /// The carried tool that mines `material` fastest, if any beats bare
    /// hands. `avoid` (the other hand's slot) is only used when nothing
    /// else qualifies. Ties go to the lowest slot.
    pub fn best_for(
        &mut self,
        inventory: &dyn Inventory,
        world: &dyn WorldAccess,
        material: MaterialId,
        avoid: Option<usize>,
    ) -> Option<ToolChoice> {
        let mut best: Option<ToolChoice> = None;
        let mut fallback: Option<ToolChoice> = None;
        for &slot in self.tool_slots(inventory) {
            let Some(tool) = inventory.slot(slot).and_then(|s| s.kind.as_tool().copied()) else {
                continue;
            };
            let speed = world.mining_speed(material, Some(&tool));
            if speed <= 1.0 {
                continue;
            }
            let choice = ToolChoice { slot, tool, speed };
            let target = if avoid == Some(slot) { &mut fallback } else { &mut best };
            if target.is_none_or(|b| speed > b.speed) {
                *target = Some(choice);
            }
        }
        best.or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SlotInventory;
    use crate::types::{ItemKind, ItemStack, ToolKind};
    use crate::world::{MaterialProps, MaterialTable, VoxelWorld};

    const STONE: MaterialId = MaterialId(1);

    fn world() -> VoxelWorld {
        let mut table = MaterialTable::new();
        table.insert(STONE, MaterialProps::solid(1.5, Some(ToolKind::Pickaxe)));
        VoxelWorld::new(1, 1, 1, table)
    }

    fn tool(kind: ToolKind, speed: f32) -> ItemStack {
        ItemStack::new(ItemKind::Tool(Tool::new(kind, speed, 100)), 1)
    }

    #[test]
    fn picks_fastest_matching_tool() {
        let inv = SlotInventory::with_items(
            4,
            &[
                ItemStack::blocks(STONE, 5),
                tool(ToolKind::Pickaxe, 4.0),
                tool(ToolKind::Axe, 9.0),
                tool(ToolKind::Pickaxe, 8.0),
            ],
        );
        let mut cache = ToolCache::new();
        let choice = cache.best_for(&inv, &world(), STONE, None).unwrap();
        assert_eq!(choice.slot, 3);
        assert_eq!(choice.speed, 8.0);
        assert_eq!(cache.tool_slots(&inv), &[1, 2, 3]);
    }

    #[test]
    fn avoided_slot_is_last_resort() {
        let inv = SlotInventory::with_items(
            2,
            &[tool(ToolKind::Pickaxe, 8.0), tool(ToolKind::Pickaxe, 4.0)],
        );
        let mut cache = ToolCache::new();
        assert_eq!(cache.best_for(&inv, &world(), STONE, Some(0)).unwrap().slot, 1);
        let single = SlotInventory::with_items(1, &[tool(ToolKind::Pickaxe, 8.0)]);
        let mut cache = ToolCache::new();
        assert_eq!(cache.best_for(&single, &world(), STONE, Some(0)).unwrap().slot, 0);
    }

    #[test]
    fn rescans_after_inventory_mutation() {
        use crate::host::Inventory;
        let mut inv = SlotInventory::new(2);
        let mut cache = ToolCache::new();
        assert!(cache.tool_slots(&inv).is_empty());
        let _ = inv.insert(tool(ToolKind::Pickaxe, 6.0));
        assert_eq!(cache.tool_slots(&inv), &[0]);
    }

    #[test]
    fn no_choice_when_nothing_beats_bare_hands() {
        let inv = SlotInventory::with_items(1, &[tool(ToolKind::Shovel, 6.0)]);
        let mut cache = ToolCache::new();
        assert!(cache.best_for(&inv, &world(), STONE, None).is_none());
    }
}
