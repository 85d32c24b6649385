// World collaborator contract and the dense in-memory voxel world.
//
// `WorldAccess` is everything the engine asks of the host's world: material
// get/set, per-material properties (hardness, solidity, ore class, the tool
// family that mines it well), the drop table, container insertion for depot
// runs, and spawning items on the ground when the inventory overflows.
// Default method bodies derive the common queries from `props()`, so a host
// only has to supply storage and a property lookup.
//
// `VoxelWorld` is the reference implementation used by the headless host,
// the tests and the benches: a flat `Vec<MaterialId>` indexed by
// `x + z * size_x + y * size_x * size_z`, giving O(1) read/write.
// Out-of-bounds reads return `AIR`; out-of-bounds writes are no-ops.
//
// See also: `host.rs` for the other collaborator traits, `headless.rs` for
// the host that owns a `VoxelWorld`, `mining.rs` for the main consumer of
// hardness/drops.
//
// **Critical constraint: determinism.** Containers and material tables use
// `BTreeMap`, so every scan over them is ordered.

use crate::types::{ItemKind, ItemStack, MaterialId, Pos3, Tool, ToolKind, VoxelCoord};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::collections::BTreeMap;

/// Slots in one depot container.
pub const CONTAINER_SLOTS: usize = 27;

/// Static properties of a material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialProps {
    /// Break resistance. Zero breaks instantly; negative never breaks.
    pub hardness: f32,
    /// Collides, supports feet, blocks headroom.
    pub solid: bool,
    /// Ore blocks trigger vein follow-up and the ore policy.
    pub ore: bool,
    /// Tool family that mines this material at full tool speed.
    pub tool: Option<ToolKind>,
    /// What breaking yields. `None` drops the block itself.
    pub drop: Option<ItemKind>,
}

impl MaterialProps {
    pub const AIR: MaterialProps = MaterialProps {
        hardness: 0.0,
        solid: false,
        ore: false,
        tool: None,
        drop: None,
    };

    /// A plain solid block mined best with `tool`.
    pub fn solid(hardness: f32, tool: Option<ToolKind>) -> Self {
        Self {
            hardness,
            solid: true,
            ore: false,
            tool,
            drop: None,
        }
    }

    /// An ore block that drops `item` unless silk-touched.
    pub fn ore(hardness: f32, item: u32) -> Self {
        Self {
            hardness,
            solid: true,
            ore: true,
            tool: Some(ToolKind::Pickaxe),
            drop: Some(ItemKind::Item(item)),
        }
    }
}

/// Host-side registry of material properties.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaterialTable {
    props: BTreeMap<MaterialId, MaterialProps>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: MaterialId, props: MaterialProps) {
        self.props.insert(material, props);
    }

    /// Properties of `material`. Air is always air; unknown materials are
    /// treated as ordinary solid blocks.
    pub fn get(&self, material: MaterialId) -> MaterialProps {
        if material.is_air() {
            return MaterialProps::AIR;
        }
        self.props
            .get(&material)
            .copied()
            .unwrap_or_else(|| MaterialProps::solid(1.0, None))
    }
}

/// Everything the engine needs from the host's world.
pub trait WorldAccess {
    fn material(&self, pos: VoxelCoord) -> MaterialId;

    fn set_material(&mut self, pos: VoxelCoord, material: MaterialId);

    fn props(&self, material: MaterialId) -> MaterialProps;

    /// Lowest buildable y (inclusive).
    fn min_y(&self) -> i32;

    /// Offer a stack to the container at `pos`. Returns what did not fit;
    /// the whole stack comes back if there is no container there.
    fn insert_into_container(&mut self, pos: VoxelCoord, stack: ItemStack) -> Option<ItemStack>;

    /// Drop an item entity on the ground.
    fn spawn_item(&mut self, pos: Pos3, stack: ItemStack);

    fn is_solid(&self, pos: VoxelCoord) -> bool {
        self.props(self.material(pos)).solid
    }

    fn is_ore(&self, material: MaterialId) -> bool {
        self.props(material).ore
    }

    fn hardness(&self, material: MaterialId) -> f32 {
        self.props(material).hardness
    }

    /// Mining speed multiplier of `tool` (bare hands when `None`) against
    /// `material`. Bare hands and the wrong tool family mine at 1.0.
    fn mining_speed(&self, material: MaterialId, tool: Option<&Tool>) -> f32 {
        match (tool, self.props(material).tool) {
            (Some(t), Some(kind)) if t.kind == kind => t.speed.max(1.0),
            _ => 1.0,
        }
    }

    /// Drop table. Silk touch yields the block itself; fortune adds one
    /// extra item per two levels on item drops.
    fn drops(&self, material: MaterialId, tool: Option<&Tool>) -> SmallVec<[ItemStack; 2]> {
        if material.is_air() {
            return SmallVec::new();
        }
        let props = self.props(material);
        let silk = tool.is_some_and(|t| t.silk_touch);
        match props.drop {
            Some(kind) if !silk => {
                let bonus = tool.map_or(0, |t| t.fortune as u32 / 2);
                smallvec![ItemStack::new(kind, 1 + bonus)]
            }
            _ => smallvec![ItemStack::blocks(material, 1)],
        }
    }
}

// ---------------------------------------------------------------------------
// Dense reference world
// ---------------------------------------------------------------------------

/// Dense 3D voxel grid with a material table and depot containers.
#[derive(Clone, Debug, Default)]
pub struct VoxelWorld {
    /// Flat storage: index = x + z * size_x + y * size_x * size_z.
    voxels: Vec<MaterialId>,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub materials: MaterialTable,
    containers: BTreeMap<VoxelCoord, Vec<ItemStack>>,
    /// Item entities dropped on the ground, in spawn order.
    pub ground_items: Vec<(Pos3, ItemStack)>,
}

impl VoxelWorld {
    /// Create a new world filled with air.
    pub fn new(size_x: u32, size_y: u32, size_z: u32, materials: MaterialTable) -> Self {
        let total = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            voxels: vec![MaterialId::AIR; total],
            size_x,
            size_y,
            size_z,
            materials,
            containers: BTreeMap::new(),
            ground_items: Vec::new(),
        }
    }

    /// Check whether a coordinate is within bounds.
    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as u32) < self.size_x
            && (coord.y as u32) < self.size_y
            && (coord.z as u32) < self.size_z
    }

    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            let sx = self.size_x as usize;
            let sz = self.size_z as usize;
            Some(coord.x as usize + coord.z as usize * sx + coord.y as usize * sx * sz)
        } else {
            None
        }
    }

    /// Fill the inclusive box `[min, max]` with `material`.
    pub fn fill(&mut self, min: VoxelCoord, max: VoxelCoord, material: MaterialId) {
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    self.set_material(VoxelCoord::new(x, y, z), material);
                }
            }
        }
    }

    /// Place a container block at `pos`, making it a depot target.
    pub fn place_container(&mut self, pos: VoxelCoord, material: MaterialId) {
        self.set_material(pos, material);
        self.containers.entry(pos).or_default();
    }

    pub fn container_contents(&self, pos: VoxelCoord) -> Option<&[ItemStack]> {
        self.containers.get(&pos).map(Vec::as_slice)
    }

    /// Number of non-air voxels. Test and bench helper.
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|m| !m.is_air()).count()
    }
}

impl WorldAccess for VoxelWorld {
    fn material(&self, pos: VoxelCoord) -> MaterialId {
        self.index(pos)
            .map(|i| self.voxels[i])
            .unwrap_or(MaterialId::AIR)
    }

    fn set_material(&mut self, pos: VoxelCoord, material: MaterialId) {
        if let Some(i) = self.index(pos) {
            self.voxels[i] = material;
            if material.is_air() {
                // Breaking a container spills it.
                if let Some(items) = self.containers.remove(&pos) {
                    let at = pos.center();
                    self.ground_items.extend(items.into_iter().map(|s| (at, s)));
                }
            }
        }
    }

    fn props(&self, material: MaterialId) -> MaterialProps {
        self.materials.get(material)
    }

    fn min_y(&self) -> i32 {
        0
    }

    fn insert_into_container(&mut self, pos: VoxelCoord, mut stack: ItemStack) -> Option<ItemStack> {
        let Some(slots) = self.containers.get_mut(&pos) else {
            return Some(stack);
        };
        for slot in slots.iter_mut() {
            if stack.count == 0 {
                break;
            }
            if slot.stacks_with(&stack) {
                let room = slot.kind.max_stack().saturating_sub(slot.count);
                let moved = room.min(stack.count);
                slot.count += moved;
                stack.count -= moved;
            }
        }
        while stack.count > 0 && slots.len() < CONTAINER_SLOTS {
            let moved = stack.count.min(stack.kind.max_stack());
            slots.push(ItemStack::new(stack.kind, moved));
            stack.count -= moved;
        }
        (stack.count > 0).then_some(stack)
    }

    fn spawn_item(&mut self, pos: Pos3, stack: ItemStack) {
        self.ground_items.push((pos, stack));
    }
}
