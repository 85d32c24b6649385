// Core types shared across the engine.
//
// Defines spatial coordinates (`VoxelCoord`, `Facing`, continuous `Pos3`
// helpers), material and agent identifiers, hands, and the item model the
// inventory and mining code trade in (`ItemKind`, `ItemStack`, `Tool`).
// All types derive `Serialize`/`Deserialize` so strategies can persist
// anchors and cursors through `persist.rs`.
//
// Material identifiers are opaque integers. The host owns the registry that
// maps them to names and properties; the engine only asks the world
// collaborator about them (see `world.rs`).
//
// **Critical constraint: determinism.** Coordinates order totally (`Ord`)
// so they can key `BTreeMap`s, and every distance helper is pure.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A continuous world position (agent feet, actor positions).
pub type Pos3 = [f64; 3];

/// A position in the voxel grid. Each component is in voxel units.
///
/// Y is up. A voxel occupies `[x, x+1) × [y, y+1) × [z, z+1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// The six face-adjacent offsets (±x, ±y, ±z).
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The voxel containing a continuous position.
    pub fn containing(pos: Pos3) -> Self {
        Self::new(
            pos[0].floor() as i32,
            pos[1].floor() as i32,
            pos[2].floor() as i32,
        )
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        ((self.x - other.x).unsigned_abs())
            + ((self.y - other.y).unsigned_abs())
            + ((self.z - other.z).unsigned_abs())
    }

    /// Squared Euclidean distance in voxel units.
    pub fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    /// Centre of the voxel cube.
    pub fn center(self) -> Pos3 {
        [
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        ]
    }

    /// Bottom-centre of the voxel: where feet stand inside it.
    pub fn feet(self) -> Pos3 {
        [self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5]
    }

    /// The six face neighbors, in `FACE_OFFSETS` order.
    pub fn face_neighbors(self) -> [VoxelCoord; 6] {
        FACE_OFFSETS.map(|(dx, dy, dz)| self.offset(dx, dy, dz))
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Squared distance between two continuous positions.
pub fn dist_sq3(a: Pos3, b: Pos3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Squared horizontal (xz-plane) distance between two continuous positions.
pub fn horizontal_dist_sq(a: Pos3, b: Pos3) -> f64 {
    let dx = a[0] - b[0];
    let dz = a[2] - b[2];
    dx * dx + dz * dz
}

/// One of the four horizontal directions a linear job advances along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    /// -Z
    #[default]
    North,
    /// +X
    East,
    /// +Z
    South,
    /// -X
    West,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::North, Facing::East, Facing::South, Facing::West];

    /// Unit step `(dx, dz)` in this direction.
    pub fn step(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::East => (1, 0),
            Facing::South => (0, 1),
            Facing::West => (-1, 0),
        }
    }

    /// The direction 90° clockwise (seen from above).
    pub fn right(self) -> Facing {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }

    pub fn left(self) -> Facing {
        self.right().right().right()
    }

    /// Dominant horizontal direction of a displacement. Ties favour the X axis.
    pub fn from_delta(dx: f64, dz: f64) -> Facing {
        if dx.abs() >= dz.abs() {
            if dx >= 0.0 { Facing::East } else { Facing::West }
        } else if dz >= 0.0 {
            Facing::South
        } else {
            Facing::North
        }
    }

    /// Move `origin` `forward` steps along this facing and `right` steps to
    /// its right, `up` voxels vertically.
    pub fn local_to_world(self, origin: VoxelCoord, forward: i32, right: i32, up: i32) -> VoxelCoord {
        let (fx, fz) = self.step();
        let (rx, rz) = self.right().step();
        origin.offset(fx * forward + rx * right, up, fz * forward + rz * right)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque material identifier, assigned by the host's registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// The empty material. Every world reports out-of-range cells as air.
    pub const AIR: MaterialId = MaterialId(0);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

/// Identifier of the agent (the builder) a task belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

/// The builder has two hands, each running its own mining session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hand {
    Main,
    Off,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Main, Hand::Off];

    pub fn index(self) -> usize {
        match self {
            Hand::Main => 0,
            Hand::Off => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Tool families. Which family suits which material is the world's call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    Pickaxe,
    Shovel,
    Axe,
    Shears,
}

/// A concrete tool item with wear and enchantments.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub kind: ToolKind,
    /// Speed multiplier against materials this kind is effective on.
    pub speed: f32,
    /// Durability; 0 means the tool never wears out.
    pub max_damage: u32,
    pub damage: u32,
    pub silk_touch: bool,
    pub fortune: u8,
}

impl Tool {
    pub fn new(kind: ToolKind, speed: f32, max_damage: u32) -> Self {
        Self {
            kind,
            speed,
            max_damage,
            damage: 0,
            silk_touch: false,
            fortune: 0,
        }
    }

    pub fn is_damageable(&self) -> bool {
        self.max_damage > 0
    }
}

/// What an inventory slot can hold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    /// A placeable block of the given material.
    Block(MaterialId),
    /// A non-placeable item identified by the host (ore drops, gems).
    Item(u32),
    Tool(Tool),
}

impl ItemKind {
    pub fn max_stack(&self) -> u32 {
        match self {
            ItemKind::Tool(_) => 1,
            _ => 64,
        }
    }

    pub fn as_tool(&self) -> Option<&Tool> {
        match self {
            ItemKind::Tool(t) => Some(t),
            _ => None,
        }
    }

    pub fn block_material(&self) -> Option<MaterialId> {
        match self {
            ItemKind::Block(m) => Some(*m),
            _ => None,
        }
    }
}

/// A stack of identical items.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKind, count: u32) -> Self {
        Self { kind, count }
    }

    pub fn blocks(material: MaterialId, count: u32) -> Self {
        Self::new(ItemKind::Block(material), count)
    }

    /// Whether `other` can merge into this stack (same kind, not a tool).
    pub fn stacks_with(&self, other: &ItemStack) -> bool {
        self.kind.max_stack() > 1 && self.kind == other.kind
    }
}
