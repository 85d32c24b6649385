// Spatial generators: which voxels each build mode works on, and in what
// order.
//
// A generator knows geometry and nothing else. It never moves the agent,
// touches the inventory or checks reach; the owning strategy feeds its
// output to a placement planner or a dig crew. Every generator keeps a
// small serializable cursor so a resumed task regenerates the same queue
// instead of persisting it.
//
// - `path.rs`:        PathTracker: segments behind a tracked actor.
// - `wall.rs`:        WallMatcher: oriented module placement toward an actor.
// - `tower.rs`:       TowerLayers: a module repeated upward, one layer per batch.
// - `excavation.rs`:  RingExcavator: L-shaped rings out from a corner.
// - `mining.rs`:      BranchMine: spine with side branches.
// - `tunnel.rs`:      TunnelSlicer: rectangular slices along a facing.
// - `alpha_shape.rs`: AlphaShell: closed shell around a skeleton, slope-classified.
// - `wfc.rs`:         TreeCollapse: wave-function-collapse tiling from a sample.
//
// **Critical constraint: determinism.** Generators emit cells in a fixed
// order and draw any choice from `stonewright_hash`, never from a stream.

pub mod alpha_shape;
pub mod excavation;
pub mod mining;
pub mod path;
pub mod tower;
pub mod tunnel;
pub mod wall;
pub mod wfc;

/// Lateral offsets of a cross-section `width` cells wide, centred on 0.
/// Even widths put the extra cell on the right.
pub fn cross_section(width: u32) -> std::ops::RangeInclusive<i32> {
    let width = width.max(1) as i32;
    let left = (width - 1) / 2;
    let right = width / 2;
    -left..=right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_sections_are_centred() {
        assert_eq!(cross_section(1), 0..=0);
        assert_eq!(cross_section(3), -1..=1);
        assert_eq!(cross_section(4), -1..=2);
        assert_eq!(cross_section(0), 0..=0);
    }
}
