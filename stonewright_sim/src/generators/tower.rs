// Tower layers: a captured module repeated upward.
//
// The module spans `module_height` levels. Layer `i` of the tower is the
// module's level `i % module_height`, lifted by `(i / module_height) *
// module_height`. Layers come out bottom first, one batch each; layers the
// module leaves empty are skipped.

use crate::template::ModuleTemplate;
use crate::types::{MaterialId, VoxelCoord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerLayers {
    origin: VoxelCoord,
    module_height: i32,
    base_y: i32,
    modules: u32,
    next_layer: u32,
}

impl TowerLayers {
    /// `None` for an empty template.
    pub fn new(template: &ModuleTemplate, origin: VoxelCoord, modules: u32) -> Option<Self> {
        let (lo, _) = template.bounds()?;
        Some(Self {
            origin,
            module_height: template.height(),
            base_y: lo.y,
            modules: modules.max(1),
            next_layer: 0,
        })
    }

    pub fn total_layers(&self) -> u32 {
        self.module_height as u32 * self.modules
    }

    /// Index of the next layer to emit.
    pub fn cursor(&self) -> u32 {
        self.next_layer
    }

    pub fn set_cursor(&mut self, layer: u32) {
        self.next_layer = layer.min(self.total_layers());
    }

    pub fn is_done(&self) -> bool {
        self.next_layer >= self.total_layers()
    }

    /// Cells of tower layer `layer`.
    pub fn layer_cells(&self, template: &ModuleTemplate, layer: u32) -> Vec<(VoxelCoord, MaterialId)> {
        let h = self.module_height;
        let level = self.base_y + (layer as i32 % h);
        let lift = (layer as i32 / h) * h;
        template
            .cells()
            .iter()
            .filter(|(p, _)| p.y == level)
            .map(|&(p, m)| (self.origin.offset(p.x, p.y + lift, p.z), m))
            .collect()
    }

    /// The next non-empty layer and its index.
    pub fn next_batch(&mut self, template: &ModuleTemplate) -> Option<(u32, Vec<(VoxelCoord, MaterialId)>)> {
        while !self.is_done() {
            let layer = self.next_layer;
            self.next_layer += 1;
            let cells = self.layer_cells(template, layer);
            if !cells.is_empty() {
                return Some((layer, cells));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: MaterialId = MaterialId(1);
    const GLASS: MaterialId = MaterialId(2);

    fn column() -> ModuleTemplate {
        ModuleTemplate::new([
            (VoxelCoord::new(0, 0, 0), STONE),
            (VoxelCoord::new(1, 0, 0), STONE),
            (VoxelCoord::new(0, 2, 0), GLASS),
        ])
    }

    #[test]
    fn layers_come_bottom_first_and_skip_gaps() {
        let t = column();
        let mut tower = TowerLayers::new(&t, VoxelCoord::new(5, 10, 5), 2).unwrap();
        assert_eq!(tower.total_layers(), 6);
        let mut seen = Vec::new();
        while let Some((layer, cells)) = tower.next_batch(&t) {
            seen.push((layer, cells.len(), cells[0].0.y));
        }
        assert_eq!(seen, vec![(0, 2, 10), (2, 1, 12), (3, 2, 13), (5, 1, 15)]);
        assert!(tower.is_done());
    }

    #[test]
    fn cursor_resumes() {
        let t = column();
        let mut tower = TowerLayers::new(&t, VoxelCoord::default(), 1).unwrap();
        tower.set_cursor(2);
        assert_eq!(tower.next_batch(&t).map(|(l, _)| l), Some(2));
        assert!(TowerLayers::new(&ModuleTemplate::new(Vec::<(VoxelCoord, MaterialId)>::new()), VoxelCoord::default(), 1).is_none());
    }
}
