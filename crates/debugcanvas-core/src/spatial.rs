use rstar::{RTree, RTreeObject, AABB};

use crate::commands::{CommandKind, CommandRef};
use crate::drawing_data::DrawingData;
use crate::geometry::{BBox, Point};

/// An entry in the R-tree spatial index, referencing a shape command.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub command: CommandRef,
    /// World-space extent of the command.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index over the shape commands of a [`DrawingData`], for pointer
/// hit queries.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
        }
    }

    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Index every box, cross, line, and text command.
    pub fn from_drawing_data(data: &DrawingData) -> Self {
        fn entry(kind: CommandKind, index: usize, bbox: BBox) -> SpatialEntry {
            SpatialEntry {
                command: CommandRef { kind, index },
                bbox,
            }
        }

        let mut entries = Vec::with_capacity(data.shape_count());
        entries.extend(data.boxes().iter().enumerate().map(|(i, b)| {
            entry(CommandKind::Box, i, BBox::around(b.center, b.size.half()))
        }));
        entries.extend(data.crosses().iter().enumerate().map(|(i, c)| {
            entry(CommandKind::Cross, i, BBox::around(c.center, c.size.half()))
        }));
        entries.extend(data.lines().iter().enumerate().map(|(i, l)| {
            entry(CommandKind::Line, i, BBox::around(l.center(), l.size().half()))
        }));
        entries.extend(data.texts().iter().enumerate().map(|(i, t)| {
            entry(CommandKind::Text, i, BBox::around(t.center, t.size.half()))
        }));
        Self::build(entries)
    }

    /// Find all entries whose bounding box contains the given point,
    /// edges included.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
