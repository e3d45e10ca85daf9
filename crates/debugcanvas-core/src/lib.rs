//! # DebugCanvas Core
//!
//! The recorded side of the debug canvas: world-space geometry, colors,
//! typed draw commands, and the [`DrawingData`] model that callers append
//! to from any thread. The renderer only ever sees deep snapshots of it.
//!
//! Also provides an R-tree index for pointer hit queries.

pub mod color;
pub mod commands;
pub mod drawing_data;
pub mod geometry;
pub mod spatial;

pub use color::Rgba;
pub use commands::{
    BoxCommand, CommandKind, CommandRef, CrossCommand, DrawCommand, LineCommand, LogEntry,
    TextCommand,
};
pub use drawing_data::{DrawingData, SharedDrawingData};
pub use geometry::{BBox, Point, Vector, WorldRect};
pub use spatial::SpatialIndex;
