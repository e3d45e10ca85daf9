use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::commands::{
    BoxCommand, CommandRef, CrossCommand, DrawCommand, LineCommand, LogEntry, TextCommand,
};
use crate::geometry::{BBox, Point, Vector, WorldRect};
use crate::spatial::SpatialIndex;

/// Append-only, clearable log of draw commands plus the world rectangle
/// the viewport is bound to.
///
/// Appends while disabled are silently dropped; no operation here fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingData {
    enabled: bool,
    world_bounds: WorldRect,
    boxes: Vec<BoxCommand>,
    crosses: Vec<CrossCommand>,
    lines: Vec<LineCommand>,
    texts: Vec<TextCommand>,
    log: Vec<LogEntry>,
}

impl DrawingData {
    pub fn new() -> Self {
        Self {
            enabled: true,
            world_bounds: WorldRect::default(),
            boxes: Vec::new(),
            crosses: Vec::new(),
            lines: Vec::new(),
            texts: Vec::new(),
            log: Vec::new(),
        }
    }

    // ── Flags and bounds ─────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn world_bounds(&self) -> WorldRect {
        self.world_bounds
    }

    /// Store `bounds`, flipping a negative height (see [`WorldRect::normalized`]).
    pub fn set_world_bounds(&mut self, bounds: WorldRect) {
        self.world_bounds = bounds.normalized();
    }

    // ── Appends ──────────────────────────────────────────────────────

    pub fn draw_line(&mut self, a: Point, b: Point, color: Rgba) {
        self.push(DrawCommand::Line(LineCommand { a, b, color }));
    }

    /// Square box with edge length `size`.
    pub fn draw_box(&mut self, center: Point, color: Rgba, size: f64, filled: bool) {
        self.draw_box_sized(center, color, Vector::splat(size), filled);
    }

    pub fn draw_box_sized(&mut self, center: Point, color: Rgba, size: Vector, filled: bool) {
        self.push(DrawCommand::Box(BoxCommand {
            center,
            size,
            color,
            filled,
        }));
    }

    /// Square cross marker with extent `size`.
    pub fn draw_cross(&mut self, center: Point, color: Rgba, size: f64) {
        self.draw_cross_sized(center, color, Vector::splat(size));
    }

    pub fn draw_cross_sized(&mut self, center: Point, color: Rgba, size: Vector) {
        self.push(DrawCommand::Cross(CrossCommand {
            center,
            size,
            color,
        }));
    }

    /// Blank or whitespace-only text is dropped.
    pub fn draw_text(
        &mut self,
        text: &str,
        center: Point,
        color: Rgba,
        size: Vector,
        font_height: f64,
        shadow: Option<Rgba>,
    ) {
        self.push(DrawCommand::Text(TextCommand {
            text: text.to_string(),
            center,
            size,
            font_height,
            color,
            shadow,
        }));
    }

    pub fn log(&mut self, message: &str, attachments: Vec<serde_json::Value>) {
        self.push(DrawCommand::Log(LogEntry {
            timestamp: SystemTime::now(),
            message: message.to_string(),
            attachments,
        }));
    }

    /// Append any command to its bucket, honoring the enabled flag and
    /// the blank-text rule.
    pub fn push(&mut self, command: DrawCommand) {
        if !self.enabled {
            log::trace!("drawing disabled, dropped {:?} command", command.kind());
            return;
        }
        match command {
            DrawCommand::Line(l) => self.lines.push(l),
            DrawCommand::Box(b) => self.boxes.push(b),
            DrawCommand::Cross(c) => self.crosses.push(c),
            DrawCommand::Text(t) => {
                if t.text.trim().is_empty() {
                    return;
                }
                self.texts.push(t);
            }
            DrawCommand::Log(entry) => self.log.push(entry),
        }
    }

    // ── Clearing ─────────────────────────────────────────────────────

    /// Empty the four shape buckets; the log, bounds, and flag are kept.
    pub fn clear_drawings(&mut self) {
        self.boxes.clear();
        self.crosses.clear();
        self.lines.clear();
        self.texts.clear();
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Deep, independent copy of the whole model.
    pub fn snapshot(&self) -> DrawingData {
        self.clone()
    }

    pub fn boxes(&self) -> &[BoxCommand] {
        &self.boxes
    }

    pub fn crosses(&self) -> &[CrossCommand] {
        &self.crosses
    }

    pub fn lines(&self) -> &[LineCommand] {
        &self.lines
    }

    pub fn texts(&self) -> &[TextCommand] {
        &self.texts
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn shape_count(&self) -> usize {
        self.boxes.len() + self.crosses.len() + self.lines.len() + self.texts.len()
    }

    /// Bounding box over every box and cross corner (`center ± size`) and
    /// every line endpoint. Text and log entries do not contribute.
    pub fn contents_bbox(&self) -> Option<BBox> {
        let points: Vec<Point> = self
            .boxes
            .iter()
            .flat_map(|b| [b.center - b.size, b.center + b.size])
            .chain(self.lines.iter().flat_map(|l| [l.a, l.b]))
            .chain(
                self.crosses
                    .iter()
                    .flat_map(|c| [c.center - c.size, c.center + c.size]),
            )
            .collect();
        BBox::from_points(&points)
    }

    /// Rebind the world bounds to [`contents_bbox`](Self::contents_bbox).
    ///
    /// Returns `false` and leaves the bounds alone when there is nothing to fit.
    pub fn fit_bounds_to_contents(&mut self) -> bool {
        match self.contents_bbox() {
            Some(bbox) => {
                self.set_world_bounds(WorldRect::from_bbox(&bbox));
                true
            }
            None => {
                log::debug!("fit_bounds_to_contents: no shapes, bounds unchanged");
                false
            }
        }
    }

    /// Shape commands whose world extent contains `point`, in bucket order.
    pub fn hit_test(&self, point: &Point) -> Vec<CommandRef> {
        let index = SpatialIndex::from_drawing_data(self);
        let mut hits: Vec<CommandRef> = index
            .query_point(point)
            .into_iter()
            .map(|entry| entry.command)
            .collect();
        hits.sort_by_key(|r| (r.kind as u8, r.index));
        hits
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for DrawingData {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`DrawingData`] shared between the threads that record commands and
/// the render engine that snapshots it.
#[derive(Debug, Clone, Default)]
pub struct SharedDrawingData(Arc<RwLock<DrawingData>>);

impl SharedDrawingData {
    pub fn new(data: DrawingData) -> Self {
        Self(Arc::new(RwLock::new(data)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DrawingData> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, DrawingData> {
        self.0.write()
    }

    pub fn snapshot(&self) -> DrawingData {
        self.0.read().snapshot()
    }
}
