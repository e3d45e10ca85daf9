use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::geometry::{Point, Vector};

/// A line segment between two world points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCommand {
    pub a: Point,
    pub b: Point,
    pub color: Rgba,
}

impl LineCommand {
    /// Midpoint of the segment; the segment's cull center.
    pub fn center(&self) -> Point {
        self.a.midpoint(&self.b)
    }

    /// Per-axis span of the segment; the segment's cull size.
    pub fn size(&self) -> Vector {
        (self.a - self.b).abs()
    }
}

/// An axis-aligned box centered on a world point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxCommand {
    pub center: Point,
    pub size: Vector,
    pub color: Rgba,
    pub filled: bool,
}

/// An "X" marker: the two diagonals of the `center ± size/2` square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCommand {
    pub center: Point,
    pub size: Vector,
    pub color: Rgba,
}

/// A text label laid out inside a world-space rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCommand {
    pub text: String,
    pub center: Point,
    pub size: Vector,
    /// Glyph height in world units.
    pub font_height: f64,
    pub color: Rgba,
    pub shadow: Option<Rgba>,
}

impl TextCommand {
    /// Top-left corner of the layout rectangle in world space (world +y is up).
    pub fn top_left(&self) -> Point {
        self.center + Vector::new(-self.size.x * 0.5, self.size.y * 0.5)
    }
}

/// A timestamped diagnostic message with arbitrary attached values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub message: String,
    pub attachments: Vec<serde_json::Value>,
}

/// Which bucket of [`DrawingData`](crate::DrawingData) a command lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Box,
    Cross,
    Line,
    Text,
    Log,
}

/// One recorded draw instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Line(LineCommand),
    Box(BoxCommand),
    Cross(CrossCommand),
    Text(TextCommand),
    Log(LogEntry),
}

impl DrawCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            DrawCommand::Line(_) => CommandKind::Line,
            DrawCommand::Box(_) => CommandKind::Box,
            DrawCommand::Cross(_) => CommandKind::Cross,
            DrawCommand::Text(_) => CommandKind::Text,
            DrawCommand::Log(_) => CommandKind::Log,
        }
    }
}

/// Identifies a command by bucket and insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandRef {
    pub kind: CommandKind,
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_top_left() {
        let t = TextCommand {
            text: "hi".to_string(),
            center: Point::new(20.0, 20.0),
            size: Vector::new(200.0, 20.0),
            font_height: 16.0,
            color: Rgba::YELLOW,
            shadow: None,
        };
        assert_eq!(t.top_left(), Point::new(-80.0, 30.0));
    }

    #[test]
    fn test_line_cull_extent() {
        let l = LineCommand {
            a: Point::new(10.0, 10.0),
            b: Point::new(1000.0, 1000.0),
            color: Rgba::BLUE,
        };
        assert_eq!(l.center(), Point::new(505.0, 505.0));
        assert_eq!(l.size(), Vector::new(990.0, 990.0));
    }

    #[test]
    fn test_command_kind() {
        let entry = DrawCommand::Log(LogEntry {
            timestamp: SystemTime::now(),
            message: "tick".to_string(),
            attachments: vec![serde_json::json!(3)],
        });
        assert_eq!(entry.kind(), CommandKind::Log);
    }
}
