// Drawing primitives and the surface abstraction the renderer targets
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Stroke dash pattern: one dash of `array` length starting `offset` into the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dash {
    pub array: f64,
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    pub dash: Option<Dash>,
}

impl Stroke {
    pub fn solid(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            dash: None,
        }
    }

    pub fn dashed(color: impl Into<String>, width: f64, dash: Dash) -> Self {
        Self {
            color: color.into(),
            width,
            dash: Some(dash),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub color: String,
    pub size: f64,
    pub anchor: TextAnchor,
    pub bold: bool,
}

impl TextStyle {
    pub fn new(color: impl Into<String>, size: f64, anchor: TextAnchor) -> Self {
        Self {
            color: color.into(),
            size,
            anchor,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// One primitive issued to a drawing surface. Colors are theme tokens or raw
/// CSS colors; resolving them is the surface's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        width: f64,
        height: f64,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: String,
    },
    /// Closed shape filled with `fill` at `opacity`.
    Polygon {
        points: Vec<Point>,
        fill: String,
        opacity: f64,
    },
    /// Filled circle marker.
    Dot {
        center: Point,
        radius: f64,
        fill: String,
    },
    /// Unfilled circle. Dashed circles start at twelve o'clock and run clockwise.
    Circle {
        center: Point,
        radius: f64,
        stroke: Stroke,
    },
    Text {
        at: Point,
        content: String,
        style: TextStyle,
    },
}

pub trait Surface: Send {
    fn submit(&mut self, command: DrawCommand);

    /// Called once after the last command of a frame.
    fn present(&mut self) {}
}

/// Surface that keeps the commands of the most recent frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Frame {
    pub commands: Vec<DrawCommand>,
    pub presented: usize,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polylines(&self) -> impl Iterator<Item = (&[Point], &Stroke)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Polyline { points, stroke } => Some((points.as_slice(), stroke)),
            _ => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = (f64, f64, f64, f64, &str)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                fill,
            } => Some((*x, *y, *width, *height, fill.as_str())),
            _ => None,
        })
    }

    pub fn polygons(&self) -> impl Iterator<Item = (&[Point], &str)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Polygon { points, fill, .. } => Some((points.as_slice(), fill.as_str())),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }
}

impl Surface for Frame {
    fn submit(&mut self, command: DrawCommand) {
        if matches!(command, DrawCommand::Clear { .. }) {
            self.commands.clear();
        }
        self.commands.push(command);
    }

    fn present(&mut self) {
        self.presented += 1;
    }
}
