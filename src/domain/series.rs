// Static per-series chart metadata
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    #[default]
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDescriptor {
    pub name: String,
    pub color_token: String,
    pub kind: SeriesKind,
    /// Shade the area between a line series and the baseline.
    pub fill: bool,
}

impl SeriesDescriptor {
    pub fn new(name: impl Into<String>, color_token: impl Into<String>, kind: SeriesKind) -> Self {
        Self {
            name: name.into(),
            color_token: color_token.into(),
            kind,
            fill: false,
        }
    }

    pub fn filled(mut self) -> Self {
        self.fill = true;
        self
    }

    pub fn line(name: impl Into<String>, color_token: impl Into<String>) -> Self {
        Self::new(name, color_token, SeriesKind::Line)
    }

    pub fn bar(name: impl Into<String>, color_token: impl Into<String>) -> Self {
        Self::new(name, color_token, SeriesKind::Bar)
    }
}
