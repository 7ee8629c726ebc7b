// Chart configuration domain models
use super::error::TelemetryError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    /// Radial percentage gauge fed by the latest value of one series.
    Gauge { series: usize },
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Gauge { .. } => "gauge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    #[default]
    Bytes,
    BytesPerSecond,
    BitsPerSecond,
    Percent,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartViewport {
    pub width_px: f64,
    pub height_px: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

impl ChartViewport {
    pub fn new(width_px: f64, height_px: f64) -> Self {
        Self {
            width_px,
            height_px,
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
        }
    }

    pub fn with_margins(mut self, left: f64, right: f64, top: f64, bottom: f64) -> Self {
        self.margin_left = left;
        self.margin_right = right;
        self.margin_top = top;
        self.margin_bottom = bottom;
        self
    }

    /// Same margins, new outer dimensions.
    pub fn resized(mut self, width_px: f64, height_px: f64) -> Self {
        self.width_px = width_px;
        self.height_px = height_px;
        self
    }

    pub fn plot_width(&self) -> f64 {
        self.width_px - self.margin_left - self.margin_right
    }

    pub fn plot_height(&self) -> f64 {
        self.height_px - self.margin_top - self.margin_bottom
    }

    /// Pixel row of the value axis origin.
    pub fn baseline(&self) -> f64 {
        self.height_px - self.margin_bottom
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        let dims = [self.width_px, self.height_px];
        if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(TelemetryError::InvalidViewport(format!(
                "dimensions must be positive, got {}x{}",
                self.width_px, self.height_px
            )));
        }

        let margins = [
            self.margin_left,
            self.margin_right,
            self.margin_top,
            self.margin_bottom,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(TelemetryError::InvalidViewport(
                "margins must be non-negative".to_string(),
            ));
        }

        if self.plot_width() <= 0.0 || self.plot_height() <= 0.0 {
            return Err(TelemetryError::InvalidViewport(format!(
                "margins leave no plot area in {}x{}",
                self.width_px, self.height_px
            )));
        }

        Ok(())
    }
}
