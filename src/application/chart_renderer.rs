// Chart renderer - Maps buffered samples to drawing primitives
use crate::domain::chart::{ChartKind, ChartViewport, ValueFormat};
use crate::domain::error::TelemetryError;
use crate::domain::format::{format_percent, format_value, health_color};
use crate::domain::sample::{Sample, SampleBuffer};
use crate::domain::series::{SeriesDescriptor, SeriesKind};
use crate::domain::surface::{Dash, DrawCommand, Point, Stroke, Surface, TextAnchor, TextStyle};

pub const DEFAULT_GRID_LINES: usize = 5;
pub const DEFAULT_MIN_BAR_HEIGHT: f64 = 4.0;
pub const DEFAULT_BAR_GAP: f64 = 4.0;

const GAUGE_RING_WIDTH: f64 = 8.0;
const LABEL_SIZE: f64 = 11.0;
const LEGEND_SWATCH: f64 = 10.0;
const AREA_OPACITY: f64 = 0.1;
const END_DOT_RADIUS: f64 = 3.0;

/// Color token that makes a gauge follow the utilisation thresholds.
pub const HEALTH_COLOR_TOKEN: &str = "health";

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    kind: ChartKind,
    series: Vec<SeriesDescriptor>,
    format: ValueFormat,
    grid_lines: usize,
    min_bar_height: f64,
    bar_gap: f64,
    show_latest: bool,
}

impl ChartRenderer {
    pub fn new(kind: ChartKind, series: Vec<SeriesDescriptor>) -> Self {
        Self {
            kind,
            series,
            format: ValueFormat::default(),
            grid_lines: DEFAULT_GRID_LINES,
            min_bar_height: DEFAULT_MIN_BAR_HEIGHT,
            bar_gap: DEFAULT_BAR_GAP,
            show_latest: false,
        }
    }

    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_grid_lines(mut self, grid_lines: usize) -> Self {
        self.grid_lines = grid_lines.max(1);
        self
    }

    pub fn with_bar_geometry(mut self, min_height: f64, gap: f64) -> Self {
        self.min_bar_height = min_height.max(0.0);
        self.bar_gap = gap.max(0.0);
        self
    }

    pub fn with_latest_values(mut self, show: bool) -> Self {
        self.show_latest = show;
        self
    }

    pub fn with_series(mut self, series: Vec<SeriesDescriptor>) -> Self {
        self.series = series;
        self
    }

    pub fn kind(&self) -> ChartKind {
        self.kind
    }

    pub fn series(&self) -> &[SeriesDescriptor] {
        &self.series
    }

    /// Draw one full frame of `buffer`, scaled to `buffer.max_value(None)`.
    /// Fails only on an unusable viewport; an empty history renders a
    /// placeholder.
    pub fn draw(
        &self,
        buffer: &SampleBuffer,
        viewport: &ChartViewport,
        surface: &mut dyn Surface,
    ) -> Result<(), TelemetryError> {
        viewport.validate()?;

        let samples = buffer.snapshot();
        let scale_max = buffer.max_value(None);

        surface.submit(DrawCommand::Clear {
            width: viewport.width_px,
            height: viewport.height_px,
        });

        match self.kind {
            ChartKind::Line => self.draw_cartesian(&samples, scale_max, viewport, surface, false),
            ChartKind::Bar => self.draw_cartesian(&samples, scale_max, viewport, surface, true),
            ChartKind::Gauge { series } => self.draw_gauge(&samples, series, viewport, surface),
        }

        surface.present();
        Ok(())
    }

    fn draw_cartesian(
        &self,
        samples: &[Sample],
        scale_max: f64,
        viewport: &ChartViewport,
        surface: &mut dyn Surface,
        all_bars: bool,
    ) {
        self.draw_grid(viewport, surface);

        if samples.is_empty() {
            self.draw_placeholder(viewport, surface);
        } else {
            let bar_series: Vec<usize> = self
                .series
                .iter()
                .enumerate()
                .filter(|(_, s)| all_bars || s.kind == SeriesKind::Bar)
                .map(|(idx, _)| idx)
                .collect();
            self.draw_bars(samples, &bar_series, scale_max, viewport, surface);

            if !all_bars {
                for (idx, series) in self.series.iter().enumerate() {
                    if series.kind == SeriesKind::Line {
                        draw_line(samples, idx, series, scale_max, viewport, surface);
                    }
                }
            }
        }

        draw_axes(viewport, surface);
        self.draw_scale_labels(scale_max, viewport, surface);
        self.draw_legend(samples, viewport, surface);
    }

    fn grid_y(&self, viewport: &ChartViewport, line: usize) -> f64 {
        viewport.margin_top + viewport.plot_height() * line as f64 / self.grid_lines as f64
    }

    fn draw_grid(&self, viewport: &ChartViewport, surface: &mut dyn Surface) {
        let left = viewport.margin_left;
        let right = viewport.width_px - viewport.margin_right;
        for line in 0..self.grid_lines {
            let y = self.grid_y(viewport, line);
            surface.submit(DrawCommand::Line {
                from: Point::new(left, y),
                to: Point::new(right, y),
                stroke: Stroke::solid("grid", 1.0),
            });
        }
    }

    fn draw_scale_labels(&self, scale_max: f64, viewport: &ChartViewport, surface: &mut dyn Surface) {
        for line in 0..self.grid_lines {
            let fraction = 1.0 - line as f64 / self.grid_lines as f64;
            surface.submit(DrawCommand::Text {
                at: Point::new(viewport.margin_left - 4.0, self.grid_y(viewport, line) + 4.0),
                content: format_value(scale_max * fraction, self.format),
                style: TextStyle::new("text", LABEL_SIZE, TextAnchor::End),
            });
        }
    }

    /// Bars in equal slots spanning exactly the plot width; several bar series
    /// share each sample's slot side by side. The gap shrinks to at most half
    /// a slot so dense histories still fit.
    fn draw_bars(
        &self,
        samples: &[Sample],
        series: &[usize],
        scale_max: f64,
        viewport: &ChartViewport,
        surface: &mut dyn Surface,
    ) {
        if series.is_empty() {
            return;
        }

        let count = samples.len() as f64;
        let plot_width = viewport.plot_width();
        let gap = if samples.len() > 1 {
            self.bar_gap.min(plot_width / count * 0.5)
        } else {
            0.0
        };
        let slot_width = (plot_width - gap * (count - 1.0)) / count;
        let bar_width = slot_width / series.len() as f64;
        let plot_height = viewport.plot_height();
        let baseline = viewport.baseline();

        for (i, sample) in samples.iter().enumerate() {
            let slot_x = viewport.margin_left + i as f64 * (slot_width + gap);
            for (j, &idx) in series.iter().enumerate() {
                let value = sample.value(idx).filter(|v| v.is_finite()).unwrap_or(0.0);
                let height = (value / scale_max * plot_height)
                    .max(self.min_bar_height)
                    .min(plot_height);
                surface.submit(DrawCommand::Rect {
                    x: slot_x + j as f64 * bar_width,
                    y: baseline - height,
                    width: bar_width,
                    height,
                    fill: self.series[idx].color_token.clone(),
                });
            }
        }
    }

    fn draw_legend(&self, samples: &[Sample], viewport: &ChartViewport, surface: &mut dyn Surface) {
        let latest = samples.last();
        let row = (viewport.margin_top / 2.0).max(LEGEND_SWATCH);
        let mut x = viewport.margin_left;

        for (idx, series) in self.series.iter().enumerate() {
            surface.submit(DrawCommand::Rect {
                x,
                y: row - LEGEND_SWATCH / 2.0,
                width: LEGEND_SWATCH,
                height: LEGEND_SWATCH,
                fill: series.color_token.clone(),
            });
            x += LEGEND_SWATCH + 4.0;

            surface.submit(DrawCommand::Text {
                at: Point::new(x, row + 4.0),
                content: series.name.clone(),
                style: TextStyle::new("text", LABEL_SIZE, TextAnchor::Start),
            });
            x += text_width(&series.name, LABEL_SIZE) + 6.0;

            if self.show_latest {
                if let Some(value) = latest.and_then(|s| s.value(idx)) {
                    let content = format_value(value, self.format);
                    x += 2.0;
                    surface.submit(DrawCommand::Text {
                        at: Point::new(x, row + 4.0),
                        content: content.clone(),
                        style: TextStyle::new(series.color_token.clone(), LABEL_SIZE, TextAnchor::Start)
                            .bold(),
                    });
                    x += text_width(&content, LABEL_SIZE) + 6.0;
                }
            }

            x += 12.0;
        }
    }

    fn draw_placeholder(&self, viewport: &ChartViewport, surface: &mut dyn Surface) {
        let mid = viewport.margin_top + viewport.plot_height() / 2.0;
        surface.submit(DrawCommand::Line {
            from: Point::new(viewport.margin_left, mid),
            to: Point::new(viewport.width_px - viewport.margin_right, mid),
            stroke: Stroke::dashed("muted", 1.0, Dash { array: 4.0, offset: 0.0 }),
        });
        surface.submit(DrawCommand::Text {
            at: Point::new(viewport.margin_left + viewport.plot_width() / 2.0, mid - 6.0),
            content: "No data".to_string(),
            style: TextStyle::new("muted", LABEL_SIZE, TextAnchor::Middle),
        });
    }

    fn draw_gauge(
        &self,
        samples: &[Sample],
        series: usize,
        viewport: &ChartViewport,
        surface: &mut dyn Surface,
    ) {
        let raw = samples.last().and_then(|s| s.value(series)).unwrap_or(0.0);
        let percent = gauge_percent(raw);

        let center = Point::new(
            viewport.margin_left + viewport.plot_width() / 2.0,
            viewport.margin_top + viewport.plot_height() / 2.0,
        );
        let radius = ((viewport.plot_width().min(viewport.plot_height()) - GAUGE_RING_WIDTH) / 2.0).max(1.0);
        let circumference = 2.0 * std::f64::consts::PI * radius;

        let descriptor = self.series.get(series);
        let color = match descriptor.map(|d| d.color_token.as_str()) {
            Some(HEALTH_COLOR_TOKEN) | None => health_color(percent).to_string(),
            Some(token) => token.to_string(),
        };

        surface.submit(DrawCommand::Circle {
            center,
            radius,
            stroke: Stroke::solid("track", GAUGE_RING_WIDTH),
        });
        surface.submit(DrawCommand::Circle {
            center,
            radius,
            stroke: Stroke::dashed(
                color.clone(),
                GAUGE_RING_WIDTH,
                Dash {
                    array: circumference,
                    offset: circumference * (1.0 - percent / 100.0),
                },
            ),
        });

        let size = (radius * 0.4).max(LABEL_SIZE);
        surface.submit(DrawCommand::Text {
            at: Point::new(center.x, center.y + size * 0.35),
            content: format_percent(percent),
            style: TextStyle::new(color, size, TextAnchor::Middle).bold(),
        });

        if let Some(descriptor) = descriptor {
            surface.submit(DrawCommand::Text {
                at: Point::new(center.x, center.y + size * 0.35 + LABEL_SIZE + 4.0),
                content: descriptor.name.clone(),
                style: TextStyle::new("text", LABEL_SIZE, TextAnchor::Middle),
            });
        }
    }
}

/// Clamp a gauge reading into `[0, 100]`; NaN reads as empty.
pub fn gauge_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn draw_line(
    samples: &[Sample],
    idx: usize,
    series: &SeriesDescriptor,
    scale_max: f64,
    viewport: &ChartViewport,
    surface: &mut dyn Surface,
) {
    if samples.len() < 2 {
        return;
    }

    let steps = (samples.len() - 1).max(1) as f64;
    let plot_width = viewport.plot_width();
    let plot_height = viewport.plot_height();
    let baseline = viewport.baseline();

    let points: Vec<Point> = samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let value = sample.value(idx).filter(|v| v.is_finite()).unwrap_or(0.0);
            Point::new(
                viewport.margin_left + plot_width * i as f64 / steps,
                baseline - plot_height * value / scale_max,
            )
        })
        .collect();

    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return;
    };

    if series.fill {
        let mut area = points.clone();
        area.push(Point::new(last.x, baseline));
        area.push(Point::new(first.x, baseline));
        surface.submit(DrawCommand::Polygon {
            points: area,
            fill: series.color_token.clone(),
            opacity: AREA_OPACITY,
        });
    }

    surface.submit(DrawCommand::Polyline {
        points,
        stroke: Stroke::solid(series.color_token.clone(), 2.0),
    });

    if series.fill {
        surface.submit(DrawCommand::Dot {
            center: last,
            radius: END_DOT_RADIUS,
            fill: series.color_token.clone(),
        });
    }
}

fn draw_axes(viewport: &ChartViewport, surface: &mut dyn Surface) {
    let origin = Point::new(viewport.margin_left, viewport.baseline());
    surface.submit(DrawCommand::Line {
        from: Point::new(viewport.margin_left, viewport.margin_top),
        to: origin,
        stroke: Stroke::solid("axis", 1.0),
    });
    surface.submit(DrawCommand::Line {
        from: origin,
        to: Point::new(viewport.width_px - viewport.margin_right, viewport.baseline()),
        stroke: Stroke::solid("axis", 1.0),
    });
}

// Rough advance for a sans-serif label; there is no font metrics source here.
fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * 0.6
}
