use crate::application::chart_renderer::ChartRenderer;
use crate::application::projection::{SampleProjection, SeriesProjection};
use crate::domain::chart::{ChartKind, ChartViewport, ValueFormat};
use crate::domain::error::TelemetryError;
use crate::domain::sample::{SampleBuffer, DEFAULT_SCALE_FLOOR};
use crate::domain::series::{SeriesDescriptor, SeriesKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Series colors handed out in order when a series names none.
const PALETTE: [&str; 6] = ["cyan", "emerald", "violet", "amber", "rose", "blue"];

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    /// Values substituted for `${name}` in source URLs and bodies.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub title: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_scale_floor")]
    pub scale_floor: f64,
    #[serde(default)]
    pub format: ValueFormat,
    #[serde(default)]
    pub show_latest: bool,
    #[serde(default)]
    pub gauge_series: usize,
    pub grid_lines: Option<usize>,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub margins: MarginConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MarginConfig {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            left: 60.0,
            right: 10.0,
            top: 24.0,
            bottom: 20.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub token: Option<String>,
    /// JSON body; when present the source POSTs instead of GETs.
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub name: String,
    pub color: Option<String>,
    #[serde(default)]
    pub kind: SeriesKind,
    pub pointer: String,
    pub field: Option<String>,
    #[serde(default)]
    pub rate: bool,
    pub scale: Option<f64>,
    #[serde(default)]
    pub fill: bool,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_kind() -> String {
    "line".to_string()
}

fn default_capacity() -> usize {
    60
}

fn default_interval_seconds() -> u64 {
    5
}

fn default_scale_floor() -> f64 {
    DEFAULT_SCALE_FLOOR
}

fn default_width() -> f64 {
    600.0
}

fn default_height() -> f64 {
    200.0
}

fn default_timeout_ms() -> u64 {
    5000
}

impl ChartConfig {
    fn invalid(&self, reason: impl std::fmt::Display) -> TelemetryError {
        TelemetryError::Config(format!("chart {}: {}", self.id, reason))
    }

    pub fn chart_kind(&self) -> Result<ChartKind, TelemetryError> {
        match self.kind.as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "gauge" => Ok(ChartKind::Gauge {
                series: self.gauge_series,
            }),
            other => Err(self.invalid(format!("unknown kind {other:?}"))),
        }
    }

    pub fn interval(&self) -> Result<Duration, TelemetryError> {
        if self.interval_seconds == 0 {
            return Err(self.invalid("interval_seconds must be at least 1"));
        }
        Ok(Duration::from_secs(self.interval_seconds))
    }

    pub fn viewport(&self) -> ChartViewport {
        let m = self.margins;
        ChartViewport::new(self.width, self.height).with_margins(m.left, m.right, m.top, m.bottom)
    }

    pub fn descriptors(&self) -> Vec<SeriesDescriptor> {
        self.series
            .iter()
            .enumerate()
            .map(|(idx, s)| {
                let color = s
                    .color
                    .clone()
                    .unwrap_or_else(|| PALETTE[idx % PALETTE.len()].to_string());
                let descriptor = SeriesDescriptor::new(s.name.clone(), color, s.kind);
                if s.fill { descriptor.filled() } else { descriptor }
            })
            .collect()
    }

    pub fn projection(&self) -> SampleProjection {
        let series = self
            .series
            .iter()
            .map(|s| {
                let mut projection = SeriesProjection::new(s.pointer.clone());
                if let Some(field) = &s.field {
                    projection = projection.summing(field.clone());
                }
                if s.rate {
                    projection = projection.as_rate();
                }
                if let Some(scale) = s.scale {
                    projection = projection.with_scale(scale);
                }
                projection
            })
            .collect();
        SampleProjection::new(series)
    }

    pub fn buffer(&self) -> Result<SampleBuffer, TelemetryError> {
        let capacity = NonZeroUsize::new(self.capacity)
            .ok_or_else(|| self.invalid("capacity must be positive"))?;
        SampleBuffer::new(capacity, self.series.len())
            .with_scale_floor(self.scale_floor)
            .map_err(|e| self.invalid(e))
    }

    pub fn renderer(&self) -> Result<ChartRenderer, TelemetryError> {
        let mut renderer = ChartRenderer::new(self.chart_kind()?, self.descriptors())
            .with_format(self.format)
            .with_latest_values(self.show_latest);
        if let Some(lines) = self.grid_lines {
            renderer = renderer.with_grid_lines(lines);
        }
        Ok(renderer)
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.series.is_empty() {
            return Err(self.invalid("at least one series is required"));
        }
        if let ChartKind::Gauge { series } = self.chart_kind()? {
            if series >= self.series.len() {
                return Err(self.invalid(format!("gauge_series {series} out of range")));
            }
        }
        self.interval()?;
        self.buffer()?;
        self.viewport().validate().map_err(|e| self.invalid(e))?;
        Ok(())
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        let mut seen = std::collections::HashSet::new();
        for chart in &self.charts {
            if !seen.insert(chart.id.as_str()) {
                return Err(TelemetryError::Config(format!("duplicate chart id {}", chart.id)));
            }
            chart.validate()?;
        }
        Ok(())
    }
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard"))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    let dashboard: DashboardConfig = settings.try_deserialize()?;
    dashboard.validate()?;
    Ok(dashboard)
}

/// Parse a TOML document with the same rules as the on-disk config.
pub fn parse_dashboard_config(toml: &str) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    let dashboard: DashboardConfig = settings.try_deserialize()?;
    dashboard.validate()?;
    Ok(dashboard)
}

/// Replace template variables in a URL or request body
pub fn prepare_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[server]
listen = "127.0.0.1:9090"

[vars]
router = "192.168.1.1"

[[charts]]
id = "bandwidth"
title = "Bandwidth usage"
format = "bytes_per_second"
interval_seconds = 2
show_latest = true

[charts.source]
url = "http://${router}/cgi-bin/luci/admin/status/realtime"

[[charts.series]]
name = "Download"
color = "download"
pointer = "/interfaces"
field = "rx_bytes"
rate = true

[[charts.series]]
name = "Upload"
pointer = "/interfaces"
field = "tx_bytes"
rate = true

[[charts]]
id = "hit-ratio"
title = "Cache hit ratio"
kind = "gauge"
format = "percent"

[charts.source]
url = "http://${router}/cdn/stats"
timeout_ms = 1500

[[charts.series]]
name = "Hit ratio"
color = "health"
pointer = "/hit_ratio"
"##;

    #[test]
    fn test_parse_dashboard_config() {
        let config = parse_dashboard_config(SAMPLE).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9090");
        assert_eq!(config.charts.len(), 2);

        let bandwidth = &config.charts[0];
        assert_eq!(bandwidth.capacity, 60);
        assert_eq!(bandwidth.interval().unwrap(), Duration::from_secs(2));
        assert_eq!(bandwidth.format, ValueFormat::BytesPerSecond);
        assert_eq!(bandwidth.source.timeout_ms, 5000);
        assert_eq!(bandwidth.chart_kind().unwrap(), ChartKind::Line);

        let descriptors = bandwidth.descriptors();
        assert_eq!(descriptors[0].color_token, "download");
        assert_eq!(descriptors[1].color_token, "emerald");

        let gauge = &config.charts[1];
        assert_eq!(gauge.chart_kind().unwrap(), ChartKind::Gauge { series: 0 });
        assert_eq!(gauge.source.timeout_ms, 1500);
        assert_eq!(gauge.interval().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_chart_builds_domain_pieces() {
        let config = parse_dashboard_config(SAMPLE).unwrap();
        let chart = &config.charts[0];

        let buffer = chart.buffer().unwrap();
        assert_eq!(buffer.capacity(), 60);
        assert_eq!(buffer.series_count(), 2);
        assert_eq!(buffer.scale_floor(), DEFAULT_SCALE_FLOOR);

        assert_eq!(chart.projection().series_count(), 2);
        assert_eq!(chart.renderer().unwrap().series().len(), 2);

        let viewport = chart.viewport();
        assert_eq!(viewport.width_px, 600.0);
        assert_eq!(viewport.margin_left, 60.0);
    }

    #[test]
    fn test_rejects_invalid_charts() {
        let zero_capacity = SAMPLE.replacen("interval_seconds = 2", "capacity = 0", 1);
        assert!(parse_dashboard_config(&zero_capacity).is_err());

        let unknown_kind = SAMPLE.replacen("kind = \"gauge\"", "kind = \"pie\"", 1);
        assert!(parse_dashboard_config(&unknown_kind).is_err());

        let duplicate = SAMPLE.replacen("id = \"hit-ratio\"", "id = \"bandwidth\"", 1);
        assert!(parse_dashboard_config(&duplicate).is_err());

        let gauge_out_of_range = SAMPLE.replacen("kind = \"gauge\"", "kind = \"gauge\"\ngauge_series = 3", 1);
        assert!(parse_dashboard_config(&gauge_out_of_range).is_err());
    }

    #[test]
    fn test_shipped_dashboard_parses() {
        let config = parse_dashboard_config(include_str!("../../config/dashboard.toml")).unwrap();
        let ids: Vec<_> = config.charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bandwidth", "cdn", "memory", "hit-ratio"]);
        assert_eq!(config.charts[1].chart_kind().unwrap(), ChartKind::Bar);
        assert_eq!(config.charts[3].viewport().margin_left, 10.0);
    }

    #[test]
    fn test_partial_margins_keep_defaults() {
        let partial = SAMPLE.replacen(
            "show_latest = true",
            "show_latest = true\nmargins = { left = 10 }",
            1,
        );
        let config = parse_dashboard_config(&partial).unwrap();
        let viewport = config.charts[0].viewport();
        assert_eq!(viewport.margin_left, 10.0);
        assert_eq!(viewport.margin_right, 10.0);
        assert_eq!(viewport.margin_top, 24.0);
        assert_eq!(viewport.margin_bottom, 20.0);
    }

    #[test]
    fn test_fill_and_floor_options() {
        let filled = SAMPLE.replacen("rate = true", "rate = true\nfill = true", 1);
        let config = parse_dashboard_config(&filled).unwrap();
        let descriptors = config.charts[0].descriptors();
        assert!(descriptors[0].fill);
        assert!(!descriptors[1].fill);

        let zero_floor = SAMPLE.replacen("interval_seconds = 2", "scale_floor = 0", 1);
        assert!(parse_dashboard_config(&zero_floor).is_err());
    }

    #[test]
    fn test_prepare_template() {
        let mut vars = HashMap::new();
        vars.insert("router".to_string(), "192.168.1.1".to_string());
        vars.insert("iface".to_string(), "wan".to_string());

        let url = "http://${router}/ubus?iface=${iface}&keep=${missing}";
        let result = prepare_template(url, &vars);

        assert_eq!(result, "http://192.168.1.1/ubus?iface=wan&keep=${missing}");
    }
}
