// Projection of backend snapshots into chart samples
use crate::domain::error::TelemetryError;
use crate::domain::sample::Sample;
use serde_json::Value;

/// Where one series reads its value from inside a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesProjection {
    /// JSON pointer (RFC 6901); `""` is the whole document.
    pub pointer: String,
    /// When set, the pointer names a collection and this member is summed over
    /// every element.
    pub field: Option<String>,
    /// Treat the reading as a monotonically increasing counter and chart its
    /// per-second rate.
    pub rate: bool,
    pub scale: f64,
}

impl SeriesProjection {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            field: None,
            rate: false,
            scale: 1.0,
        }
    }

    pub fn summing(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn as_rate(mut self) -> Self {
        self.rate = true;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn read(&self, snapshot: &Value) -> Result<f64, TelemetryError> {
        let node = snapshot.pointer(&self.pointer);

        let value = match (&self.field, node) {
            (None, node) => read_number(node, &self.pointer)?,
            (Some(_), None | Some(Value::Null)) => 0.0,
            (Some(field), Some(Value::Array(items))) => {
                sum_members(items.iter(), field, &self.pointer)?
            }
            (Some(field), Some(Value::Object(entries))) => {
                sum_members(entries.values(), field, &self.pointer)?
            }
            (Some(_), Some(other)) => {
                return Err(TelemetryError::Projection(format!(
                    "{} is {}, expected an array or object",
                    self.pointer,
                    type_name(other)
                )));
            }
        };

        Ok(value * self.scale)
    }
}

fn sum_members<'a>(
    members: impl Iterator<Item = &'a Value>,
    field: &str,
    pointer: &str,
) -> Result<f64, TelemetryError> {
    let mut total = 0.0;
    for member in members {
        total += read_number(member.get(field), &format!("{pointer}/*/{field}"))?;
    }
    Ok(total)
}

/// Missing and null readings count as zero; numeric strings are accepted.
fn read_number(node: Option<&Value>, path: &str) -> Result<f64, TelemetryError> {
    let value = match node {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(TelemetryError::Projection(format!(
            "{} is not a finite number ({})",
            path,
            node.map(type_name).unwrap_or("missing")
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
struct Counters {
    timestamp_ms: i64,
    raw: Vec<f64>,
}

/// Builds one `Sample` per snapshot. Holds the previous raw counters when any
/// series is charted as a rate.
#[derive(Debug, Clone)]
pub struct SampleProjection {
    series: Vec<SeriesProjection>,
    previous: Option<Counters>,
}

impl SampleProjection {
    pub fn new(series: Vec<SeriesProjection>) -> Self {
        Self {
            series,
            previous: None,
        }
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    fn tracks_counters(&self) -> bool {
        self.series.iter().any(|s| s.rate)
    }

    /// Returns `Ok(None)` while a rate series has no previous counter to
    /// difference against.
    pub fn project(
        &mut self,
        snapshot: &Value,
        timestamp_ms: i64,
    ) -> Result<Option<Sample>, TelemetryError> {
        let raw = self
            .series
            .iter()
            .map(|s| s.read(snapshot))
            .collect::<Result<Vec<f64>, _>>()?;

        if !self.tracks_counters() {
            return Ok(Some(Sample::new(timestamp_ms, raw)));
        }

        let previous = self.previous.replace(Counters {
            timestamp_ms,
            raw: raw.clone(),
        });
        let Some(previous) = previous else {
            return Ok(None);
        };

        let seconds = ((timestamp_ms - previous.timestamp_ms) as f64 / 1000.0).max(1.0);
        let values = self
            .series
            .iter()
            .zip(raw.iter().zip(previous.raw.iter()))
            .map(|(series, (current, before))| {
                if series.rate {
                    (current - before).max(0.0) / seconds
                } else {
                    *current
                }
            })
            .collect();

        Ok(Some(Sample::new(timestamp_ms, values)))
    }

    /// Forget counter state, e.g. after the history was cleared.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
