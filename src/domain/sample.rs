// Rolling sample history for one chart
use super::error::TelemetryError;
use serde::Serialize;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Minimum denominator used when auto-scaling an empty or all-zero history.
pub const DEFAULT_SCALE_FLOOR: f64 = 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp_ms: i64, values: Vec<f64>) -> Self {
        Self {
            timestamp_ms,
            values,
        }
    }

    pub fn value(&self, series: usize) -> Option<f64> {
        self.values.get(series).copied()
    }
}

/// Largest value in `samples` for one series (or all of them), never below `floor`.
///
/// Non-finite readings are ignored so a single NaN cannot poison the scale.
pub fn compute_scale(samples: &[Sample], series: Option<usize>, floor: f64) -> f64 {
    let observed = samples
        .iter()
        .flat_map(|s| match series {
            Some(idx) => s.values.get(idx..=idx).unwrap_or(&[]),
            None => s.values.as_slice(),
        })
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if observed > floor { observed } else { floor }
}

/// Fixed-capacity FIFO of samples. The oldest sample is evicted when a push
/// arrives at capacity.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: NonZeroUsize,
    series_count: usize,
    scale_floor: f64,
}

impl SampleBuffer {
    pub fn new(capacity: NonZeroUsize, series_count: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.get()),
            capacity,
            series_count,
            scale_floor: DEFAULT_SCALE_FLOOR,
        }
    }

    /// The floor is the scale of an empty or all-zero history, so it must be
    /// a positive finite value.
    pub fn with_scale_floor(mut self, floor: f64) -> Result<Self, TelemetryError> {
        if !floor.is_finite() || floor <= 0.0 {
            return Err(TelemetryError::Config(format!(
                "scale floor must be positive, got {floor}"
            )));
        }
        self.scale_floor = floor;
        Ok(self)
    }

    pub fn push(&mut self, sample: Sample) -> Result<(), TelemetryError> {
        if sample.values.len() != self.series_count {
            return Err(TelemetryError::InvalidSampleShape {
                expected: self.series_count,
                actual: sample.values.len(),
            });
        }

        if self.samples.len() == self.capacity.get() {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.iter().cloned().collect()
    }

    pub fn max_value(&self, series: Option<usize>) -> f64 {
        let (front, back) = self.samples.as_slices();
        let front_max = compute_scale(front, series, self.scale_floor);
        let back_max = compute_scale(back, series, self.scale_floor);
        front_max.max(back_max)
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Empty the buffer and accept a different number of series from now on.
    pub fn reset(&mut self, series_count: usize) {
        self.samples.clear();
        self.series_count = series_count;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn series_count(&self) -> usize {
        self.series_count
    }

    pub fn scale_floor(&self) -> f64 {
        self.scale_floor
    }
}
