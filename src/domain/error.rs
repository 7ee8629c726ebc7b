// Error taxonomy shared by the buffer, renderer and refresh loop
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// A sample carried a different number of values than the buffer's series count.
    #[error("sample has {actual} values, buffer expects {expected}")]
    InvalidSampleShape { expected: usize, actual: usize },

    /// Viewport dimensions cannot hold a plot area.
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),

    /// The external data source could not deliver a snapshot.
    #[error("snapshot fetch failed: {0}")]
    FetchFailure(String),

    /// A snapshot field had a type that cannot be read as a number.
    #[error("cannot project snapshot: {0}")]
    Projection(String),

    #[error("refresh interval must be greater than zero")]
    InvalidInterval,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TelemetryError {
    /// Faults originating outside this process (network, backend).
    pub fn is_external(&self) -> bool {
        matches!(self, TelemetryError::FetchFailure(_))
    }
}
