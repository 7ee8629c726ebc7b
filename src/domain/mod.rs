// Domain layer - Samples, chart geometry and drawing primitives
pub mod chart;
pub mod error;
pub mod format;
pub mod sample;
pub mod series;
pub mod surface;
