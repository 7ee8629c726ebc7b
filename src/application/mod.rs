// Application layer - Rendering, projection and the refresh loop
pub mod chart_renderer;
pub mod projection;
pub mod refresh_controller;
pub mod snapshot_source;
