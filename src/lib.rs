// Router dashboard telemetry: rolling sample history, chart rendering and polling
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
