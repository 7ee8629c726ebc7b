// Presentation layer - HTTP handlers and application state
pub mod app_state;
pub mod handlers;
