//! HTTP API handlers for qmap-ts

pub mod health;
pub mod runs;
pub mod sse;
pub mod ui;

pub use health::health_routes;
pub use runs::run_routes;
pub use sse::event_stream;
pub use ui::ui_routes;
