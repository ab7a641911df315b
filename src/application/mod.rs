//! Application wiring: settings, recording store and the dashboard API

pub mod app;
pub mod dashboard;

pub use app::Application;
