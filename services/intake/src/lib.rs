//! HTTP front end for report intake.

pub mod app;
pub mod config;
pub mod state;
mod routes_admin;
mod routes_reports;
mod routes_status;

pub use app::router;
pub use config::{AppConfig, StoreBackend};
pub use state::{AppState, SharedState};
