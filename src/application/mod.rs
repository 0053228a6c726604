//! Application wiring: HTTP routes, the maintenance schedule and the server
//! lifecycle around the data-access layer.

pub mod app;
pub mod maintenance;
pub mod routes;

pub use app::Application;
pub use maintenance::{run_cleanup, spawn_cleanup_schedule, CleanupReport, CleanupSchedule};
pub use routes::{router, AppState};
