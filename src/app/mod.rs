pub mod bootstrap;
pub mod controller;

pub use bootstrap::{init_logging, run};
pub use controller::{ChartSettings, ChartState, DashboardController, FetchOutcome};
