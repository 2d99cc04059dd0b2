pub mod env;
pub mod tracing_init;

pub use env::{AppConfig, GraphConfig, OverviewTuning};
pub use tracing_init::{env_filter, init_tracing};
