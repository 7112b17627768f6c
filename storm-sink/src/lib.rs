pub mod config;
pub mod handler;
pub mod metrics_consts;
pub mod store;
