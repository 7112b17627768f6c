pub mod config;
pub mod feeds;
pub mod fetch;
pub mod metrics_consts;
pub mod producer;
