pub mod chart;
pub mod collector;
pub mod config;
pub mod datastore;
pub mod defaults;
pub mod export;
pub mod filter;
pub mod github;
pub mod metrics;
pub mod records;
pub mod server;
