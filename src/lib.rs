pub mod config;
pub mod constants;
#[cfg(feature = "db")]
pub mod db;
pub mod domain;
pub mod error;
pub mod graphql;
pub mod observability;
pub mod reports;
pub mod seed;
pub mod server;
pub mod signals;
pub mod storage;
pub mod tasks;
pub mod views;

// Use cases and ports, and the adapters that implement the ports
pub mod app;
pub mod infra;
