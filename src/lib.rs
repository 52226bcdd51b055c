pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod registry;

// Layered boundaries: ports and use cases, adapters behind them
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub mod pipeline;
