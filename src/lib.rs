//! Library entrypoint: re-export modules

pub mod cli;
pub mod config;
pub mod errors;
pub mod ingress;
pub mod metrics;
pub mod metrics_server;
pub mod model;
pub mod queue;
pub mod supervisor;
pub mod timestamp;
pub mod writer;
