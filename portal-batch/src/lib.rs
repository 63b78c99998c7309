pub mod api;
pub mod cli;
pub mod config;
pub mod error;

pub use api::{BatchClient, CommandBatch, EntityStrategy, ListRequest, Resource};
pub use config::{BatchOptions, Config};
pub use error::{BatchError, Result};
