//! Batched portal commands
//!
//! Commands are registered into a [`CommandBatch`] and executed as a single
//! physical call. Parameters can carry deferred references into the results
//! of earlier commands in the same batch.

pub mod batch;
pub mod command;
pub mod params;

pub use batch::{BatchResult, CommandBatch};
pub use command::{Command, CommandResult};
pub use params::{ParamValue, Parameters, PathSegment, ResultReference};
