//! Batch execution and adaptive pagination for portal REST APIs
//!
//! Many logical calls are packed into few physical round trips: commands are
//! collected into a [`CommandBatch`], listings are walked lazily by a
//! [`Traversal`] that pages either by offset or by last-seen id, and
//! mutations are validated locally before a single batch is sent.

pub mod client;
pub mod constants;
pub mod mutation;
pub mod observer;
pub mod operations;
pub mod pagination;
pub mod resources;
pub mod service;
pub mod strategy;
pub mod transport;
pub mod traversal;

#[cfg(test)]
pub(crate) mod testing;

pub use client::HttpTransport;
pub use mutation::{
    AddRule, DeleteRule, ItemKey, MutationBatch, MutationChunking, MutationKind, MutationResults,
    MutationRules, UpdateRule, UpdateShape,
};
pub use observer::{BatchObserver, LogObserver, NoopObserver};
pub use operations::{
    BatchResult, Command, CommandBatch, CommandResult, ParamValue, Parameters, PathSegment,
    ResultReference,
};
pub use pagination::{Cursor, IdCursor, OffsetCursor, SortDirection};
pub use resources::Resource;
pub use service::BatchClient;
pub use strategy::{EntityStrategy, ListParamNames, PaginationMode, PayloadLocation};
pub use transport::{ApiResponse, BatchTransport};
pub use traversal::{ListRequest, Traversal};
