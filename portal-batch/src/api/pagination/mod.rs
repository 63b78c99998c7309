//! Pagination cursors
//!
//! A cursor tracks progress through a listing and knows how to fetch the next
//! physical call's worth of items. The variant is chosen from the resource's
//! [`EntityStrategy`] and never changes during a traversal.

pub mod id_based;
pub mod offset;

pub use id_based::{IdCursor, SortDirection};
pub use offset::OffsetCursor;

use serde_json::Value;

use super::observer::BatchObserver;
use super::operations::{CommandBatch, CommandResult, Parameters};
use super::strategy::{EntityStrategy, PaginationMode};
use super::transport::BatchTransport;
use crate::error::{BatchError, Result};

/// Everything a cursor needs to issue one physical call
pub struct PageContext<'a> {
    pub transport: &'a dyn BatchTransport,
    pub observer: &'a dyn BatchObserver,
    pub strategy: &'a EntityStrategy,
    pub method: &'a str,
    /// Listing parameters without any paging keys
    pub parameters: &'a Parameters,
    pub batch: &'a mut CommandBatch,
}

#[derive(Debug, Clone)]
pub enum Cursor {
    Offset(OffsetCursor),
    IdBased(IdCursor),
}

impl Cursor {
    /// Cursor matching the strategy's pagination mode
    pub fn for_strategy(strategy: &EntityStrategy, order: &Parameters) -> Self {
        match strategy.pagination() {
            PaginationMode::Offset => Self::Offset(OffsetCursor::new(strategy.page_size())),
            PaginationMode::IdBased => Self::IdBased(IdCursor::new(
                strategy.key_id_field(),
                SortDirection::from_order(order, strategy.key_id_field()),
                strategy.page_size(),
            )),
        }
    }

    pub fn mode(&self) -> PaginationMode {
        match self {
            Self::Offset(_) => PaginationMode::Offset,
            Self::IdBased(_) => PaginationMode::IdBased,
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Self::Offset(cursor) => cursor.is_finished(),
            Self::IdBased(cursor) => cursor.is_finished(),
        }
    }

    /// Fetch the next physical call's items.
    ///
    /// `wanted` bounds how many more items the caller can use; it sizes the
    /// batch so no page past the limit is requested. Returns `None` once the
    /// listing is exhausted, without touching the network.
    pub async fn advance(
        &mut self,
        ctx: &mut PageContext<'_>,
        wanted: Option<usize>,
    ) -> Result<Option<Vec<Value>>> {
        match self {
            Self::Offset(cursor) => cursor.advance(ctx, wanted).await,
            Self::IdBased(cursor) => cursor.advance(ctx, wanted).await,
        }
    }
}

/// Items of one listing sub-result; a failed command ends the traversal
pub(crate) fn page_items(strategy: &EntityStrategy, result: CommandResult) -> Result<Vec<Value>> {
    let command_id = result.command_id.clone();
    let data = result
        .into_result()
        .map_err(|message| BatchError::CommandFailed {
            command_id,
            message,
        })?;
    Ok(strategy.extract_items(&data))
}
