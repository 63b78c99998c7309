//! Lazy traversal of unbounded listings
//!
//! A [`Traversal`] holds one cursor, one command batch and a buffer of at most
//! one physical call's worth of items. It only touches the network when the
//! buffer is empty and the caller asks for more.

use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;

use super::observer::BatchObserver;
use super::operations::{CommandBatch, ParamValue, Parameters};
use super::pagination::{Cursor, PageContext};
use super::strategy::EntityStrategy;
use super::transport::BatchTransport;
use crate::error::Result;

/// Caller-facing listing request: `(order, filter, select, limit, extra)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub order: Parameters,
    pub filter: Parameters,
    pub select: Vec<String>,
    pub limit: Option<usize>,
    /// Method-specific parameters passed through unchanged (e.g. `IBLOCK_ID`)
    pub extra: Parameters,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        let direction: String = direction.into();
        self.order.insert(field, direction);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.filter.insert(key, value);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Listing parameters under the strategy's names, without paging keys
    pub fn to_parameters(&self, strategy: &EntityStrategy) -> Parameters {
        let names = strategy.param_names();
        let mut params = self.extra.clone();
        if !self.select.is_empty() {
            params.insert(names.select.clone(), Value::from(self.select.clone()));
        }
        if !self.filter.is_empty() {
            params.insert(names.filter.clone(), self.filter.clone());
        }
        if !self.order.is_empty() {
            params.insert(names.order.clone(), self.order.clone());
        }
        params
    }
}

/// Pull-driven, single-pass sequence of items from one listing method
pub struct Traversal<'a> {
    transport: &'a dyn BatchTransport,
    observer: &'a dyn BatchObserver,
    strategy: &'a EntityStrategy,
    method: String,
    parameters: Parameters,
    limit: Option<usize>,
    cursor: Cursor,
    batch: CommandBatch,
    buffer: VecDeque<Value>,
    yielded: usize,
    started: bool,
    exhausted: bool,
}

impl<'a> Traversal<'a> {
    pub fn new(
        transport: &'a dyn BatchTransport,
        observer: &'a dyn BatchObserver,
        strategy: &'a EntityStrategy,
        method: impl Into<String>,
        request: ListRequest,
        capacity: usize,
    ) -> Self {
        let parameters = request.to_parameters(strategy);
        let cursor = Cursor::for_strategy(strategy, &request.order);
        Self {
            transport,
            observer,
            strategy,
            method: method.into(),
            parameters,
            limit: request.limit,
            cursor,
            batch: CommandBatch::with_capacity(capacity),
            buffer: VecDeque::new(),
            yielded: 0,
            started: false,
            exhausted: false,
        }
    }

    /// Next item, fetching another physical call's worth when the buffer runs dry.
    ///
    /// Returns `Ok(None)` once the listing or the limit is exhausted. After an
    /// error the traversal is exhausted as well.
    pub async fn next_item(&mut self) -> Result<Option<Value>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            if self.limit.is_some_and(|limit| self.yielded >= limit) {
                self.finish();
                return Ok(None);
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }
            if self.cursor.is_finished() {
                self.finish();
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            self.observer
                .traversal_started(&self.method, self.cursor.mode(), self.limit);
        }

        // The buffer is empty here, so everything still allowed is wanted
        let wanted = self.limit.map(|limit| limit.saturating_sub(self.yielded));
        let mut ctx = PageContext {
            transport: self.transport,
            observer: self.observer,
            strategy: self.strategy,
            method: &self.method,
            parameters: &self.parameters,
            batch: &mut self.batch,
        };

        match self.cursor.advance(&mut ctx, wanted).await {
            Ok(Some(items)) => {
                self.observer.page_received(&self.method, items.len());
                self.buffer.extend(items);
                Ok(())
            }
            Ok(None) => {
                self.finish();
                Ok(())
            }
            Err(error) => {
                self.exhausted = true;
                self.buffer.clear();
                self.observer.failed("traversal", &error);
                Err(error)
            }
        }
    }

    fn finish(&mut self) {
        if !self.exhausted {
            self.exhausted = true;
            self.buffer.clear();
            self.observer.traversal_finished(&self.method, self.yielded);
        }
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Drain the whole traversal into memory
    pub async fn collect_all(mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a `futures::Stream`; an error is the last element
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + 'a {
        stream::unfold(self, |mut traversal| async move {
            match traversal.next_item().await {
                Ok(Some(item)) => Some((Ok(item), traversal)),
                Ok(None) => None,
                Err(error) => Some((Err(error), traversal)),
            }
        })
    }
}
