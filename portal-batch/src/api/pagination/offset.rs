//! Offset pagination: explicit `start` parameter plus a reported total
//!
//! The first page is one unbatched call that also reveals the total. The
//! remaining pages are fanned out over batches of up to `capacity` commands,
//! each asking for its own `start`.

use serde_json::Value;

use super::{PageContext, page_items};
use crate::api::operations::Parameters;
use crate::error::{BatchError, Result};

#[derive(Debug, Clone)]
pub struct OffsetCursor {
    next_start: usize,
    page_size: usize,
    total_known: Option<usize>,
    finished: bool,
}

impl OffsetCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            next_start: 0,
            page_size,
            total_known: None,
            finished: false,
        }
    }

    pub fn next_start(&self) -> usize {
        self.next_start
    }

    pub fn total_known(&self) -> Option<usize> {
        self.total_known
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn advance(
        &mut self,
        ctx: &mut PageContext<'_>,
        wanted: Option<usize>,
    ) -> Result<Option<Vec<Value>>> {
        if self.finished {
            return Ok(None);
        }
        match self.total_known {
            None => self.first_page(ctx).await.map(Some),
            Some(total) => self.next_pages(ctx, total, wanted).await,
        }
    }

    async fn first_page(&mut self, ctx: &mut PageContext<'_>) -> Result<Vec<Value>> {
        let params = self.page_parameters(ctx, 0);

        ctx.observer.single_call(ctx.method);
        let response = ctx
            .transport
            .call(ctx.method, &params)
            .await
            .map_err(|e| BatchError::execution(&format!("first page of {}", ctx.method), e))?;

        let items = ctx.strategy.extract_items(&response.result);
        let total = response.total.unwrap_or(items.len());
        ctx.observer.total_known(ctx.method, total);

        self.total_known = Some(total);
        self.next_start = items.len();
        if total <= self.page_size || items.is_empty() || self.next_start >= total {
            self.finished = true;
        }
        Ok(items)
    }

    async fn next_pages(
        &mut self,
        ctx: &mut PageContext<'_>,
        total: usize,
        wanted: Option<usize>,
    ) -> Result<Option<Vec<Value>>> {
        let mut remaining = total.saturating_sub(self.next_start);
        if let Some(wanted) = wanted {
            remaining = remaining.min(wanted);
        }
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }

        let pages = remaining.div_ceil(self.page_size).min(ctx.batch.capacity());
        ctx.batch.clear();
        for i in 0..pages {
            let start = self.next_start + i * self.page_size;
            if start >= total {
                break;
            }
            let params = self.page_parameters(ctx, start);
            ctx.batch.register(ctx.method, params)?;
        }

        let results = ctx.batch.execute_observed(ctx.transport, ctx.observer).await?;

        let mut items = Vec::new();
        for result in results {
            let page = page_items(ctx.strategy, result)?;
            if page.is_empty() {
                // The reported total was larger than what the portal actually holds
                self.finished = true;
                break;
            }
            self.next_start += page.len();
            items.extend(page);
        }
        if self.next_start >= total {
            self.finished = true;
        }
        Ok(Some(items))
    }

    fn page_parameters(&self, ctx: &PageContext<'_>, start: usize) -> Parameters {
        let mut params = ctx.parameters.clone();
        params.insert(ctx.strategy.param_names().start.clone(), start);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::observer::NoopObserver;
    use crate::api::operations::CommandBatch;
    use crate::api::testing::FakePortal;
    use crate::api::Resource;
    use serde_json::json;

    async fn drain(portal: &FakePortal, wanted: Option<usize>) -> (Vec<Value>, OffsetCursor) {
        let resource = Resource::elements();
        let params = Parameters::new().with("IBLOCK_TYPE_ID", "lists").with("IBLOCK_ID", 7i64);
        let mut batch = CommandBatch::new();
        let mut cursor = OffsetCursor::new(50);
        let mut ctx = PageContext {
            transport: portal,
            observer: &NoopObserver,
            strategy: &resource.strategy,
            method: resource.list_method,
            parameters: &params,
            batch: &mut batch,
        };

        let mut items: Vec<Value> = Vec::new();
        loop {
            let still_wanted = wanted.map(|w| w.saturating_sub(items.len()));
            match cursor.advance(&mut ctx, still_wanted).await.unwrap() {
                Some(page) => items.extend(page),
                None => break,
            }
        }
        (items, cursor)
    }

    #[tokio::test]
    async fn test_first_page_only_when_total_fits() {
        let portal = FakePortal::new(Resource::elements()).with_records(50, |n| json!({"NAME": format!("e{}", n)}));

        let (items, cursor) = drain(&portal, None).await;

        assert_eq!(items.len(), 50);
        assert_eq!(cursor.total_known(), Some(50));
        assert_eq!(portal.single_calls(), 1);
        assert_eq!(portal.physical_calls(), 1);
    }

    #[tokio::test]
    async fn test_remaining_pages_fan_out_in_one_batch() {
        let portal = FakePortal::new(Resource::elements()).with_records(120, |n| json!({"NAME": format!("e{}", n)}));

        let (items, cursor) = drain(&portal, None).await;

        assert_eq!(items.len(), 120);
        // first page + one batch carrying pages at start 50 and 100
        assert_eq!(portal.physical_calls(), 2);
        assert_eq!(portal.batch_sizes(), vec![2]);
        assert_eq!(cursor.next_start(), 120);
        assert!(cursor.is_finished());
    }

    #[tokio::test]
    async fn test_start_offsets_follow_page_size() {
        let portal = FakePortal::new(Resource::elements()).with_records(160, |n| json!({"NAME": format!("e{}", n)}));

        drain(&portal, None).await;

        assert_eq!(portal.requested_starts(), vec![0, 50, 100, 150]);
    }

    #[tokio::test]
    async fn test_wanted_caps_batch_size() {
        let portal = FakePortal::new(Resource::elements()).with_records(1000, |n| json!({"NAME": format!("e{}", n)}));

        let (items, cursor) = drain(&portal, Some(120)).await;

        // first page is always a full page; the batch asks for ceil(70 / 50) pages
        assert_eq!(portal.batch_sizes(), vec![2]);
        assert_eq!(items.len(), 150);
        assert!(cursor.is_finished());
    }
}
