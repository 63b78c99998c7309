//! Entry point tying a transport, an observer and the engine options together

use serde_json::Value;
use std::sync::Arc;

use super::mutation::{ItemKey, MutationBatch, MutationResults};
use super::observer::{BatchObserver, LogObserver};
use super::operations::{BatchResult, CommandBatch};
use super::resources::Resource;
use super::strategy::EntityStrategy;
use super::transport::BatchTransport;
use super::traversal::{ListRequest, Traversal};
use crate::config::BatchOptions;
use crate::error::Result;

/// Batched access to one portal
///
/// Every call builds its own [`CommandBatch`] and cursor, so a client can be
/// shared freely; nothing is cached between calls.
#[derive(Clone)]
pub struct BatchClient {
    transport: Arc<dyn BatchTransport>,
    observer: Arc<dyn BatchObserver>,
    options: BatchOptions,
}

impl BatchClient {
    pub fn new(transport: Arc<dyn BatchTransport>) -> Self {
        Self {
            transport,
            observer: Arc::new(LogObserver),
            options: BatchOptions::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Empty batch sized to the configured capacity
    pub fn batch(&self) -> CommandBatch {
        CommandBatch::with_capacity(self.options.capacity)
    }

    pub async fn execute(&self, batch: &CommandBatch) -> Result<BatchResult> {
        batch
            .execute_observed(self.transport.as_ref(), self.observer.as_ref())
            .await
    }

    /// Lazy listing of any method under an explicit strategy
    pub fn traverse<'a>(
        &'a self,
        method: &str,
        strategy: &'a EntityStrategy,
        request: ListRequest,
    ) -> Traversal<'a> {
        Traversal::new(
            self.transport.as_ref(),
            self.observer.as_ref(),
            strategy,
            method,
            request,
            self.options.capacity,
        )
    }

    /// Lazy listing of a catalog resource
    pub fn list<'a>(&'a self, resource: &'a Resource, request: ListRequest) -> Traversal<'a> {
        self.traverse(resource.list_method, &resource.strategy, request)
    }

    pub async fn add(&self, resource: &Resource, items: Vec<Value>) -> Result<MutationResults> {
        self.mutations()
            .add_items(resource.add_method, &resource.mutations.add, items)
            .await
    }

    /// Update keyed items; each result carries the caller's key
    pub async fn update(
        &self,
        resource: &Resource,
        items: Vec<(ItemKey, Value)>,
    ) -> Result<MutationResults> {
        self.mutations()
            .update_items(resource.update_method, &resource.mutations.update, items)
            .await
    }

    pub async fn delete(&self, resource: &Resource, items: Vec<Value>) -> Result<MutationResults> {
        self.mutations()
            .delete_items(resource.delete_method, &resource.mutations.delete, items)
            .await
    }

    fn mutations(&self) -> MutationBatch<'_> {
        MutationBatch::new(
            self.transport.as_ref(),
            self.observer.as_ref(),
            self.options.capacity,
            self.options.mutation_chunking,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mutation::MutationChunking;
    use crate::api::observer::NoopObserver;
    use crate::api::operations::{Parameters, ResultReference};
    use crate::api::testing::FakePortal;
    use serde_json::json;

    fn client(portal: &Arc<FakePortal>, options: BatchOptions) -> BatchClient {
        BatchClient::new(portal.clone())
            .with_observer(Arc::new(NoopObserver))
            .with_options(options)
    }

    #[tokio::test]
    async fn test_capacity_option_bounds_batches() {
        let portal = Arc::new(FakePortal::new(Resource::sale_orders()).with_records(1200, |_| json!({})));
        let options = BatchOptions::builder().capacity(10).build().unwrap();
        let client = client(&portal, options);
        let resource = Resource::sale_orders();

        let items = client.list(&resource, ListRequest::new()).collect_all().await.unwrap();

        assert_eq!(items.len(), 1200);
        // 500 items per call of 10 pages
        assert_eq!(portal.batch_sizes(), vec![10, 10, 10]);
    }

    #[tokio::test]
    async fn test_traverse_with_custom_strategy() {
        let portal = Arc::new(FakePortal::new(Resource::crm_items()).with_records(60, |n| json!({"title": format!("deal {}", n)})));
        let client = client(&portal, BatchOptions::default());
        let strategy = EntityStrategy::id_based("id").with_payload_key("items");

        let request = ListRequest::new()
            .extra("entityTypeId", 1036i64)
            .select(["id", "title"])
            .limit(55);
        let items = client
            .traverse("crm.item.list", &strategy, request)
            .collect_all()
            .await
            .unwrap();

        assert_eq!(items.len(), 55);
        assert_eq!(items[54]["title"], "deal 55");
    }

    #[tokio::test]
    async fn test_mutation_chunking_from_options() {
        let portal = Arc::new(FakePortal::new(Resource::epics()));
        let resource = Resource::epics();
        let items: Vec<Value> = (0..12).map(|n| json!({"fields": {"name": format!("epic {}", n)}})).collect();

        let rejecting = client(&portal, BatchOptions::builder().capacity(5).build().unwrap());
        assert!(rejecting.add(&resource, items.clone()).await.is_err());
        assert_eq!(portal.physical_calls(), 0);

        let chunking = client(
            &portal,
            BatchOptions::builder()
                .capacity(5)
                .mutation_chunking(MutationChunking::Sequential)
                .build()
                .unwrap(),
        );
        let results = chunking.add(&resource, items).await.unwrap();
        assert_eq!(results.len(), 12);
        assert_eq!(portal.batch_sizes(), vec![5, 5, 2]);
        assert_eq!(portal.records().len(), 12);
    }

    #[tokio::test]
    async fn test_update_and_delete_through_client() {
        let portal = Arc::new(FakePortal::new(Resource::basket_items()).with_records(3, |_| json!({"quantity": 1})));
        let client = client(&portal, BatchOptions::default());
        let resource = Resource::basket_items();

        let updated: Vec<_> = client
            .update(&resource, vec![(ItemKey::Id(2), json!({"fields": {"quantity": 4}}))])
            .await
            .unwrap()
            .collect();
        assert!(updated[0].1.is_success());
        assert_eq!(portal.records()[1]["quantity"], 4);

        let deleted: Vec<_> = client.delete(&resource, vec![json!(1), json!(9)]).await.unwrap().collect();
        assert!(deleted[0].1.is_success());
        assert!(deleted[1].1.is_error());
        assert_eq!(portal.records().len(), 2);
    }

    #[tokio::test]
    async fn test_hand_built_batch_with_reference() {
        let portal = Arc::new(FakePortal::new(Resource::sale_orders()).with_records(80, |_| json!({})));
        let client = client(&portal, BatchOptions::default());

        let mut batch = client.batch();
        let first = batch.register("sale.order.list", Parameters::new()).unwrap();
        batch
            .register(
                "sale.order.list",
                Parameters::new().with(
                    "filter",
                    Parameters::new().with(">id", ResultReference::new(first).key("orders").index(49).key("id")),
                ),
            )
            .unwrap();

        let result = client.execute(&batch).await.unwrap();

        let second = result.get("cmd_1").unwrap().data.clone().unwrap();
        assert_eq!(second["orders"].as_array().unwrap().len(), 30);
        assert_eq!(portal.physical_calls(), 1);
    }
}
