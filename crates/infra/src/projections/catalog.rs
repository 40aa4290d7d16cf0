use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storecore_catalog::{ProductEvent, ProductId};
use storecore_events::EventEnvelope;

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable catalog read model: one row per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: u64,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Catalog projection over published product envelopes.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> CatalogProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    /// List all products, newest first.
    pub fn list(&self) -> Vec<ProductReadModel> {
        let mut products = self.store.list();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    }

    /// List products visible to the storefront.
    pub fn list_active(&self) -> Vec<ProductReadModel> {
        self.list().into_iter().filter(|p| p.active).collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_once(aggregate_id, envelope.sequence_number(), || {
                let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let product_id = match &event {
                    ProductEvent::ProductCreated(e) => e.product_id,
                    ProductEvent::PriceChanged(e) => e.product_id,
                    ProductEvent::ProductDeactivated(e) => e.product_id,
                    ProductEvent::ProductActivated(e) => e.product_id,
                };
                if product_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event product_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    ProductEvent::ProductCreated(e) => {
                        self.store.upsert(
                            e.product_id,
                            ProductReadModel {
                                product_id: e.product_id,
                                sku: e.sku,
                                name: e.name,
                                price: e.price,
                                image_url: e.image_url,
                                active: true,
                                created_at: e.occurred_at,
                            },
                        );
                    }
                    ProductEvent::PriceChanged(e) => {
                        if let Some(mut rm) = self.store.get(&e.product_id) {
                            rm.price = e.price;
                            self.store.upsert(e.product_id, rm);
                        }
                    }
                    ProductEvent::ProductDeactivated(e) => {
                        if let Some(mut rm) = self.store.get(&e.product_id) {
                            rm.active = false;
                            self.store.upsert(e.product_id, rm);
                        }
                    }
                    ProductEvent::ProductActivated(e) => {
                        if let Some(mut rm) = self.store.get(&e.product_id) {
                            rm.active = true;
                            self.store.upsert(e.product_id, rm);
                        }
                    }
                }

                Ok(())
            })
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
