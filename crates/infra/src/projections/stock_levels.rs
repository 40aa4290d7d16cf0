use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storecore_catalog::ProductId;
use storecore_events::EventEnvelope;
use storecore_inventory::StockEvent;

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable stock read model: current level per product.
///
/// The level is a materialized cache over the adjustment log; the log stays
/// the source of truth and this row can always be rebuilt from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// Stock levels projection over published stock envelopes.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<StockLevel> {
        self.store.get(product_id)
    }

    pub fn list(&self) -> Vec<StockLevel> {
        self.store.list()
    }

    /// Products at or below `threshold`, lowest first.
    ///
    /// Active-product filtering is the caller's concern; this projection
    /// only knows quantities.
    pub fn list_at_or_below(&self, threshold: i64) -> Vec<StockLevel> {
        let mut levels: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|l| l.quantity <= threshold)
            .collect();
        levels.sort_by_key(|l| l.quantity);
        levels
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_once(aggregate_id, envelope.sequence_number(), || {
                let event: StockEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let product_id = match &event {
                    StockEvent::StockInitialized(e) => e.product_id,
                    StockEvent::StockAdjusted(e) => e.product_id,
                };
                if product_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event product_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    StockEvent::StockInitialized(e) => {
                        self.store.upsert(
                            e.product_id,
                            StockLevel {
                                product_id: e.product_id,
                                quantity: e.quantity,
                                updated_at: e.occurred_at,
                            },
                        );
                    }
                    StockEvent::StockAdjusted(e) => {
                        // resulting_stock was snapshotted at decision time,
                        // so the row never drifts from the write side.
                        self.store.upsert(
                            e.product_id,
                            StockLevel {
                                product_id: e.product_id,
                                quantity: e.resulting_stock,
                                updated_at: e.occurred_at,
                            },
                        );
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
