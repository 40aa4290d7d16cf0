use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::RwLock;
use uuid::Uuid;

use storecore_catalog::ProductId;
use storecore_core::AggregateId;
use storecore_events::EventEnvelope;
use storecore_inventory::{AdjustmentReason, StockEvent};

use crate::projections::{ProjectionCursors, ProjectionError};

/// One row of the inventory adjustment history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLogEntry {
    pub entry_id: Uuid,
    pub product_id: ProductId,
    pub change: i64,
    /// Stock level right after this adjustment, snapshotted at write time.
    pub resulting_stock: i64,
    pub reason: AdjustmentReason,
    pub order_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Inventory log projection: the ordered adjustment history across all
/// products.
///
/// Initialization events set the baseline level but are not adjustments, so
/// they advance the cursor without producing a row. Entries append in
/// arrival order; queries return newest first.
#[derive(Debug, Default)]
pub struct InventoryLogProjection {
    entries: RwLock<Vec<InventoryLogEntry>>,
    cursors: ProjectionCursors,
}

impl InventoryLogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the log, newest first, optionally scoped to one product.
    pub fn query(&self, product_id: Option<ProductId>, limit: usize) -> Vec<InventoryLogEntry> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => return vec![],
        };

        entries
            .iter()
            .rev()
            .filter(|e| product_id.is_none_or(|p| e.product_id == p))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let event_id = envelope.event_id();

        self.cursors
            .apply_once(aggregate_id, envelope.sequence_number(), || {
                let event: StockEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let adjusted = match event {
                    StockEvent::StockInitialized(e) => {
                        if e.product_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event product_id does not match envelope aggregate_id"
                                    .to_string(),
                            ));
                        }
                        return Ok(());
                    }
                    StockEvent::StockAdjusted(e) => e,
                };

                if adjusted.product_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event product_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                if let Ok(mut entries) = self.entries.write() {
                    entries.push(InventoryLogEntry {
                        entry_id: event_id,
                        product_id: adjusted.product_id,
                        change: adjusted.delta,
                        resulting_stock: adjusted.resulting_stock,
                        reason: adjusted.reason,
                        order_id: adjusted.order_id,
                        occurred_at: adjusted.occurred_at,
                    });
                }

                Ok(())
            })
    }

    /// Rebuild the log from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
