use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storecore_events::EventEnvelope;
use storecore_orders::{
    CustomerInfo, OrderEvent, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable order read model: one row per order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_amount: u64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Orders projection over published order envelopes.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    /// List all orders, newest first.
    pub fn list(&self) -> Vec<OrderReadModel> {
        let mut orders = self.store.list();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_once(aggregate_id, envelope.sequence_number(), || {
                let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let order_id = match &event {
                    OrderEvent::OrderPlaced(e) => e.order_id,
                    OrderEvent::PaymentVerified(e) => e.order_id,
                    OrderEvent::OrderStatusChanged(e) => e.order_id,
                };
                if order_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event order_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    OrderEvent::OrderPlaced(e) => {
                        self.store.upsert(
                            e.order_id,
                            OrderReadModel {
                                order_id: e.order_id,
                                customer: e.customer,
                                payment_method: e.payment_method,
                                lines: e.lines,
                                total_amount: e.total_amount,
                                status: OrderStatus::New,
                                payment_status: PaymentStatus::Pending,
                                provider_ref: None,
                                placed_at: e.occurred_at,
                                updated_at: e.occurred_at,
                            },
                        );
                    }
                    OrderEvent::PaymentVerified(e) => {
                        if let Some(mut rm) = self.store.get(&e.order_id) {
                            rm.payment_status = if e.success {
                                PaymentStatus::Paid
                            } else {
                                PaymentStatus::Failed
                            };
                            rm.provider_ref = e.provider_ref;
                            rm.updated_at = e.occurred_at;
                            self.store.upsert(e.order_id, rm);
                        }
                    }
                    OrderEvent::OrderStatusChanged(e) => {
                        if let Some(mut rm) = self.store.get(&e.order_id) {
                            rm.status = e.to;
                            rm.updated_at = e.occurred_at;
                            self.store.upsert(e.order_id, rm);
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
