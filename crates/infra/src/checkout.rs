//! Whole-order checkout orchestration.
//!
//! Placing an order touches several streams: the new order stream plus one
//! stock stream per distinct product. The command dispatcher handles one
//! stream at a time, so checkout gets its own orchestrator built from the
//! same pieces (load → rehydrate → handle → append → publish), with the
//! append going through [`EventStore::append_multi`] so every stream commits
//! or none does.
//!
//! Validation runs over *all* lines before anything is written: a rejected
//! line (unknown product, inactive product, bad quantity, not enough stock)
//! means no order stream is created and no stock stream is decremented.

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use storecore_catalog::{Product, ProductId};
use storecore_core::{Aggregate, AggregateId, ExpectedVersion};
use storecore_events::{EventBus, EventEnvelope};
use storecore_inventory::{AdjustStock, AdjustmentReason, StockCommand, StockLedger};
use storecore_orders::{
    CustomerInfo, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderStatus, PaymentMethod,
    PaymentStatus, PlaceOrder,
};

use crate::command_dispatcher::{DispatchError, apply_history, stream_version, validate_loaded_stream};
use crate::event_store::{EventStore, StreamBatch, UncommittedEvent};
use crate::streams::{ORDER_AGGREGATE, PRODUCT_AGGREGATE, STOCK_AGGREGATE};

/// One requested line of a checkout, before price snapshotting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// The order as committed, for the caller's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_amount: u64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub placed_at: chrono::DateTime<Utc>,
}

/// Atomic order placement over the event store.
#[derive(Debug)]
pub struct CheckoutService<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CheckoutService<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> CheckoutService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Place an order: validate every line, snapshot unit prices, decrement
    /// each product's stock and create the order stream in one atomic append.
    ///
    /// A concurrent writer on any touched stock stream fails the whole
    /// checkout with `DispatchError::Concurrency`; the caller may retry.
    pub fn place_order(
        &self,
        customer: CustomerInfo,
        payment_method: PaymentMethod,
        lines: &[CheckoutLine],
    ) -> Result<PlacedOrder, DispatchError> {
        if lines.is_empty() {
            return Err(DispatchError::Validation(
                "order must have at least one line".to_string(),
            ));
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DispatchError::Validation(
                    "quantity must be positive".to_string(),
                ));
            }
            if lines[..idx].iter().any(|l| l.product_id == line.product_id) {
                return Err(DispatchError::Validation(format!(
                    "duplicate product {} in order",
                    line.product_id
                )));
            }
        }

        let order_id = OrderId::new(AggregateId::new());
        let now = Utc::now();

        // Validate lines against the catalog and decide stock decrements.
        // Nothing is written until every line has passed.
        let mut priced_lines = Vec::with_capacity(lines.len());
        let mut batches = Vec::with_capacity(lines.len() + 1);

        for line in lines {
            let product = self.load_product(line.product_id)?;
            if !product.can_be_sold() {
                return Err(DispatchError::Validation(format!(
                    "product {} is not available for sale",
                    line.product_id
                )));
            }

            priced_lines.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price(),
            });

            batches.push(self.decide_stock_decrement(line, order_id, now)?);
        }

        // Decide the order events against a fresh stream.
        let order = Order::empty(order_id);
        let order_events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                customer,
                payment_method,
                lines: priced_lines,
                occurred_at: now,
            }))
            .map_err(DispatchError::from)?;

        let placed = match order_events.first() {
            Some(OrderEvent::OrderPlaced(e)) => PlacedOrder {
                order_id,
                customer: e.customer.clone(),
                payment_method: e.payment_method,
                lines: e.lines.clone(),
                total_amount: e.total_amount,
                status: OrderStatus::New,
                payment_status: PaymentStatus::Pending,
                placed_at: e.occurred_at,
            },
            _ => {
                return Err(DispatchError::InvariantViolation(
                    "order placement decided no OrderPlaced event".to_string(),
                ));
            }
        };

        let order_uncommitted = order_events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(order_id.0, ORDER_AGGREGATE, Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;
        batches.push(StreamBatch {
            expected: ExpectedVersion::Exact(0),
            events: order_uncommitted,
        });

        // All streams commit together or not at all.
        let committed = self.store.append_multi(batches)?;

        // Publish after the append succeeded.
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(placed)
    }

    fn load_product(&self, product_id: ProductId) -> Result<Product, DispatchError> {
        let history = self.store.load_stream(product_id.0, PRODUCT_AGGREGATE)?;
        if history.is_empty() {
            return Err(DispatchError::NotFound);
        }
        validate_loaded_stream(product_id.0, &history)?;

        let mut product = Product::empty(product_id);
        apply_history::<Product>(&mut product, &history)?;
        Ok(product)
    }

    fn decide_stock_decrement(
        &self,
        line: &CheckoutLine,
        order_id: OrderId,
        now: chrono::DateTime<Utc>,
    ) -> Result<StreamBatch, DispatchError> {
        let history = self.store.load_stream(line.product_id.0, STOCK_AGGREGATE)?;
        validate_loaded_stream(line.product_id.0, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut ledger = StockLedger::empty(line.product_id);
        apply_history::<StockLedger>(&mut ledger, &history)?;

        let events = ledger
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id: line.product_id,
                delta: -line.quantity,
                reason: AdjustmentReason::Order,
                order_id: Some(order_id.0),
                occurred_at: now,
            }))
            .map_err(DispatchError::from)?;

        let uncommitted = events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    line.product_id.0,
                    STOCK_AGGREGATE,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StreamBatch {
            expected,
            events: uncommitted,
        })
    }
}
