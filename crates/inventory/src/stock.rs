use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storecore_catalog::ProductId;
use storecore_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storecore_events::Event;

/// Why a stock level moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentReason {
    /// Decrement caused by a placed order (carries the order id).
    Order,
    /// Manual correction by an operator.
    Manual,
    /// Goods received back into stock.
    Restock,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::Order => "order",
            AdjustmentReason::Manual => "manual",
            AdjustmentReason::Restock => "restock",
        }
    }
}

impl core::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: StockLedger.
///
/// One stream per product; the stream shares the product's UUID and is
/// distinguished by aggregate type. `quantity` here is the fold of the
/// stream, so `initial + sum(deltas)` holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: ProductId,
    quantity: i64,
    version: u64,
    created: bool,
}

impl StockLedger {
    /// Create an empty, not-yet-initialized aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            quantity: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for StockLedger {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: InitializeStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: AdjustmentReason,
    pub order_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    InitializeStock(InitializeStock),
    AdjustStock(AdjustStock),
}

/// Event: StockInitialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInitialized {
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
///
/// `resulting_stock` is a denormalized snapshot of the post-adjustment
/// quantity, so ledger rows can show the level at write time without
/// replaying the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub delta: i64,
    pub resulting_stock: i64,
    pub reason: AdjustmentReason,
    pub order_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockInitialized(StockInitialized),
    StockAdjusted(StockAdjusted),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockInitialized(_) => "inventory.stock.initialized",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockInitialized(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockInitialized(e) => {
                self.id = e.product_id;
                self.quantity = e.quantity;
                self.created = true;
            }
            StockEvent::StockAdjusted(e) => {
                self.quantity += e.delta;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::InitializeStock(cmd) => self.handle_initialize(cmd),
            StockCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_initialize(&self, cmd: &InitializeStock) -> Result<Vec<StockEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock already initialized"));
        }
        if cmd.quantity < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(vec![StockEvent::StockInitialized(StockInitialized {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("change_quantity cannot be zero"));
        }

        match cmd.reason {
            AdjustmentReason::Order if cmd.order_id.is_none() => {
                return Err(DomainError::invariant(
                    "order adjustments must carry an order_id",
                ));
            }
            AdjustmentReason::Manual | AdjustmentReason::Restock if cmd.order_id.is_some() => {
                return Err(DomainError::invariant(
                    "only order adjustments may carry an order_id",
                ));
            }
            _ => {}
        }

        let resulting_stock = self.quantity + cmd.delta;
        if resulting_stock < 0 {
            return Err(DomainError::insufficient_stock(format!(
                "requested change {}, available {}",
                cmd.delta, self.quantity
            )));
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            delta: cmd.delta,
            resulting_stock,
            reason: cmd.reason,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn initialized(product_id: ProductId, quantity: i64) -> StockLedger {
        let mut ledger = StockLedger::empty(product_id);
        let events = ledger
            .handle(&StockCommand::InitializeStock(InitializeStock {
                product_id,
                quantity,
                occurred_at: test_time(),
            }))
            .unwrap();
        for event in &events {
            ledger.apply(event);
        }
        ledger
    }

    fn adjust(product_id: ProductId, delta: i64, reason: AdjustmentReason) -> StockCommand {
        StockCommand::AdjustStock(AdjustStock {
            product_id,
            delta,
            reason,
            order_id: if reason == AdjustmentReason::Order {
                Some(AggregateId::new())
            } else {
                None
            },
            occurred_at: test_time(),
        })
    }

    #[test]
    fn quantity_folds_from_adjustments() {
        let product_id = test_product_id();
        let mut ledger = initialized(product_id, 0);

        for (delta, reason) in [
            (10, AdjustmentReason::Restock),
            (-3, AdjustmentReason::Manual),
            (-2, AdjustmentReason::Order),
        ] {
            let events = ledger.handle(&adjust(product_id, delta, reason)).unwrap();
            for event in &events {
                ledger.apply(event);
            }
        }

        assert_eq!(ledger.quantity(), 5);
        assert_eq!(ledger.version(), 4);
    }

    #[test]
    fn adjusted_event_snapshots_resulting_stock() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 7);

        let events = ledger
            .handle(&adjust(product_id, -3, AdjustmentReason::Manual))
            .unwrap();
        match &events[0] {
            StockEvent::StockAdjusted(e) => {
                assert_eq!(e.delta, -3);
                assert_eq!(e.resulting_stock, 4);
                assert_eq!(e.reason, AdjustmentReason::Manual);
                assert!(e.order_id.is_none());
            }
            _ => panic!("Expected StockAdjusted event"),
        }
    }

    #[test]
    fn initialize_rejects_negative_quantity() {
        let product_id = test_product_id();
        let ledger = StockLedger::empty(product_id);

        let err = ledger
            .handle(&StockCommand::InitializeStock(InitializeStock {
                product_id,
                quantity: -1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn initialize_twice_is_a_conflict() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 3);

        let err = ledger
            .handle(&StockCommand::InitializeStock(InitializeStock {
                product_id,
                quantity: 3,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error"),
        }
    }

    #[test]
    fn adjust_on_unknown_product_is_not_found() {
        let product_id = test_product_id();
        let ledger = StockLedger::empty(product_id);

        let err = ledger
            .handle(&adjust(product_id, 5, AdjustmentReason::Manual))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn adjust_rejects_zero_delta() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 3);

        let err = ledger
            .handle(&adjust(product_id, 0, AdjustmentReason::Manual))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn overdraw_is_insufficient_stock_and_emits_nothing() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 2);

        let err = ledger
            .handle(&adjust(product_id, -5, AdjustmentReason::Manual))
            .unwrap_err();
        match err {
            DomainError::InsufficientStock(msg) => {
                assert!(msg.contains("available 2"), "message was: {msg}");
            }
            _ => panic!("Expected InsufficientStock error"),
        }

        // Failed command leaves the fold untouched.
        assert_eq!(ledger.quantity(), 2);
        assert_eq!(ledger.version(), 1);
    }

    #[test]
    fn order_adjustments_require_an_order_id() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 5);

        let err = ledger
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id,
                delta: -1,
                reason: AdjustmentReason::Order,
                order_id: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
    }

    #[test]
    fn manual_adjustments_reject_an_order_id() {
        let product_id = test_product_id();
        let ledger = initialized(product_id, 5);

        let err = ledger
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id,
                delta: 1,
                reason: AdjustmentReason::Manual,
                order_id: Some(AggregateId::new()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: quantity always equals initial + sum of applied
            /// deltas and never dips below zero, for any adjustment sequence.
            #[test]
            fn quantity_is_initial_plus_sum_of_applied_deltas(
                initial in 0i64..1000,
                deltas in proptest::collection::vec(-50i64..50, 0..40)
            ) {
                let product_id = test_product_id();
                let mut ledger = initialized(product_id, initial);
                let mut applied_sum = 0i64;

                for delta in deltas {
                    if delta == 0 {
                        continue;
                    }
                    match ledger.handle(&adjust(product_id, delta, AdjustmentReason::Manual)) {
                        Ok(events) => {
                            for event in &events {
                                ledger.apply(event);
                            }
                            applied_sum += delta;
                        }
                        Err(DomainError::InsufficientStock(_)) => {
                            // Rejected overdraws must leave state untouched.
                            prop_assert_eq!(ledger.quantity(), initial + applied_sum);
                        }
                        Err(other) => return Err(TestCaseError::fail(format!("{other:?}"))),
                    }

                    prop_assert!(ledger.quantity() >= 0);
                }

                prop_assert_eq!(ledger.quantity(), initial + applied_sum);
            }

            /// Property: handle is deterministic and never mutates state.
            #[test]
            fn handle_is_deterministic(
                initial in 0i64..1000,
                delta in -100i64..100
            ) {
                let product_id = test_product_id();
                let ledger = initialized(product_id, initial);
                let cmd = adjust(product_id, delta, AdjustmentReason::Manual);

                let state_before = ledger.clone();
                let result1 = ledger.handle(&cmd);
                let result2 = ledger.handle(&cmd);

                prop_assert_eq!(&state_before, &ledger);
                prop_assert_eq!(result1, result2);
            }

            /// Property: the resulting_stock snapshot always matches the fold
            /// after applying the event.
            #[test]
            fn resulting_stock_snapshot_matches_fold(
                initial in 0i64..1000,
                deltas in proptest::collection::vec(-50i64..50, 1..20)
            ) {
                let product_id = test_product_id();
                let mut ledger = initialized(product_id, initial);

                for delta in deltas {
                    if delta == 0 {
                        continue;
                    }
                    if let Ok(events) = ledger.handle(&adjust(product_id, delta, AdjustmentReason::Restock)) {
                        for event in &events {
                            ledger.apply(event);
                            match event {
                                StockEvent::StockAdjusted(e) => {
                                    prop_assert_eq!(e.resulting_stock, ledger.quantity());
                                }
                                _ => return Err(TestCaseError::fail("unexpected event")),
                            }
                        }
                    }
                }
            }
        }
    }
}
