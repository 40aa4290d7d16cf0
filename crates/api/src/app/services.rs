//! Infrastructure wiring for the HTTP layer.
//!
//! One event store + bus pair feeds every projection through a single
//! subscriber thread that fans envelopes out by aggregate type. Handlers
//! write through the dispatcher/checkout service and read from the
//! projections, so the read side is eventually consistent with the
//! command path.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use storecore_catalog::ProductId;
use storecore_events::{EventBus, EventEnvelope, InMemoryEventBus};
use storecore_infra::{
    checkout::CheckoutService,
    command_dispatcher::CommandDispatcher,
    event_store::InMemoryEventStore,
    projections::{
        CatalogProjection, InventoryLogProjection, OrderReadModel, OrdersProjection,
        ProductReadModel, StockLevel, StockLevelsProjection,
    },
    read_model::InMemoryReadModelStore,
    streams::{ORDER_AGGREGATE, PRODUCT_AGGREGATE, STOCK_AGGREGATE},
};
use storecore_orders::OrderId;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Store = Arc<InMemoryEventStore>;

pub type AppDispatcher = CommandDispatcher<Store, Bus>;
pub type AppCheckout = CheckoutService<Store, Bus>;
pub type AppCatalogProjection =
    CatalogProjection<InMemoryReadModelStore<ProductId, ProductReadModel>>;
pub type AppStockLevelsProjection =
    StockLevelsProjection<InMemoryReadModelStore<ProductId, StockLevel>>;
pub type AppOrdersProjection = OrdersProjection<InMemoryReadModelStore<OrderId, OrderReadModel>>;

/// One row of the admin inventory overview (catalog joined with levels).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryOverviewRow {
    pub product: ProductReadModel,
    pub quantity: i64,
    pub low_stock: bool,
}

pub struct AppServices {
    pub dispatcher: AppDispatcher,
    pub checkout: AppCheckout,
    pub catalog: Arc<AppCatalogProjection>,
    pub stock_levels: Arc<AppStockLevelsProjection>,
    pub inventory_log: Arc<InventoryLogProjection>,
    pub orders: Arc<AppOrdersProjection>,
}

pub fn build_services() -> AppServices {
    // In-memory infra wiring (single-process deployment): store + bus +
    // projections.
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let catalog: Arc<AppCatalogProjection> =
        Arc::new(CatalogProjection::new(InMemoryReadModelStore::new()));
    let stock_levels: Arc<AppStockLevelsProjection> =
        Arc::new(StockLevelsProjection::new(InMemoryReadModelStore::new()));
    let inventory_log = Arc::new(InventoryLogProjection::new());
    let orders: Arc<AppOrdersProjection> =
        Arc::new(OrdersProjection::new(InMemoryReadModelStore::new()));

    // Subscribe BEFORE handing the bus to the write side so no published
    // event can be missed.
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    {
        let bus = bus.clone();
        let catalog = catalog.clone();
        let stock_levels = stock_levels.clone();
        let inventory_log = inventory_log.clone();
        let orders = orders.clone();
        std::thread::spawn(move || {
            let sub = bus.subscribe();
            let _ = ready_tx.send(());
            while let Ok(env) = sub.recv() {
                let result = match env.aggregate_type() {
                    PRODUCT_AGGREGATE => catalog.apply_envelope(&env),
                    STOCK_AGGREGATE => stock_levels
                        .apply_envelope(&env)
                        .and_then(|()| inventory_log.apply_envelope(&env)),
                    ORDER_AGGREGATE => orders.apply_envelope(&env),
                    other => {
                        tracing::warn!(aggregate_type = other, "unroutable envelope");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    tracing::error!(error = ?e, "failed to apply envelope to projection");
                }
            }
        });
    }
    let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

    AppServices {
        dispatcher: CommandDispatcher::new(store.clone(), bus.clone()),
        checkout: CheckoutService::new(store, bus),
        catalog,
        stock_levels,
        inventory_log,
        orders,
    }
}

impl AppServices {
    /// Catalog joined with stock levels; every product, flagged when an
    /// active product sits at or below `threshold`.
    pub fn inventory_overview(&self, threshold: i64) -> Vec<InventoryOverviewRow> {
        self.catalog
            .list()
            .into_iter()
            .map(|product| {
                let quantity = self
                    .stock_levels
                    .get(&product.product_id)
                    .map(|l| l.quantity)
                    .unwrap_or(0);
                InventoryOverviewRow {
                    low_stock: product.active && quantity <= threshold,
                    product,
                    quantity,
                }
            })
            .collect()
    }

    /// Active products at or below `threshold`, lowest quantity first.
    pub fn low_stock(&self, threshold: i64) -> Vec<InventoryOverviewRow> {
        let mut rows: Vec<_> = self
            .inventory_overview(threshold)
            .into_iter()
            .filter(|r| r.low_stock)
            .collect();
        rows.sort_by_key(|r| r.quantity);
        rows
    }
}
