use axum::{
    Router,
    routing::{get, post},
};

pub mod common;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod system;

/// Router for the public storefront endpoints (no authentication).
pub fn public_router() -> Router {
    Router::new()
        .route("/products", get(products::list_products))
        .route("/products/:id", get(products::get_product))
        .route("/orders", post(orders::place_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/payments/verify", post(payments::verify_payment))
}

/// Router for the authenticated admin endpoints.
pub fn admin_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/products", post(products::create_product))
        .route("/products/:id/price", post(products::change_price))
        .route("/products/:id/deactivate", post(products::deactivate_product))
        .route("/products/:id/activate", post(products::activate_product))
        .route("/orders/:id/status", post(orders::advance_status))
        .route("/inventory", get(inventory::overview))
        .route("/inventory/low-stock", get(inventory::low_stock))
        .route("/inventory/logs", get(inventory::logs))
        .route("/inventory/adjust", post(inventory::adjust_stock))
}
