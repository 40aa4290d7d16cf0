//! Aggregate type identifiers shared by dispatchers, projections and the API.
//!
//! A product and its stock ledger share one UUID; the aggregate type keeps
//! their streams distinct.

pub const PRODUCT_AGGREGATE: &str = "catalog.product";
pub const STOCK_AGGREGATE: &str = "inventory.stock";
pub const ORDER_AGGREGATE: &str = "orders.order";
