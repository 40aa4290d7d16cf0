//! `storecore-inventory` — per-product stock ledger domain.
//!
//! Current stock is never stored as a mutable counter: it is the fold of an
//! append-only adjustment stream, one stream per product.

pub mod stock;

pub use stock::{
    AdjustStock, AdjustmentReason, InitializeStock, StockCommand, StockEvent, StockLedger,
};
