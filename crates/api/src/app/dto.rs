use serde::Deserialize;

use storecore_infra::checkout::PlacedOrder;
use storecore_infra::projections::{InventoryLogEntry, OrderReadModel, ProductReadModel};
use storecore_inventory::AdjustmentReason;
use storecore_orders::{OrderStatus, PaymentMethod};

use crate::app::services::InventoryOverviewRow;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    /// Unit price in the smallest currency unit.
    pub price: u64,
    pub image_url: Option<String>,
    /// Opening stock level; defaults to zero.
    pub initial_stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePriceRequest {
    /// New unit price in the smallest currency unit.
    pub price: u64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub change_quantity: i64,
    /// Defaults to a manual correction.
    pub reason: Option<AdjustmentReason>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub success: bool,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub product_id: Option<String>,
    pub limit: Option<usize>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn product_to_json(rm: ProductReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.product_id.to_string(),
        "sku": rm.sku,
        "name": rm.name,
        "price": rm.price,
        "image_url": rm.image_url,
        "active": rm.active,
        "created_at": rm.created_at.to_rfc3339(),
    })
}

pub fn order_to_json(rm: OrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.to_string(),
        "customer": {
            "name": rm.customer.name,
            "email": rm.customer.email,
            "phone": rm.customer.phone,
        },
        "payment_method": rm.payment_method,
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "product_id": l.product_id.to_string(),
            "quantity": l.quantity,
            "unit_price": l.unit_price,
        })).collect::<Vec<_>>(),
        "total_amount": rm.total_amount,
        "status": rm.status.as_str(),
        "payment_status": rm.payment_status.as_str(),
        "provider_ref": rm.provider_ref,
        "placed_at": rm.placed_at.to_rfc3339(),
    })
}

pub fn placed_order_to_json(placed: PlacedOrder) -> serde_json::Value {
    serde_json::json!({
        "id": placed.order_id.to_string(),
        "customer": {
            "name": placed.customer.name,
            "email": placed.customer.email,
            "phone": placed.customer.phone,
        },
        "payment_method": placed.payment_method,
        "lines": placed.lines.into_iter().map(|l| serde_json::json!({
            "product_id": l.product_id.to_string(),
            "quantity": l.quantity,
            "unit_price": l.unit_price,
        })).collect::<Vec<_>>(),
        "total_amount": placed.total_amount,
        "status": placed.status.as_str(),
        "payment_status": placed.payment_status.as_str(),
        "placed_at": placed.placed_at.to_rfc3339(),
    })
}

pub fn overview_row_to_json(row: InventoryOverviewRow) -> serde_json::Value {
    serde_json::json!({
        "product_id": row.product.product_id.to_string(),
        "sku": row.product.sku,
        "name": row.product.name,
        "is_active": row.product.active,
        "stock_quantity": row.quantity,
        "low_stock": row.low_stock,
    })
}

pub fn log_entry_to_json(entry: InventoryLogEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.entry_id.to_string(),
        "product_id": entry.product_id.to_string(),
        "change_quantity": entry.change,
        "resulting_stock": entry.resulting_stock,
        "reason": entry.reason.as_str(),
        "order_id": entry.order_id.map(|id| id.to_string()),
        "occurred_at": entry.occurred_at.to_rfc3339(),
    })
}
