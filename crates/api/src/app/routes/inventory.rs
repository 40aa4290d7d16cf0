use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use storecore_auth::Permission;
use storecore_catalog::ProductId;
use storecore_core::AggregateId;
use storecore_infra::streams::STOCK_AGGREGATE;
use storecore_inventory::{AdjustStock, AdjustmentReason, StockCommand, StockEvent, StockLedger};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

/// Admin: full stock overview (catalog joined with levels).
pub async fn overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<dto::ThresholdQuery>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require_permission(&principal, &Permission::new("inventory.read"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let rows: Vec<_> = services
        .inventory_overview(threshold)
        .into_iter()
        .map(dto::overview_row_to_json)
        .collect();

    (StatusCode::OK, Json(rows)).into_response()
}

/// Admin: active products at or below the threshold, lowest first.
pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<dto::ThresholdQuery>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require_permission(&principal, &Permission::new("inventory.read"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let rows: Vec<_> = services
        .low_stock(threshold)
        .into_iter()
        .map(dto::overview_row_to_json)
        .collect();

    (StatusCode::OK, Json(rows)).into_response()
}

/// Admin: adjustment history, newest first.
pub async fn logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<dto::LogsQuery>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require_permission(&principal, &Permission::new("inventory.read"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let product_id = match query.product_id {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(agg) => Some(ProductId::new(agg)),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid product id",
                );
            }
        },
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);

    let entries: Vec<_> = services
        .inventory_log
        .query(product_id, limit)
        .into_iter()
        .map(dto::log_entry_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "entries": entries })),
    )
        .into_response()
}

/// Admin: manual stock adjustment (manual correction or restock).
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };
    let product_id = ProductId::new(agg);

    let reason = body.reason.unwrap_or(AdjustmentReason::Manual);
    // The `order` reason is reserved for the checkout path.
    if reason == AdjustmentReason::Order {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "reason must be manual or restock",
        );
    }
    let cmd = StockCommand::AdjustStock(AdjustStock {
        product_id,
        delta: body.change_quantity,
        reason,
        order_id: None,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("inventory.adjust")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatcher.dispatch(
        agg,
        STOCK_AGGREGATE,
        cmd_auth.inner,
        |id| StockLedger::empty(ProductId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // Echo the post-adjustment level from the committed event.
    let new_stock = committed
        .last()
        .and_then(|e| serde_json::from_value::<StockEvent>(e.payload.clone()).ok())
        .and_then(|ev| match ev {
            StockEvent::StockAdjusted(adj) => Some(adj.resulting_stock),
            _ => None,
        });

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "product_id": agg.to_string(),
            "change": body.change_quantity,
            "new_stock": new_stock,
            "reason": reason.as_str(),
        })),
    )
        .into_response()
}
