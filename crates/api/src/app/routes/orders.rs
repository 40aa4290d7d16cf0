use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use storecore_auth::Permission;
use storecore_catalog::ProductId;
use storecore_core::AggregateId;
use storecore_infra::checkout::CheckoutLine;
use storecore_infra::streams::ORDER_AGGREGATE;
use storecore_orders::{AdvanceStatus, CustomerInfo, Order, OrderCommand, OrderId};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Public checkout: place an order, decrementing stock atomically.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    let mut lines = Vec::with_capacity(body.items.len());
    for line in body.items {
        let agg: AggregateId = match line.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid product id",
                );
            }
        };
        lines.push(CheckoutLine {
            product_id: ProductId::new(agg),
            quantity: line.quantity,
        });
    }

    let customer = CustomerInfo {
        name: body.customer_name,
        email: body.customer_email,
        phone: body.customer_phone,
    };

    match services
        .checkout
        .place_order(customer, body.payment_method, &lines)
    {
        Ok(placed) => {
            (StatusCode::CREATED, Json(dto::placed_order_to_json(placed))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    match services.orders.get(&OrderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

/// Admin: advance the fulfillment status by exactly one step.
pub async fn advance_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let order_id = OrderId::new(agg);

    let cmd = OrderCommand::AdvanceStatus(AdvanceStatus {
        order_id,
        new_status: body.status,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("orders.status.update")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatcher.dispatch(
        agg,
        ORDER_AGGREGATE,
        cmd_auth.inner,
        |id| Order::empty(OrderId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "status": body.status.as_str(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
