use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use storecore_core::AggregateId;
use storecore_infra::streams::ORDER_AGGREGATE;
use storecore_orders::{Order, OrderCommand, OrderId, VerifyPayment};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Payment-provider callback: record the verification outcome.
///
/// Repeating the same outcome commits nothing (`events_committed: 0`);
/// contradicting a settled outcome is a 409.
pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VerifyPaymentRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match body.order_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let order_id = OrderId::new(agg);

    let success = body.success;
    let provider_ref = body.provider_ref.clone();
    let cmd = OrderCommand::VerifyPayment(VerifyPayment {
        order_id,
        success: body.success,
        provider_ref: body.provider_ref,
        occurred_at: Utc::now(),
    });

    let committed = match services
        .dispatcher
        .dispatch(agg, ORDER_AGGREGATE, cmd, |id| Order::empty(OrderId::new(id)))
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // An empty commit means the same outcome was already recorded, so the
    // requested outcome is the settled one either way.
    let payment_status = if success { "paid" } else { "failed" };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": agg.to_string(),
            "payment_status": payment_status,
            "provider_ref": provider_ref,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
