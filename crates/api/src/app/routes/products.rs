use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use storecore_auth::Permission;
use storecore_catalog::{
    ActivateProduct, ChangePrice, CreateProduct, DeactivateProduct, Product, ProductCommand,
    ProductId,
};
use storecore_core::AggregateId;
use storecore_infra::streams::{PRODUCT_AGGREGATE, STOCK_AGGREGATE};
use storecore_inventory::{InitializeStock, StockCommand, StockLedger};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Public storefront listing: active products only.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let products: Vec<_> = services
        .catalog
        .list_active()
        .into_iter()
        .map(dto::product_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "products": products }))).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    match services.catalog.get(&ProductId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::product_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

/// Admin: create a product and initialize its stock stream.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);
    let initial_stock = body.initial_stock.unwrap_or(0);

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        sku: body.sku,
        name: body.name,
        price: body.price,
        image_url: body.image_url,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("products.create")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatcher.dispatch(
        agg,
        PRODUCT_AGGREGATE,
        cmd_auth.inner,
        |id| Product::empty(ProductId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // The stock stream shares the product's UUID, keyed by aggregate type.
    if let Err(e) = services.dispatcher.dispatch(
        agg,
        STOCK_AGGREGATE,
        StockCommand::InitializeStock(InitializeStock {
            product_id,
            quantity: initial_stock,
            occurred_at: Utc::now(),
        }),
        |id| StockLedger::empty(ProductId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "initial_stock": initial_stock,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

/// Admin: take a product off the storefront. Its history and stock stay.
pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = |product_id| {
        ProductCommand::DeactivateProduct(DeactivateProduct {
            product_id,
            occurred_at: Utc::now(),
        })
    };
    set_product_lifecycle(&services, &principal, &id, cmd, false).await
}

/// Admin: put a previously deactivated product back on the storefront.
pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = |product_id| {
        ProductCommand::ActivateProduct(ActivateProduct {
            product_id,
            occurred_at: Utc::now(),
        })
    };
    set_product_lifecycle(&services, &principal, &id, cmd, true).await
}

async fn set_product_lifecycle(
    services: &AppServices,
    principal: &crate::context::PrincipalContext,
    raw_id: &str,
    cmd: impl FnOnce(ProductId) -> ProductCommand,
    active: bool,
) -> axum::response::Response {
    let agg: AggregateId = match raw_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let cmd_auth = CmdAuth {
        inner: cmd(ProductId::new(agg)),
        required: vec![Permission::new("products.update")],
    };

    if let Err(e) = crate::authz::authorize_command(principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatcher.dispatch(
        agg,
        PRODUCT_AGGREGATE,
        cmd_auth.inner,
        |id| Product::empty(ProductId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "active": active,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

/// Admin: reprice a product. Orders already placed keep their snapshots.
pub async fn change_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangePriceRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let cmd_auth = CmdAuth {
        inner: ProductCommand::ChangePrice(ChangePrice {
            product_id: ProductId::new(agg),
            price: body.price,
            occurred_at: Utc::now(),
        }),
        required: vec![Permission::new("products.update")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatcher.dispatch(
        agg,
        PRODUCT_AGGREGATE,
        cmd_auth.inner,
        |id| Product::empty(ProductId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "price": body.price,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
