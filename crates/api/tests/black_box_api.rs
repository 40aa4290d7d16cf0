use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = storecore_api::app::build_app(jwt_secret.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(serde::Serialize)]
struct WireClaims {
    sub: Uuid,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

fn mint_jwt(jwt_secret: &str, roles: &[&str]) -> String {
    let now = Utc::now().timestamp();
    let claims = WireClaims {
        sub: Uuid::now_v7(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        iat: now,
        exp: now + 600,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// The API is intentionally eventual-consistent (command path vs projection
/// update). Poll briefly until the projection catches up.
async fn get_json_eventually(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    is_ready: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    for _ in 0..50 {
        let mut req = client.get(url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if is_ready(&body) {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("resource did not become visible in projection within timeout");
}

async fn create_product(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
    price: u64,
    initial_stock: i64,
) -> String {
    let res = client
        .post(format!("{}/products", base_url))
        .bearer_auth(token)
        .json(&json!({
            "sku": format!("SKU-{}", Uuid::now_v7()),
            "name": name,
            "price": price,
            "initial_stock": initial_stock,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn auth_required_for_admin_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, &["admin"]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn unauthorized_access_blocked_for_commands() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    // Not admin => permission mapping returns empty => forbidden for commands.
    let token = mint_jwt(jwt_secret, &["viewer"]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/products", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "sku": "SKU-1", "name": "Widget", "price": 100 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn storefront_checkout_and_payment_lifecycle() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product_id = create_product(&client, &srv.base_url, &token, "Trail Bottle", 1999, 10).await;

    // Product shows up on the public storefront once the projection catches up.
    let product = get_json_eventually(
        &client,
        &format!("{}/products/{}", srv.base_url, product_id),
        None,
        |body| body["active"].as_bool() == Some(true),
    )
    .await;
    assert_eq!(product["name"], "Trail Bottle");

    // Guest checkout.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "customer_name": "Amina Yusuf",
            "customer_email": "amina@example.com",
            "payment_method": "card",
            "items": [{ "product_id": product_id, "quantity": 2 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let placed: serde_json::Value = res.json().await.unwrap();
    let order_id = placed["id"].as_str().unwrap().to_string();
    assert_eq!(placed["total_amount"], 2 * 1999);
    assert_eq!(placed["status"], "new");
    assert_eq!(placed["payment_status"], "pending");

    // The order becomes queryable once its projection catches up.
    let order = get_json_eventually(
        &client,
        &format!("{}/orders/{}", srv.base_url, order_id),
        None,
        |body| body["total_amount"].is_u64(),
    )
    .await;
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);
    assert_eq!(order["lines"][0]["unit_price"], 1999);

    // Stock events are published before the order event, so once the order
    // is visible the decrement is too.
    let res = client
        .get(format!("{}/inventory", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let row = body
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["product_id"] == product_id)
        .expect("product missing from overview")
        .clone();
    assert_eq!(row["stock_quantity"], 8);

    let res = client
        .get(format!(
            "{}/inventory/logs?product_id={}",
            srv.base_url, product_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["change_quantity"], -2);
    assert_eq!(entries[0]["reason"], "order");
    assert_eq!(entries[0]["order_id"], order_id);
}

#[tokio::test]
async fn payment_verification_is_idempotent() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product_id = create_product(&client, &srv.base_url, &token, "Camp Lamp", 4500, 5).await;
    get_json_eventually(
        &client,
        &format!("{}/products/{}", srv.base_url, product_id),
        None,
        |_| true,
    )
    .await;

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "customer_name": "Amina Yusuf",
            "customer_email": "amina@example.com",
            "payment_method": "card",
            "items": [{ "product_id": product_id, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let placed: serde_json::Value = res.json().await.unwrap();
    let order_id = placed["id"].as_str().unwrap().to_string();

    // First verification settles the payment and confirms the order.
    let res = client
        .post(format!("{}/payments/verify", srv.base_url))
        .json(&json!({ "order_id": order_id, "success": true, "provider_ref": "txn-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["events_committed"], 2);

    let order = get_json_eventually(
        &client,
        &format!("{}/orders/{}", srv.base_url, order_id),
        None,
        |body| body["payment_status"] == "paid",
    )
    .await;
    assert_eq!(order["status"], "confirmed");

    // Repeating the same outcome is a no-op.
    let res = client
        .post(format!("{}/payments/verify", srv.base_url))
        .json(&json!({ "order_id": order_id, "success": true, "provider_ref": "txn-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["events_committed"], 0);

    // Contradicting a settled payment is a conflict.
    let res = client
        .post(format!("{}/payments/verify", srv.base_url))
        .json(&json!({ "order_id": order_id, "success": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn overselling_is_rejected_without_partial_decrements() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product_id = create_product(&client, &srv.base_url, &token, "Trail Bottle", 1999, 1).await;
    get_json_eventually(
        &client,
        &format!("{}/products/{}", srv.base_url, product_id),
        None,
        |_| true,
    )
    .await;

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "customer_name": "Amina Yusuf",
            "customer_email": "amina@example.com",
            "payment_method": "cod",
            "items": [{ "product_id": product_id, "quantity": 3 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    // Stock is untouched.
    let logs = client
        .get(format!("{}/inventory/logs", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(logs.status(), StatusCode::OK);
    let body: serde_json::Value = logs.json().await.unwrap();
    assert_eq!(body["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn low_stock_report_flags_depleted_active_products() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let depleted = create_product(&client, &srv.base_url, &token, "Trail Bottle", 1999, 2).await;
    let healthy = create_product(&client, &srv.base_url, &token, "Camp Lamp", 4500, 40).await;
    // Wait for the healthy product's stock level to land so it cannot be
    // mistaken for depleted while its projection lags.
    get_json_eventually(
        &client,
        &format!("{}/inventory", srv.base_url),
        Some(&token),
        |body| {
            body.as_array()
                .map(|items| {
                    items
                        .iter()
                        .any(|i| i["product_id"] == healthy.as_str() && i["stock_quantity"] == 40)
                })
                .unwrap_or(false)
        },
    )
    .await;

    let res = client
        .get(format!("{}/inventory/low-stock?threshold=5", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], depleted);
    assert_eq!(items[0]["low_stock"], true);
}

#[tokio::test]
async fn deactivated_products_are_excluded_and_unorderable() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let active_low = create_product(&client, &srv.base_url, &token, "Trail Bottle", 1999, 3).await;
    let retired = create_product(&client, &srv.base_url, &token, "Camp Stool", 3200, 1).await;

    let res = client
        .post(format!("{}/products/{}/deactivate", srv.base_url, retired))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["active"], false);
    assert_eq!(body["events_committed"], 1);

    // Wait for the deactivation to land in the catalog projection.
    get_json_eventually(
        &client,
        &format!("{}/inventory", srv.base_url),
        Some(&token),
        |body| {
            body.as_array()
                .map(|items| {
                    items
                        .iter()
                        .any(|i| i["product_id"] == retired.as_str() && i["is_active"] == false)
                })
                .unwrap_or(false)
        },
    )
    .await;

    // Only the active product counts as low stock, even though the
    // deactivated one sits below the threshold too.
    let res = client
        .get(format!("{}/inventory/low-stock?threshold=5", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], active_low);

    // The deactivated product also dropped off the public storefront.
    let res = client
        .get(format!("{}/products", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(
        !body["products"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == retired.as_str())
    );

    // Checkout reads the product stream directly, so the rejection does
    // not depend on the projection.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "customer_name": "Amina Yusuf",
            "customer_email": "amina@example.com",
            "payment_method": "card",
            "items": [{ "product_id": retired, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Reactivation puts it back on sale.
    let res = client
        .post(format!("{}/products/{}/activate", srv.base_url, retired))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "customer_name": "Amina Yusuf",
            "customer_email": "amina@example.com",
            "payment_method": "card",
            "items": [{ "product_id": retired, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn manual_adjustment_shows_up_in_the_ledger() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product_id = create_product(&client, &srv.base_url, &token, "Trail Bottle", 1999, 0).await;

    let res = client
        .post(format!("{}/inventory/adjust", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": product_id,
            "change_quantity": 10,
            "reason": "restock",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["new_stock"], 10);
    assert_eq!(body["change"], 10);

    let logs = get_json_eventually(
        &client,
        &format!(
            "{}/inventory/logs?product_id={}",
            srv.base_url, product_id
        ),
        Some(&token),
        |body| !body["entries"].as_array().unwrap().is_empty(),
    )
    .await;
    let entries = logs["entries"].as_array().unwrap();
    assert_eq!(entries[0]["change_quantity"], 10);
    assert_eq!(entries[0]["resulting_stock"], 10);
    assert_eq!(entries[0]["reason"], "restock");

    // Zero deltas are rejected.
    let res = client
        .post(format!("{}/inventory/adjust", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": product_id,
            "change_quantity": 0,
            "reason": "manual",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The "order" reason belongs to checkout, not to manual adjustments.
    let res = client
        .post(format!("{}/inventory/adjust", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": product_id,
            "change_quantity": -1,
            "reason": "order",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}
