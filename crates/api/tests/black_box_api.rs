use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mercato_api::ApiConfig;
use mercato_auth::{JwtClaims, Permission, Role};
use mercato_core::{TenantId, UserId};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = mercato_api::app::build_app(ApiConfig::new(SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, role: &'static str, permissions: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        company_id: tenant_id,
        role: Role::new(role),
        permissions: permissions.iter().map(|p| Permission::new(*p)).collect(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn post(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

/// Product, warehouse and customer ready for ordering; returns their ids.
async fn seed_masters(server: &TestServer, client: &reqwest::Client, token: &str) -> (String, String, String) {
    let (status, product) = post(
        client,
        server.url("/products"),
        token,
        json!({ "sku": "wid-1", "name": "Widget", "default_price": 500 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");

    let (status, warehouse) = post(
        client,
        server.url("/warehouses"),
        token,
        json!({ "code": "main", "name": "Main" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{warehouse}");

    let (status, customer) = post(client, server.url("/customers"), token, json!({ "name": "Acme" })).await;
    assert_eq!(status, StatusCode::CREATED, "{customer}");

    let id = |v: &Value| v["data"]["id"].as_str().unwrap().to_string();
    (id(&product), id(&warehouse), id(&customer))
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let root = server.base_url.trim_end_matches("/api");
    let res = reqwest::get(format!("{root}/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let server = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .get(server.url("/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let server = TestServer::spawn().await;
    let claims = JwtClaims {
        sub: UserId::new(),
        company_id: TenantId::new(),
        role: Role::new("admin"),
        permissions: vec![],
        iat: Utc::now().timestamp(),
        exp: (Utc::now() + ChronoDuration::minutes(5)).timestamp(),
    };
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();

    let res = reqwest::Client::new()
        .get(server.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_the_token_tenant() {
    let server = TestServer::spawn().await;
    let tenant = TenantId::new();
    let token = mint_jwt(tenant, "clerk", &["products.read"]);

    let (status, body) = get(&reqwest::Client::new(), server.url("/whoami"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tenant_id"], tenant.to_string());
    assert_eq!(body["data"]["role"], "clerk");
    assert_eq!(body["data"]["permissions"], json!(["products.read"]));
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let server = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), "clerk", &["products.read"]);

    let (status, body) = post(
        &reqwest::Client::new(),
        server.url("/products"),
        &token,
        json!({ "sku": "a", "name": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("products.write"));
}

#[tokio::test]
async fn sales_order_reserves_then_delivery_issues_stock() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(TenantId::new(), "admin", &[]);
    let (product, warehouse, customer) = seed_masters(&server, &client, &token).await;

    let (status, body) = post(
        &client,
        server.url("/inventory/adjust"),
        &token,
        json!({
            "product_id": product,
            "warehouse_id": warehouse,
            "delta": 10,
            "reason": "opening count",
            "unit_cost": 200,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, order) = post(
        &client,
        server.url("/sales-order"),
        &token,
        json!({
            "customer_id": customer,
            "lines": [{ "product_id": product, "warehouse_id": warehouse, "quantity": 4 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert!(order["data"]["number"].as_str().unwrap().starts_with("SO-"));
    assert_eq!(order["data"]["status"], "open");
    assert_eq!(order["data"]["lines"][0]["unit_price"], 500);

    let row_url = server.url(&format!("/inventory/{product}/{warehouse}"));
    let (_, row) = get(&client, row_url.clone(), &token).await;
    assert_eq!(row["data"]["quantity"], 10);
    assert_eq!(row["data"]["committed"], 4);

    let order_id = order["data"]["id"].as_str().unwrap();
    let (status, delivered) = post(
        &client,
        server.url(&format!("/sales-order/{order_id}/deliver")),
        &token,
        json!({ "lines": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{delivered}");
    assert_eq!(delivered["data"]["status"], "delivered");

    let (_, row) = get(&client, row_url, &token).await;
    assert_eq!(row["data"]["quantity"], 6);
    assert_eq!(row["data"]["committed"], 0);

    let (status, movements) = get(
        &client,
        server.url(&format!("/stock-movements?item_id={product}")),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = movements["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["adjustment", "reservation", "issue"]);
    assert_eq!(movements["data"][2]["quantity"], -4);
}

#[tokio::test]
async fn insufficient_stock_is_a_bad_request_and_nothing_is_committed() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(TenantId::new(), "admin", &[]);
    let (product, warehouse, customer) = seed_masters(&server, &client, &token).await;

    let (status, body) = post(
        &client,
        server.url("/sales-order"),
        &token,
        json!({
            "customer_id": customer,
            "lines": [{ "product_id": product, "warehouse_id": warehouse, "quantity": 1 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, orders) = get(&client, server.url("/sales-order"), &token).await;
    assert_eq!(orders["data"], json!([]));
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(TenantId::new(), "admin", &[]);
    seed_masters(&server, &client, &token).await;

    let (status, body) = post(
        &client,
        server.url("/products"),
        &token,
        json!({ "sku": "WID-1", "name": "Widget again" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_bodies_and_ids_are_bad_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(TenantId::new(), "admin", &[]);

    let (status, body) = post(&client, server.url("/products"), &token, json!({ "name": 3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = get(&client, server.url("/sales-order/not-a-uuid"), &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token_a = mint_jwt(TenantId::new(), "admin", &[]);
    let token_b = mint_jwt(TenantId::new(), "admin", &[]);
    let (product, _, _) = seed_masters(&server, &client, &token_a).await;

    let (status, _) = get(&client, server.url(&format!("/products/{product}")), &token_b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = get(&client, server.url("/products"), &token_b).await;
    assert_eq!(listed["data"], json!([]));

    // Numbering and SKUs are per tenant.
    let (status, _) = post(
        &client,
        server.url("/products"),
        &token_b,
        json!({ "sku": "wid-1", "name": "Widget" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn deactivated_price_list_stops_resolving() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(TenantId::new(), "admin", &[]);
    let (product, _, _) = seed_masters(&server, &client, &token).await;

    let (status, list) = post(
        &client,
        server.url("/price-lists"),
        &token,
        json!({
            "name": "Wholesale",
            "currency": "INR",
            "entries": [{ "product_id": product, "unit_price": 450 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{list}");
    let list_id = list["data"]["id"].as_str().unwrap();

    let deactivate = server.url(&format!("/price-lists/{list_id}/deactivate"));
    let (status, body) = post(&client, deactivate.clone(), &token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["active"], false);

    let (status, body) = post(&client, deactivate, &token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}
