// tests/common/mod.rs
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use storefront_client::{ClientConfig, MemoryStorage, ShopSession};
use tower_http::trace::TraceLayer;

pub const INITIAL_TOKEN: &str = "initial-access-token-0123456789";

/// State of the fake storefront backend, inspectable from tests.
#[derive(Default)]
pub struct Backend {
    pub refresh_calls: AtomicUsize,
    pub wishlist_clears: AtomicUsize,
    pub cart_posts: AtomicUsize,
    pub status_updates: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub fail_quantity_updates: AtomicBool,
    pub last_cart_content_type: Mutex<Option<String>>,
    valid_token: RwLock<String>,
    generation: AtomicUsize,
    cart: Mutex<Vec<Value>>,
    wishlist: Mutex<Vec<i64>>,
    orders: Mutex<Vec<Value>>,
}

impl Backend {
    pub fn valid_token(&self) -> String { self.valid_token.read().unwrap().clone() }

    /// Invalidates the current access token. The refresh endpoint hands out
    /// the replacement.
    pub fn expire_token(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.valid_token.write().unwrap() = format!("refreshed-access-token-{:04}-abcdef", generation);
    }

    pub fn seed_wishlist(&self, ids: &[i64]) { *self.wishlist.lock().unwrap() = ids.to_vec(); }
    pub fn wishlist_ids(&self) -> Vec<i64> { self.wishlist.lock().unwrap().clone() }
    pub fn cart_items(&self) -> Vec<Value> { self.cart.lock().unwrap().clone() }
    pub fn order_status(&self, id: i64) -> Option<Value> {
        self.orders.lock().unwrap().iter().find(|o| o["id"] == id).map(|o| o["status"].clone())
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_token());
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
    }
}

pub struct MockServer {
    pub url: String,
    pub backend: Arc<Backend>,
}

impl MockServer {
    pub fn config(&self) -> ClientConfig { ClientConfig::new(&self.url) }

    /// A session with fresh in-memory storage, not logged in.
    pub fn guest_session(&self) -> ShopSession {
        ShopSession::with_storage(&self.config(), Arc::new(MemoryStorage::new())).unwrap()
    }

    /// A session logged in with the backend's current token.
    pub async fn session(&self) -> ShopSession {
        let session = self.guest_session();
        session.login(&self.backend.valid_token(), Some(json!({"email": "shopper@example.com"}))).await.unwrap();
        session
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("storefront_client=debug,tower_http=debug").with_test_writer().try_init();
}

pub async fn spawn() -> MockServer {
    init_tracing();
    let backend = Arc::new(Backend::default());
    *backend.valid_token.write().unwrap() = INITIAL_TOKEN.to_string();
    *backend.orders.lock().unwrap() = vec![
        json!({"id": 1, "orderNumber": "100001", "customerId": 7, "status": 4, "totalAmount": 300, "createdAt": "2024-05-01T10:00:00"}),
        json!({"id": 2, "orderNumber": "100002", "customerId": 7, "status": 0, "totalAmount": 120.5, "createdAt": "2024-05-02T08:30:00Z"}),
        json!({"id": 55, "orderNumber": null, "customerId": 9, "status": 2, "totalAmount": 80, "createdAt": null}),
    ];

    let app = Router::new()
        .route("/api/Account/refresh-token", get(refresh))
        .route("/api/Cart", get(get_cart))
        .route("/api/Cart/items", post(add_cart_item))
        .route("/api/Cart/items/:product/:variant", put(update_cart_item).delete(remove_cart_item))
        .route("/api/Cart/clear", delete(clear_cart))
        .route("/api/Cart/checkout", post(checkout))
        .route("/api/Products", get(list_products))
        .route("/api/Products/:id/Variants", get(list_variants))
        .route("/api/Wishlist", get(list_wishlist).delete(clear_wishlist))
        .route("/api/Wishlist/:id", get(wishlist_contains).post(add_wishlist).delete(remove_wishlist))
        .route("/api/Order", get(list_orders))
        .route("/api/Order/number/:number", get(order_by_number))
        .route("/api/Order/:id", get(order_by_id))
        .route("/api/Order/:id/status", put(update_order_status))
        .layer(TraceLayer::new_for_http())
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    MockServer { url, backend }
}

type Shared = State<Arc<Backend>>;

fn ok(data: Value) -> Response {
    Json(json!({"responseBody": {"data": data, "message": "Success"}})).into_response()
}

fn ok_page(data: Value, total: usize) -> Response {
    Json(json!({"responseBody": {"data": data, "message": "Success", "totalCount": total}})).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"responseBody": {"data": null, "message": message}}))).into_response()
}

fn unauthorized() -> Response { fail(StatusCode::UNAUTHORIZED, "Unauthorized") }

macro_rules! require_auth {
    ($backend:expr, $headers:expr) => {
        if !$backend.authorized(&$headers) {
            return unauthorized();
        }
    };
}

async fn refresh(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    if headers.contains_key(header::AUTHORIZATION) {
        return fail(StatusCode::BAD_REQUEST, "refresh must not carry a bearer token");
    }
    if backend.refresh_fails.load(Ordering::SeqCst) {
        return unauthorized();
    }
    Json(json!({"responseBody": {"data": {"accessToken": backend.valid_token()}, "message": "Token refreshed"}})).into_response()
}

fn variants_for(product_id: i64) -> Value {
    if product_id == 99 {
        return json!([]);
    }
    json!([
        {"id": product_id * 10 + 1, "size": "M", "color": "Black", "quantity": 5},
        {"id": product_id * 10 + 2, "size": "L", "color": "Black", "quantity": 0},
        {"id": product_id * 10 + 3, "size": 40, "color": "White", "quantity": 3}
    ])
}

async fn get_cart(State(backend): Shared, headers: HeaderMap) -> Response {
    require_auth!(backend, headers);
    ok(json!({"id": 1, "items": backend.cart_items()}))
}

async fn add_cart_item(State(backend): Shared, headers: HeaderMap, body: Bytes) -> Response {
    require_auth!(backend, headers);
    backend.cart_posts.fetch_add(1, Ordering::SeqCst);
    *backend.last_cart_content_type.lock().unwrap() =
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return fail(StatusCode::BAD_REQUEST, "Invalid body");
    };
    let product_id = body["productId"].as_i64().unwrap_or_default();
    let variant_id = body["productVariantId"].as_i64().unwrap_or_default();
    let Some(variant) = variants_for(product_id).as_array().and_then(|vs| vs.iter().find(|v| v["id"] == variant_id).cloned()) else {
        return fail(StatusCode::NOT_FOUND, "Variant not found");
    };
    backend.cart.lock().unwrap().push(json!({
        "productId": product_id,
        "productVariantId": variant_id,
        "quantity": body["quantity"],
        "productVariant": {"id": variant_id, "size": variant["size"], "color": variant["color"]}
    }));
    (StatusCode::OK, Json(json!({"responseBody": {"data": null, "message": "Item added to cart"}}))).into_response()
}

async fn update_cart_item(State(backend): Shared, headers: HeaderMap, Path((product, variant)): Path<(i64, i64)>, Json(body): Json<Value>) -> Response {
    require_auth!(backend, headers);
    if backend.fail_quantity_updates.load(Ordering::SeqCst) {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "Quantity update failed");
    }
    let mut cart = backend.cart.lock().unwrap();
    match cart.iter_mut().find(|i| i["productId"] == product && i["productVariantId"] == variant) {
        Some(item) => {
            item["quantity"] = body["quantity"].clone();
            ok(Value::Null)
        }
        None => fail(StatusCode::NOT_FOUND, "Cart item not found"),
    }
}

async fn remove_cart_item(State(backend): Shared, headers: HeaderMap, Path((product, variant)): Path<(i64, i64)>) -> Response {
    require_auth!(backend, headers);
    backend.cart.lock().unwrap().retain(|i| !(i["productId"] == product && i["productVariantId"] == variant));
    ok(Value::Null)
}

async fn clear_cart(State(backend): Shared, headers: HeaderMap) -> Response {
    require_auth!(backend, headers);
    backend.cart.lock().unwrap().clear();
    ok(Value::Null)
}

async fn checkout(State(backend): Shared, headers: HeaderMap) -> Response {
    require_auth!(backend, headers);
    let mut cart = backend.cart.lock().unwrap();
    if cart.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Cart is empty");
    }
    cart.clear();
    Json(json!({"responseBody": {"data": {"orderId": 77}, "message": "Order placed"}})).into_response()
}

async fn list_products(State(backend): Shared, headers: HeaderMap) -> Response {
    require_auth!(backend, headers);
    let products = json!([
        {"id": 1, "name": "Classic Tee", "price": 120, "finalPrice": 100, "images": [{"url": "tee.jpg"}]},
        {"id": 2, "name": "Canvas Cap", "price": 50, "finalPrice": 50},
        {"id": 3, "name": "Denim Jacket", "price": 400, "finalPrice": 320}
    ]);
    ok_page(products, 3)
}

async fn list_variants(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    require_auth!(backend, headers);
    ok(variants_for(id))
}

async fn list_wishlist(State(backend): Shared, headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    require_auth!(backend, headers);
    if params.get("pageSize").map(String::as_str) != Some("100") {
        return fail(StatusCode::BAD_REQUEST, "unexpected page size");
    }
    let items: Vec<Value> = backend
        .wishlist_ids()
        .into_iter()
        .map(|id| json!({"productId": id, "productName": format!("Product {}", id)}))
        .collect();
    ok(json!(items))
}

async fn clear_wishlist(State(backend): Shared, headers: HeaderMap) -> Response {
    require_auth!(backend, headers);
    backend.wishlist_clears.fetch_add(1, Ordering::SeqCst);
    backend.wishlist.lock().unwrap().clear();
    ok(Value::Null)
}

async fn wishlist_contains(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    require_auth!(backend, headers);
    ok(json!(backend.wishlist_ids().contains(&id)))
}

async fn add_wishlist(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    require_auth!(backend, headers);
    let mut wishlist = backend.wishlist.lock().unwrap();
    if wishlist.contains(&id) {
        return fail(StatusCode::CONFLICT, "Product already in wishlist");
    }
    wishlist.push(id);
    Json(json!({"responseBody": {"data": null, "message": "Added to wishlist"}})).into_response()
}

async fn remove_wishlist(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    require_auth!(backend, headers);
    let mut wishlist = backend.wishlist.lock().unwrap();
    if !wishlist.contains(&id) {
        return fail(StatusCode::NOT_FOUND, "Product not in wishlist");
    }
    wishlist.retain(|w| *w != id);
    ok(Value::Null)
}

async fn list_orders(State(backend): Shared, headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    require_auth!(backend, headers);
    let status = params.get("status").and_then(|s| s.parse::<i64>().ok());
    let orders: Vec<Value> = backend
        .orders
        .lock()
        .unwrap()
        .iter()
        .filter(|o| status.map_or(true, |s| o["status"] == s))
        .cloned()
        .collect();
    let total = orders.len();
    ok_page(json!(orders), total)
}

async fn order_by_number(State(backend): Shared, headers: HeaderMap, Path(number): Path<String>) -> Response {
    require_auth!(backend, headers);
    let found = backend.orders.lock().unwrap().iter().find(|o| o["orderNumber"] == number.as_str()).cloned();
    match found {
        Some(order) => ok(order),
        None => fail(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn order_by_id(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    require_auth!(backend, headers);
    let found = backend.orders.lock().unwrap().iter().find(|o| o["id"] == id).cloned();
    match found {
        Some(order) => ok(order),
        None => fail(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn update_order_status(State(backend): Shared, headers: HeaderMap, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    require_auth!(backend, headers);
    backend.status_updates.fetch_add(1, Ordering::SeqCst);
    let mut orders = backend.orders.lock().unwrap();
    match orders.iter_mut().find(|o| o["id"] == id) {
        Some(order) => {
            order["status"] = body["status"].clone();
            ok(order.clone())
        }
        None => fail(StatusCode::NOT_FOUND, "Order not found"),
    }
}
