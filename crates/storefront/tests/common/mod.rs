//! In-process fake of the backend REST API and chat service.
//!
//! Each test spawns its own backend on an ephemeral port, so tests can run in
//! parallel and inspect what the storefront sent.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use shopfront_core::CurrencyCode;
use shopfront_storefront::api::ApiClient;
use shopfront_storefront::api::retry::RetryPolicy;
use shopfront_storefront::config::{BackendConfig, StorefrontConfig};
use shopfront_storefront::state::AppState;

/// Bearer token the fake user service hands out to customers.
pub const CUSTOMER_TOKEN: &str = "customer-token";
/// Bearer token the fake user service hands out to admins.
pub const ADMIN_TOKEN: &str = "admin-token";

/// Recorded backend state.
#[derive(Default)]
pub struct Backend {
    /// Server-side cart per bearer token.
    pub carts: Mutex<HashMap<String, Value>>,
    /// Orders created through `POST /orders`.
    pub orders: Mutex<Vec<Value>>,
    /// How many `GET /products` calls reached the backend.
    pub product_list_calls: AtomicU32,
    /// How many `GET /cart` calls reached the backend.
    pub cart_get_calls: AtomicU32,
    /// Answer this many `GET /cart` calls with `503` before succeeding.
    pub cart_get_failures: AtomicU32,
    /// How many `PUT /cart` calls reached the backend.
    pub cart_put_calls: AtomicU32,
    /// Answer this many `PUT /cart` calls with `503` before succeeding.
    pub cart_put_failures: AtomicU32,
    /// Reply the chat service streams for every message.
    pub chat_reply: Mutex<String>,
    /// Chat sessions the fake chat service knows about.
    pub chat_sessions: Mutex<Vec<String>>,
}

impl Backend {
    pub fn cart_for(&self, token: &str) -> Option<Value> {
        self.carts.lock().unwrap().get(token).cloned()
    }

    pub fn set_cart(&self, token: &str, cart: Value) {
        self.carts.lock().unwrap().insert(token.to_string(), cart);
    }
}

/// A running fake backend.
pub struct TestBackend {
    pub url: String,
    pub state: Arc<Backend>,
}

impl TestBackend {
    /// Start a fake backend on an ephemeral port.
    pub async fn spawn() -> Self {
        let state = Arc::new(Backend::default());
        *state.chat_reply.lock().unwrap() = concat!(
            "data: {\"type\":\"delta\",\"content\":\"Xin \"}\n\n",
            ": keep-alive\n\n",
            "data: {\"type\":\"delta\",\"content\":\"chào!\"}\n\n",
            "data: [DONE]\n\n",
        )
        .to_string();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/api"),
            state,
        }
    }

    /// Backend configuration pointing at this fake.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::for_url(&self.url).unwrap()
    }

    /// A REST client for this fake.
    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.backend_config(), CurrencyCode::VND).unwrap()
    }

    /// Full storefront state against this fake, with fast cart retries.
    pub fn app_state(&self) -> AppState {
        let mut config = StorefrontConfig::for_backend(&self.url).unwrap();
        config.cart_sync_retry = RetryPolicy::new(3, std::time::Duration::from_millis(5));
        AppState::new(config).unwrap()
    }
}

fn product(id: &str) -> Option<Value> {
    match id {
        "p1" => Some(json!({
            "_id": "p1",
            "name": "Áo thun",
            "price": 100_000,
            "originalPrice": 120_000,
            "images": ["/img/p1.jpg"],
            "categoryId": "c1",
            "stock": 10,
        })),
        "p2" => Some(json!({
            "_id": "p2",
            "name": "Quần jean",
            "price": "250000",
            "images": [],
            "stock": 0,
        })),
        _ => None,
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(ToString::to_string)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired"}))).into_response()
}

fn router(state: Arc<Backend>) -> Router {
    let api = Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/categories", get(list_categories))
        .route("/categories/{id}/products", get(category_products))
        .route("/coupons/validate", post(validate_coupon))
        .route("/cart", get(get_cart).put(put_cart).delete(delete_cart))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/users/me", get(me))
        .route("/orders", post(create_order))
        .route("/orders/me", get(my_orders))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/orders", get(admin_orders))
        .route("/chat/sessions", post(create_chat_session))
        .route("/chat/sessions/{id}/messages", get(chat_history))
        .route("/chat/sessions/{id}/stream", post(chat_stream));

    Router::new().nest("/api", api).with_state(state)
}

async fn list_products(State(state): State<Arc<Backend>>) -> Json<Value> {
    state.product_list_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "success": true,
        "message": "ok",
        "data": {
            "products": [product("p1"), product("p2")],
            "page": 1,
            "totalPages": 1,
            "total": 2,
        },
    }))
}

async fn get_product(Path(id): Path<String>) -> Response {
    product(&id).map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({"message": "Product not found"}))).into_response(),
        |p| Json(p).into_response(),
    )
}

async fn list_categories() -> Json<Value> {
    Json(json!([{"_id": "c1", "name": "Áo", "description": "Áo thun, áo sơ mi"}]))
}

async fn category_products() -> Json<Value> {
    Json(json!({"items": [product("p1")], "page": 1, "totalPages": 1}))
}

async fn validate_coupon(Json(body): Json<Value>) -> Response {
    match body["code"].as_str() {
        Some("SALE10") => Json(json!({
            "valid": true,
            "code": "SALE10",
            "discountPercent": 10,
        }))
        .into_response(),
        Some("BIG100") if body["subtotal"].as_f64().unwrap_or(0.0) < 1_000_000.0 => Json(json!({
            "valid": false,
            "code": "BIG100",
            "message": "Minimum order is 1.000.000₫",
        }))
        .into_response(),
        Some("BIG100") => Json(json!({
            "valid": true,
            "code": "BIG100",
            "discountPercent": 15,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Coupon expired"})),
        )
            .into_response(),
    }
}

async fn get_cart(State(state): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer(&headers) else {
        return unauthorized();
    };
    state.cart_get_calls.fetch_add(1, Ordering::SeqCst);

    let remaining = state.cart_get_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        state.cart_get_failures.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "cart store warming up").into_response();
    }

    state.cart_for(&token).map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({"message": "No cart"}))).into_response(),
        |cart| Json(json!({"success": true, "data": cart})).into_response(),
    )
}

async fn put_cart(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(cart): Json<Value>,
) -> Response {
    let Some(token) = bearer(&headers) else {
        return unauthorized();
    };
    state.cart_put_calls.fetch_add(1, Ordering::SeqCst);

    let remaining = state.cart_put_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        state.cart_put_failures.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "cart store warming up").into_response();
    }

    state.set_cart(&token, cart.clone());
    Json(json!({"success": true, "data": cart})).into_response()
}

async fn delete_cart(State(state): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer(&headers) else {
        return unauthorized();
    };
    state.carts.lock().unwrap().remove(&token);
    StatusCode::NO_CONTENT.into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if body["password"].as_str() != Some("correct horse") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"})))
            .into_response();
    }

    // Accounts created outside the storefront may carry intranet addresses.
    let profile_email = if email.starts_with("local") {
        "local@localhost"
    } else {
        email
    };
    let (id, token, role) = if email.starts_with("admin") {
        ("u-admin", ADMIN_TOKEN, "admin")
    } else {
        ("u-1", CUSTOMER_TOKEN, "customer")
    };
    Json(json!({
        "success": true,
        "data": {
            "accessToken": token,
            "user": {"_id": id, "name": "Lan", "email": profile_email, "role": role},
        },
    }))
    .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@example.com" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "Email already registered"})),
        )
            .into_response();
    }
    Json(json!({
        "token": CUSTOMER_TOKEN,
        "user": {"id": "u-2", "name": body["name"], "email": email},
    }))
    .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    match bearer(&headers).as_deref() {
        Some(CUSTOMER_TOKEN) => Json(json!({
            "_id": "u-1",
            "name": "Lan",
            "email": "lan@example.com",
            "role": "customer",
        }))
        .into_response(),
        _ => unauthorized(),
    }
}

async fn create_order(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    let mut orders = state.orders.lock().unwrap();
    let id = format!("o{}", orders.len() + 1);
    orders.push(body.clone());

    let mut order = body;
    order["_id"] = json!(id);
    order["status"] = json!("pending");
    order["createdAt"] = json!("2024-05-01T08:30:00Z");
    if order["paymentMethod"] == "vnpay" {
        order["paymentUrl"] = json!(format!("https://pay.example.vn/{id}"));
    }
    Json(order)
}

async fn my_orders(headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    Json(json!([])).into_response()
}

async fn admin_stats(headers: HeaderMap) -> Response {
    if bearer(&headers).as_deref() != Some(ADMIN_TOKEN) {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Admins only"}))).into_response();
    }
    Json(json!({"totalRevenue": 1_500_000, "totalOrders": 3})).into_response()
}

async fn admin_orders(headers: HeaderMap) -> Response {
    if bearer(&headers).as_deref() != Some(ADMIN_TOKEN) {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Admins only"}))).into_response();
    }
    Json(json!({
        "orders": [{
            "_id": "o7",
            "recipient": {"name": "Trần Thị Lan", "phone": "0912345678", "address": "12 Nguyễn Huệ"},
            "items": [{"productId": "p1", "name": "Áo thun", "price": 100000, "quantity": 1}],
            "paymentMethod": "cod",
            "status": "pending",
            "subtotal": 100000,
            "total": 100000,
            "createdAt": "2024-05-01T08:30:00Z",
        }],
        "page": 1,
        "totalPages": 1,
    }))
    .into_response()
}

async fn create_chat_session(State(state): State<Arc<Backend>>) -> Json<Value> {
    let mut sessions = state.chat_sessions.lock().unwrap();
    let id = format!("chat-{}", sessions.len() + 1);
    sessions.push(id.clone());
    Json(json!({"success": true, "data": {"sessionId": id}}))
}

async fn chat_history(State(state): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    if !state.chat_sessions.lock().unwrap().contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Session not found"})))
            .into_response();
    }
    Json(json!([
        {"role": "user", "content": "Shop mở cửa mấy giờ?"},
        {"role": "assistant", "content": "Từ 8h đến 22h."},
    ]))
    .into_response()
}

async fn chat_stream(State(state): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    if !state.chat_sessions.lock().unwrap().contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Session not found"})))
            .into_response();
    }
    let body = state.chat_reply.lock().unwrap().clone();
    ([("content-type", "text/event-stream")], body).into_response()
}
