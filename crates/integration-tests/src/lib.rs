//! Integration tests for the EcoMall client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ecomall-integration-tests
//! ```
//!
//! The tests need no external services: [`MockStore`] serves the store's
//! cart, wishlist, account and order endpoints from memory on an ephemeral
//! port, with the same status codes and payload shapes as the real backend.
//! The payment gateway is reduced to a deterministic signature, see
//! [`payment_signature`].
//!
//! # Test Categories
//!
//! - `remote_client` - HTTP client behaviour (status handling, payload parsing)
//! - `cart_sync` - Synchronizer and session against the mock store

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Timestamp reported on every row.
pub const ADDED_AT: &str = "2026-01-15T10:30:00Z";

#[derive(Debug, Clone)]
struct CatalogItem {
    name: String,
    image: String,
    price: String,
}

#[derive(Debug, Clone)]
struct Account {
    user_id: i32,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    mobile_number: Option<String>,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    order_id: i64,
    lines: Vec<(i64, i64)>,
    total: String,
    status: String,
    gateway_order: String,
}

#[derive(Debug, Clone)]
struct CartRecord {
    cart_id: i64,
    user: i32,
    item: i32,
    quantity: i64,
}

#[derive(Debug, Clone)]
struct WishlistRecord {
    wishlist_id: i64,
    user: i32,
    item: i32,
}

#[derive(Debug, Default)]
struct MockState {
    items: HashMap<i32, CatalogItem>,
    accounts: Vec<Account>,
    cart: Vec<CartRecord>,
    wishlist: Vec<WishlistRecord>,
    orders: Vec<OrderRecord>,
    next_id: i64,
    outage: bool,
    requests: Vec<String>,
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MockStore
// =============================================================================

/// In-process store backend listening on `127.0.0.1`.
///
/// The server task is aborted when the value is dropped.
pub struct MockStore {
    addr: SocketAddr,
    state: SharedState,
    server: JoinHandle<()>,
}

impl MockStore {
    /// Start a mock store on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn() -> Self {
        let state = SharedState::default();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock store");
        let addr = listener.local_addr().expect("Mock store has no address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL the client should be configured with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/EcoMall/", self.addr)
    }

    /// Add a product to the catalog. Rows for unknown products are rejected.
    pub fn add_item(&self, item: i32, name: &str, price: &str) {
        lock(&self.state).items.insert(
            item,
            CatalogItem {
                name: name.to_string(),
                image: format!("/media/items/{item}.jpg"),
                price: price.to_string(),
            },
        );
    }

    /// Register an account that can log in.
    pub fn add_account(&self, user_id: i32, email: &str, password: &str, first_name: &str) {
        lock(&self.state).accounts.push(Account {
            user_id,
            email: email.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            mobile_number: None,
        });
    }

    /// Insert a cart row directly, returning its ID.
    pub fn seed_cart_row(&self, user: i32, item: i32, quantity: i64) -> i64 {
        let mut state = lock(&self.state);
        let cart_id = next_id(&mut state);
        state.cart.push(CartRecord {
            cart_id,
            user,
            item,
            quantity,
        });
        cart_id
    }

    /// Insert a wishlist row directly, returning its ID.
    pub fn seed_wishlist_row(&self, user: i32, item: i32) -> i64 {
        let mut state = lock(&self.state);
        let wishlist_id = next_id(&mut state);
        state.wishlist.push(WishlistRecord {
            wishlist_id,
            user,
            item,
        });
        wishlist_id
    }

    /// Give every row of `user`'s cart and wishlist a new ID, as if another
    /// device had removed and re-added them.
    pub fn recreate_rows(&self, user: i32) {
        let mut state = lock(&self.state);
        let carts: Vec<usize> = (0..state.cart.len())
            .filter(|&i| state.cart[i].user == user)
            .collect();
        for i in carts {
            let id = next_id(&mut state);
            state.cart[i].cart_id = id;
        }
        let wishes: Vec<usize> = (0..state.wishlist.len())
            .filter(|&i| state.wishlist[i].user == user)
            .collect();
        for i in wishes {
            let id = next_id(&mut state);
            state.wishlist[i].wishlist_id = id;
        }
    }

    /// Make every cart, wishlist and order request fail with 503.
    pub fn set_outage(&self, outage: bool) {
        lock(&self.state).outage = outage;
    }

    /// `(item, quantity)` pairs in the user's server-side cart.
    #[must_use]
    pub fn cart_of(&self, user: i32) -> Vec<(i32, i64)> {
        lock(&self.state)
            .cart
            .iter()
            .filter(|r| r.user == user)
            .map(|r| (r.item, r.quantity))
            .collect()
    }

    /// Items in the user's server-side wishlist.
    #[must_use]
    pub fn wishlist_of(&self, user: i32) -> Vec<i32> {
        lock(&self.state)
            .wishlist
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.item)
            .collect()
    }

    /// Status of an order (`pending`, `confirmed` or `failed`).
    #[must_use]
    pub fn order_status(&self, order_id: i32) -> Option<String> {
        lock(&self.state)
            .orders
            .iter()
            .find(|o| o.order_id == i64::from(order_id))
            .map(|o| o.status.clone())
    }

    /// `(item, quantity)` lines and the total an order was placed with.
    #[must_use]
    pub fn order_contents(&self, order_id: i32) -> Option<(Vec<(i64, i64)>, String)> {
        lock(&self.state)
            .orders
            .iter()
            .find(|o| o.order_id == i64::from(order_id))
            .map(|o| (o.lines.clone(), o.total.clone()))
    }

    /// Whether an account with this email exists.
    #[must_use]
    pub fn has_account(&self, email: &str) -> bool {
        lock(&self.state)
            .accounts
            .iter()
            .any(|a| a.email.eq_ignore_ascii_case(email))
    }

    /// Number of requests whose `"METHOD path"` starts with `prefix`.
    #[must_use]
    pub fn requests_matching(&self, prefix: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }

    /// Number of requests served so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }
}

impl Drop for MockStore {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn next_id(state: &mut MockState) -> i64 {
    state.next_id += 1;
    state.next_id
}

/// Signature the mock gateway issues for a successful payment.
#[must_use]
pub fn payment_signature(gateway_order: &str, payment_id: &str) -> String {
    format!("{gateway_order}|{payment_id}|signed")
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/EcoMall/cart/", get(list_cart).post(create_cart))
        .route(
            "/EcoMall/cart/{cart_id}/",
            patch(update_cart).delete(delete_cart),
        )
        .route(
            "/EcoMall/wishlist/",
            get(list_wishlist).post(create_wishlist),
        )
        .route(
            "/EcoMall/wishlist/{wishlist_id}/",
            delete(delete_wishlist),
        )
        .route("/EcoMall/login/", post(login))
        .route("/EcoMall/register/", post(register))
        .route("/EcoMall/create-order/", post(create_order))
        .route("/EcoMall/verify-payment/", post(verify_payment))
        .route("/EcoMall/payment-pending/", post(payment_pending))
        .route("/EcoMall/payment-failed/", post(payment_failed))
        .route("/EcoMall/diagnostics/{case}/", get(diagnostics))
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Record the request and report an outage if one is configured.
fn enter(state: &mut MockState, request: String) -> Result<(), Response> {
    state.requests.push(request);
    if state.outage {
        return Err(error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
        ));
    }
    Ok(())
}

fn user_param(params: &HashMap<String, String>) -> Result<i32, Response> {
    params
        .get("user_id")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "user_id is required"))
}

fn cart_json(state: &MockState, row: &CartRecord) -> Value {
    let item = state.items.get(&row.item);
    json!({
        "cart_id": row.cart_id,
        "user": row.user,
        "item": row.item,
        "item_name": item.map(|i| i.name.clone()),
        "image": item.map(|i| i.image.clone()),
        "selling_price": item.map(|i| i.price.clone()),
        "quantity": row.quantity,
        "added_at": ADDED_AT,
    })
}

fn wishlist_json(state: &MockState, row: &WishlistRecord) -> Value {
    let item = state.items.get(&row.item);
    json!({
        "wishlist_id": row.wishlist_id,
        "user": row.user,
        "item": row.item,
        "item_name": item.map(|i| i.name.clone()),
        "image": item.map(|i| i.image.clone()),
        "selling_price": item.map(|i| i.price.clone()),
        "added_at": ADDED_AT,
    })
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    user_id: Option<i32>,
    item_id: Option<i32>,
    quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: Option<i64>,
}

async fn list_cart(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, "GET cart".to_string()) {
        return response;
    }
    let user = match user_param(&params) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let rows: Vec<Value> = state
        .cart
        .iter()
        .filter(|r| r.user == user)
        .map(|r| cart_json(&state, r))
        .collect();
    Json(rows).into_response()
}

async fn create_cart(State(state): State<SharedState>, Json(body): Json<CreateBody>) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, "POST cart".to_string()) {
        return response;
    }
    let (Some(user), Some(item)) = (body.user_id, body.item_id) else {
        return error(StatusCode::BAD_REQUEST, "user_id and item_id are required");
    };
    if !state.items.contains_key(&item) {
        return error(StatusCode::BAD_REQUEST, "Invalid item");
    }
    let quantity = body.quantity.unwrap_or(1).max(1);

    // Upsert: an existing row for the item gets its quantity increased
    if let Some(existing) = state
        .cart
        .iter_mut()
        .find(|r| r.user == user && r.item == item)
    {
        existing.quantity += quantity;
        let row = existing.clone();
        return (StatusCode::OK, Json(cart_json(&state, &row))).into_response();
    }

    let row = CartRecord {
        cart_id: next_id(&mut state),
        user,
        item,
        quantity,
    };
    state.cart.push(row.clone());
    (StatusCode::CREATED, Json(cart_json(&state, &row))).into_response()
}

async fn update_cart(
    State(state): State<SharedState>,
    Path(cart_id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, format!("PATCH cart/{cart_id}")) {
        return response;
    }
    let Some(existing) = state.cart.iter_mut().find(|r| r.cart_id == cart_id) else {
        return error(StatusCode::NOT_FOUND, "Not found");
    };
    if let Some(quantity) = body.quantity {
        existing.quantity = quantity.max(1);
    }
    let row = existing.clone();
    Json(cart_json(&state, &row)).into_response()
}

async fn delete_cart(State(state): State<SharedState>, Path(cart_id): Path<i64>) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, format!("DELETE cart/{cart_id}")) {
        return response;
    }
    let before = state.cart.len();
    state.cart.retain(|r| r.cart_id != cart_id);
    if state.cart.len() == before {
        return error(StatusCode::NOT_FOUND, "Not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_wishlist(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, "GET wishlist".to_string()) {
        return response;
    }
    let user = match user_param(&params) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let rows: Vec<Value> = state
        .wishlist
        .iter()
        .filter(|r| r.user == user)
        .map(|r| wishlist_json(&state, r))
        .collect();
    Json(rows).into_response()
}

async fn create_wishlist(
    State(state): State<SharedState>,
    Json(body): Json<CreateBody>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, "POST wishlist".to_string()) {
        return response;
    }
    let (Some(user), Some(item)) = (body.user_id, body.item_id) else {
        return error(StatusCode::BAD_REQUEST, "user_id and item_id are required");
    };
    if !state.items.contains_key(&item) {
        return error(StatusCode::BAD_REQUEST, "Invalid item");
    }

    // get_or_create per (user, item)
    if let Some(row) = state
        .wishlist
        .iter()
        .find(|r| r.user == user && r.item == item)
        .cloned()
    {
        return (StatusCode::OK, Json(wishlist_json(&state, &row))).into_response();
    }

    let row = WishlistRecord {
        wishlist_id: next_id(&mut state),
        user,
        item,
    };
    state.wishlist.push(row.clone());
    (StatusCode::CREATED, Json(wishlist_json(&state, &row))).into_response()
}

async fn delete_wishlist(
    State(state): State<SharedState>,
    Path(wishlist_id): Path<i64>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, format!("DELETE wishlist/{wishlist_id}")) {
        return response;
    }
    let before = state.wishlist.len();
    state.wishlist.retain(|r| r.wishlist_id != wishlist_id);
    if state.wishlist.len() == before {
        return error(StatusCode::NOT_FOUND, "Not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(State(state): State<SharedState>, Json(body): Json<LoginBody>) -> Response {
    let mut state = lock(&state);
    state.requests.push("POST login".to_string());

    if body.email.is_empty() || body.password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    let Some(account) = state
        .accounts
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(&body.email) && a.password == body.password)
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };

    Json(json!({
        "message": "Login successful",
        "user": {
            "user_id": account.user_id,
            "first_name": account.first_name,
            "last_name": account.last_name,
            "email": account.email,
            "mobile_number": account.mobile_number,
        }
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    mobile_number: Option<String>,
    password: Option<String>,
}

async fn register(State(state): State<SharedState>, Json(body): Json<RegisterBody>) -> Response {
    let mut state = lock(&state);
    state.requests.push("POST register".to_string());

    // Serializer-style errors: {"field": ["problem"]}
    let mut errors = serde_json::Map::new();
    let fields = [
        ("first_name", &body.first_name),
        ("last_name", &body.last_name),
        ("email", &body.email),
        ("mobile_number", &body.mobile_number),
        ("password", &body.password),
    ];
    for (field, value) in fields {
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            errors.insert(field.to_string(), json!(["This field may not be blank."]));
        }
    }

    let email = body.email.clone().unwrap_or_default();
    let mobile = body.mobile_number.clone().unwrap_or_default();
    if state
        .accounts
        .iter()
        .any(|a| !email.is_empty() && a.email.eq_ignore_ascii_case(&email))
    {
        errors.insert(
            "email".to_string(),
            json!(["user with this email already exists."]),
        );
    }
    if state
        .accounts
        .iter()
        .any(|a| !mobile.is_empty() && a.mobile_number.as_deref() == Some(mobile.as_str()))
    {
        errors.insert(
            "mobile_number".to_string(),
            json!(["user with this mobile number already exists."]),
        );
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(Value::Object(errors))).into_response();
    }

    let user_id = state.accounts.iter().map(|a| a.user_id).max().unwrap_or(0) + 1;
    let account = Account {
        user_id,
        email,
        password: body.password.unwrap_or_default(),
        first_name: body.first_name.unwrap_or_default(),
        last_name: body.last_name.unwrap_or_default(),
        mobile_number: Some(mobile),
    };
    state.accounts.push(account.clone());

    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": {
                "user_id": account.user_id,
                "first_name": account.first_name,
                "last_name": account.last_name,
                "email": account.email,
                "mobile_number": account.mobile_number,
            }
        })),
    )
        .into_response()
}

/// Decimal fields arrive as JSON strings or numbers.
fn decimal_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().parse::<f64>().is_ok() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn create_order(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    if let Err(response) = enter(&mut state, "POST create-order".to_string()) {
        return response;
    }

    let user = body.get("user_id").and_then(Value::as_i64).filter(|id| *id > 0);
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());
    let total = body.get("total_amount").and_then(decimal_text);
    let (Some(_), Some(items), Some(total)) = (user, items, total) else {
        return error(
            StatusCode::BAD_REQUEST,
            "user_id, items and total_amount are required",
        );
    };

    let lines = items
        .iter()
        .map(|line| {
            (
                line.get("item_id").and_then(Value::as_i64).unwrap_or(0),
                line.get("quantity").and_then(Value::as_i64).unwrap_or(1),
            )
        })
        .collect();

    let order_id = next_id(&mut state);
    let gateway_order = format!("order_mock{order_id}");
    let amount = total.parse::<f64>().unwrap_or(0.0);
    state.orders.push(OrderRecord {
        order_id,
        lines,
        total,
        status: "pending".to_string(),
        gateway_order: gateway_order.clone(),
    });

    (
        StatusCode::CREATED,
        Json(json!({
            "order_id": order_id,
            "razorpay_order_id": gateway_order,
            "amount": amount,
            "currency": "INR",
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    razorpay_signature: Option<String>,
}

async fn verify_payment(
    State(state): State<SharedState>,
    Json(body): Json<VerifyBody>,
) -> Response {
    let mut state = lock(&state);
    state.requests.push("POST verify-payment".to_string());

    let (Some(gateway_order), Some(payment_id), Some(signature)) = (
        body.razorpay_order_id,
        body.razorpay_payment_id,
        body.razorpay_signature,
    ) else {
        return error(StatusCode::BAD_REQUEST, "Missing payment details");
    };
    if signature != payment_signature(&gateway_order, &payment_id) {
        return error(StatusCode::BAD_REQUEST, "Payment verification failed");
    }

    let Some(order) = state
        .orders
        .iter_mut()
        .find(|o| o.gateway_order == gateway_order)
    else {
        return error(StatusCode::NOT_FOUND, "Payment record not found");
    };
    order.status = "confirmed".to_string();

    Json(json!({
        "success": true,
        "order_id": order.order_id,
        "payment_id": payment_id,
        "status": "captured",
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct OrderRef {
    order_id: Option<i64>,
}

fn mark_order(state: &SharedState, order_id: Option<i64>, status: &str) -> Response {
    let mut state = lock(state);
    state.requests.push(format!("POST payment-{status}"));

    let Some(order) = state
        .orders
        .iter_mut()
        .find(|o| Some(o.order_id) == order_id)
    else {
        return error(StatusCode::NOT_FOUND, "Order not found");
    };
    order.status = status.to_string();

    Json(json!({
        "status": status,
        "message": format!("Payment for Order {} is {status}.", order.order_id),
    }))
    .into_response()
}

async fn payment_pending(State(state): State<SharedState>, Json(body): Json<OrderRef>) -> Response {
    mark_order(&state, body.order_id, "pending")
}

async fn payment_failed(State(state): State<SharedState>, Json(body): Json<OrderRef>) -> Response {
    mark_order(&state, body.order_id, "failed")
}

/// Canned responses for exercising client edge cases.
async fn diagnostics(Path(case): Path<String>) -> Response {
    match case.as_str() {
        "no-content" => StatusCode::NO_CONTENT.into_response(),
        "plain" => (StatusCode::OK, "OK").into_response(),
        "message" => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "message": "Upstream timeout" })),
        )
            .into_response(),
        "empty-error" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "html-error" => (StatusCode::NOT_FOUND, "<h1>Not Found</h1>").into_response(),
        _ => error(StatusCode::NOT_FOUND, "Unknown diagnostics case"),
    }
}
