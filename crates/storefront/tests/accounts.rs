//! Router tests for accounts, the admin back-office and health checks.

#![allow(clippy::unwrap_used)]

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{PASSWORD, TestApp, sized, submission};
use threadline_core::{FulfillmentStatus, UserRole};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();
    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_register_login_logout() {
    let app = TestApp::new();

    let (status, user) = app
        .post(
            "/api/auth/register",
            &json!({ "email": "Grace@Example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "grace@example.com");
    assert_eq!(user["role"], "customer");

    let (status, me) = app.get("/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);

    let (status, _) = app.post("/api/auth/logout", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            "/api/auth/login",
            &json!({ "email": "grace@example.com", "password": "wrong password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_short_password_and_duplicates() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/auth/register",
            &json!({ "email": "grace@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.post(
        "/api/auth/register",
        &json!({ "email": "grace@example.com", "password": PASSWORD }),
    )
    .await;
    let other = app.new_browser();
    let (status, _) = other
        .post(
            "/api/auth/register",
            &json!({ "email": "grace@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_guest_cart_merges_into_account_on_login() {
    let app = TestApp::new();
    let tee = app.seed_product("field-tee", 20, vec![sized("M", 5)]).await;

    // Earlier session left one tee in the server cart
    let earlier = app.new_browser();
    earlier.sign_in_as("grace@example.com", UserRole::Customer).await;
    earlier
        .post("/api/cart/add", &json!({ "productId": tee, "size": "M", "qty": 1 }))
        .await;

    app.post("/api/cart/add", &json!({ "productId": tee, "size": "M", "qty": 2 }))
        .await;
    app.post(
        "/api/auth/login",
        &json!({ "email": "grace@example.com", "password": PASSWORD }),
    )
    .await;

    let (status, cart) = app.get("/api/cart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["item_count"], 3);
}

// =============================================================================
// Account
// =============================================================================

#[tokio::test]
async fn test_account_orders_are_private() {
    let app = TestApp::new();
    let tee = app.seed_product("field-tee", 20, vec![sized("M", 5)]).await;

    app.sign_in_as("ada@example.com", UserRole::Customer).await;
    let (_, placed) = app
        .post("/api/checkout", &submission(&[(tee, Some("M"), 1)], "standard"))
        .await;
    let order_id = placed["order_id"].to_string();

    let (status, orders) = app.get("/api/account/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, order) = app.get(&format!("/api/account/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], placed["order_id"]);

    let stranger = app.new_browser();
    stranger
        .sign_in_as("mallory@example.com", UserRole::Customer)
        .await;
    let (status, _) = stranger
        .get(&format!("/api/account/orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let anonymous = app.new_browser();
    let (status, _) = anonymous.get("/api/account/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_favorites() {
    let app = TestApp::new();
    let tee = app.seed_product("field-tee", 20, vec![sized("M", 5)]).await;
    app.sign_in_as("ada@example.com", UserRole::Customer).await;

    let (status, _) = app
        .post("/api/account/favorites", &json!({ "productId": tee }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.post("/api/account/favorites", &json!({ "productId": tee }))
        .await;

    let (_, favorites) = app.get("/api/account/favorites").await;
    assert_eq!(favorites.as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&format!("/api/account/favorites/{tee}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, favorites) = app.get("/api/account/favorites").await;
    assert!(favorites.as_array().unwrap().is_empty());
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/admin/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.sign_in_as("ada@example.com", UserRole::Customer).await;
    let (status, _) = app.get("/api/admin/orders").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_manages_catalog() {
    let app = TestApp::new();
    app.sign_in_as("admin@example.com", UserRole::Admin).await;

    let (status, product) = app
        .post(
            "/api/admin/products",
            &json!({
                "slug": "wool-scarf",
                "title": "Wool scarf",
                "price": "32.00",
                "tags": ["new"],
                "variants": [{ "color": "grey", "stock": 4 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = product["id"].to_string();

    let (status, _) = app
        .post(
            "/api/admin/products",
            &json!({ "slug": "free-thing", "title": "Free", "price": "0" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .json(
            Method::PATCH,
            &format!("/api/admin/products/{id}"),
            &json!({ "price": "28.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Wool scarf");

    let (status, _) = app.get("/api/products/wool-scarf").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            &format!("/api/admin/products/{id}/status"),
            &json!({ "status": "hidden" }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/products/wool-scarf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, page) = app.get("/api/admin/products").await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_admin_advances_fulfillment_one_step_at_a_time() {
    let app = TestApp::new();
    let tee = app.seed_product("field-tee", 20, vec![sized("M", 5)]).await;
    let (_, placed) = app
        .post("/api/checkout", &submission(&[(tee, Some("M"), 1)], "standard"))
        .await;
    let order_id = placed["order_id"].to_string();

    app.sign_in_as("admin@example.com", UserRole::Admin).await;
    let uri = format!("/api/admin/orders/{order_id}/fulfillment");

    let (status, _) = app.post(&uri, &json!({ "status": "shipped" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = app.post(&uri, &json!({ "status": "processing" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["fulfillment_status"], "processing");

    let (status, order) = app
        .post(&uri, &json!({ "status": "shipped", "tracking": " 1Z999AA1 " }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["tracking_number"], "1Z999AA1");

    let (status, _) = app.post(&uri, &json!({ "status": "canceled" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let order = app
        .stores
        .orders
        .get(order_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.fulfillment_status, FulfillmentStatus::Shipped);

    let (_, page) = app.get("/api/admin/orders?fulfillment_status=shipped").await;
    assert_eq!(page["total"], 1);
    let (_, page) = app.get("/api/admin/orders?payment_status=paid").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_admin_sets_user_role() {
    let app = TestApp::new();
    let customer = app.new_browser();
    customer
        .sign_in_as("grace@example.com", UserRole::Customer)
        .await;
    let (_, me) = customer.get("/api/auth/me").await;
    let customer_id = me["id"].to_string();

    app.sign_in_as("admin@example.com", UserRole::Admin).await;
    let (_, admin) = app.get("/api/auth/me").await;

    let (status, user) = app
        .post(
            &format!("/api/admin/users/{customer_id}/role"),
            &json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "admin");

    let (status, _) = app
        .post(
            &format!("/api/admin/users/{}/role", admin["id"]),
            &json!({ "role": "customer" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, page) = app.get("/api/admin/users").await;
    assert_eq!(page["total"], 2);
}
