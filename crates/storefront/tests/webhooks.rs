//! Router tests for the payment webhook endpoint.

#![allow(clippy::unwrap_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use common::{TestApp, sized, submission};
use threadline_core::{OrderId, PaymentStatus};

async fn place_order(app: &TestApp) -> OrderId {
    let tee = app.seed_product("field-tee", 20, vec![sized("M", 5)]).await;
    let (status, _) = app
        .post("/api/checkout", &submission(&[(tee, Some("M"), 2)], "standard"))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.memory.orders()[0].id
}

fn event(id: &str, kind: &str, object: Value) -> Value {
    json!({ "id": id, "type": kind, "data": { "object": object } })
}

async fn stock(app: &TestApp) -> i32 {
    let product = app
        .stores
        .products
        .get_by_slug("field-tee")
        .await
        .unwrap()
        .unwrap();
    product.variants[0].stock
}

// =============================================================================
// Signature
// =============================================================================

#[tokio::test]
async fn test_unsigned_event_is_rejected() {
    let app = TestApp::new();
    let order_id = place_order(&app).await;

    let payload = serde_json::to_vec(&event(
        "evt_1",
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "metadata": { "order_id": order_id.to_string() } }),
    ))
    .unwrap();

    let (status, body) = app
        .send(
            Request::post("/webhooks")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(
            Request::post("/webhooks")
                .header("stripe-signature", "t=1700000000,v1=deadbeef")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(app.memory.webhook_event_count(), 0);
}

#[tokio::test]
async fn test_signed_but_unprocessable_body_is_acknowledged() {
    let app = TestApp::new();
    let order_id = place_order(&app).await;

    let (status, body) = app.signed_webhook(b"not json".to_vec()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    // Completed event whose session object lacks an id
    let (status, body) = app
        .webhook(&event(
            "evt_1",
            "checkout.session.completed",
            json!({ "metadata": { "order_id": order_id.to_string() } }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(stock(&app).await, 5);
    assert_eq!(app.memory.webhook_event_count(), 0);
}

// =============================================================================
// Completed / expired
// =============================================================================

#[tokio::test]
async fn test_completed_for_unknown_session_is_acknowledged() {
    let app = TestApp::new();
    let order_id = place_order(&app).await;

    let (status, body) = app
        .webhook(&event(
            "evt_1",
            "checkout.session.completed",
            json!({ "id": "cs_unknown", "amount_total": 999 }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let orders = app.memory.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order_id);
    assert_eq!(orders[0].payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_repeated_completion_is_idempotent() {
    let app = TestApp::new();
    let order_id = place_order(&app).await;
    let object = json!({
        "id": "cs_test_1",
        "metadata": { "order_id": order_id.to_string() },
        "amount_total": 4650,
        "payment_intent": "pi_42"
    });

    let (status, _) = app
        .webhook(&event("evt_1", "checkout.session.completed", object.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total.amount(), Decimal::new(4650, 2));
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_42"));
    assert_eq!(stock(&app).await, 3);

    // Provider retry with a new event id
    let (status, _) = app
        .webhook(&event("evt_2", "checkout.session.completed", object.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Replay of an already-processed event
    let (status, _) = app
        .webhook(&event("evt_1", "checkout.session.completed", object))
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total.amount(), Decimal::new(4650, 2));
    assert_eq!(stock(&app).await, 3);
    assert_eq!(app.memory.webhook_event_count(), 2);
}

#[tokio::test]
async fn test_expired_session_cancels_pending_order() {
    let app = TestApp::new();
    let order_id = place_order(&app).await;

    let (status, _) = app
        .webhook(&event(
            "evt_1",
            "checkout.session.expired",
            json!({ "id": "cs_test_1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Canceled);

    // A late completion cannot resurrect a canceled order
    app.webhook(&event(
        "evt_2",
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "amount_total": 4500 }),
    ))
    .await;
    let order = app.stores.orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Canceled);
    assert_eq!(stock(&app).await, 5);
}

#[tokio::test]
async fn test_other_event_types_are_acknowledged() {
    let app = TestApp::new();

    let (status, body) = app
        .webhook(&event(
            "evt_1",
            "payment_intent.created",
            json!({ "id": "pi_1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}
