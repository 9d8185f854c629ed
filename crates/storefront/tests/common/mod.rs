//! Shared harness for router tests: in-memory stores, a recording payment
//! gateway and a client that carries the session cookie between requests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore as SessionMemoryStore;

use threadline_core::{CurrencyCode, Money, ProductId, ProductStatus, ShippingPolicy, UserRole};
use threadline_storefront::config::{DEFAULT_STRIPE_API_BASE, StorefrontConfig, StripeConfig};
use threadline_storefront::db::{MemoryStore, Stores};
use threadline_storefront::middleware::session_layer;
use threadline_storefront::models::{NewProduct, Variant};
use threadline_storefront::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway, WebhookVerifier,
};
use threadline_storefront::routes::webhooks::SIGNATURE_HEADER;
use threadline_storefront::services::auth::AuthService;
use threadline_storefront::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_9f8Kq2LmZx41TbVn";
pub const PASSWORD: &str = "correct horse battery";

/// Gateway that records every request and hands out sequential sessions.
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl RecordingGateway {
    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        Ok(CheckoutSession {
            id: format!("cs_test_{n}"),
            url: format!("https://pay.test/c/{n}"),
        })
    }
}

pub fn config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("x".repeat(32)),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
        },
        currency: CurrencyCode::default(),
        shipping: ShippingPolicy::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

/// One storefront instance plus a single browser's cookie jar.
pub struct TestApp {
    router: Router,
    pub memory: Arc<MemoryStore>,
    pub stores: Stores,
    pub gateway: Arc<RecordingGateway>,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    pub fn new() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(memory.clone());
        let gateway = Arc::new(RecordingGateway::default());
        let state = AppState::new(config(), stores.clone(), gateway.clone());
        let router = threadline_storefront::app(
            state,
            session_layer(SessionMemoryStore::default(), false),
        );

        Self {
            router,
            memory,
            stores,
            gateway,
            cookie: Mutex::new(None),
        }
    }

    /// A second browser against the same storefront.
    pub fn new_browser(&self) -> Self {
        Self {
            router: self.router.clone(),
            memory: self.memory.clone(),
            stores: self.stores.clone(),
            gateway: self.gateway.clone(),
            cookie: Mutex::new(None),
        }
    }

    pub async fn send(&self, mut request: Request<Body>) -> (StatusCode, Value) {
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            *self.cookie.lock().unwrap() = Some(pair);
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, body).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::delete(uri).body(Body::empty()).unwrap(),
        )
        .await
    }

    /// Post a provider event signed with the configured webhook secret.
    pub async fn webhook(&self, event: &Value) -> (StatusCode, Value) {
        self.signed_webhook(serde_json::to_vec(event).unwrap()).await
    }

    /// Deliver an arbitrary body with a valid signature.
    pub async fn signed_webhook(&self, payload: Vec<u8>) -> (StatusCode, Value) {
        let signature = WebhookVerifier::new(SecretString::from(WEBHOOK_SECRET))
            .signature_header(&payload, chrono::Utc::now().timestamp())
            .unwrap();
        self.send(
            Request::post("/webhooks")
                .header(SIGNATURE_HEADER, signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
    }

    pub async fn seed_product(&self, slug: &str, price: i64, variants: Vec<Variant>) -> ProductId {
        self.stores
            .products
            .create(NewProduct {
                slug: slug.to_string(),
                title: slug.replace('-', " "),
                description: String::new(),
                price: Money::new(Decimal::from(price)),
                status: ProductStatus::Active,
                tags: vec![],
                images: vec![],
                variants,
            })
            .await
            .unwrap()
            .id
    }

    /// Create a user directly in the store and sign this browser in.
    pub async fn sign_in_as(&self, email: &str, role: UserRole) {
        AuthService::new(self.stores.users.as_ref())
            .create_user(email, PASSWORD, role)
            .await
            .unwrap();
        let (status, _) = self
            .post(
                "/api/auth/login",
                &serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

pub fn sized(size: &str, stock: i32) -> Variant {
    Variant {
        size: Some(size.to_string()),
        color: None,
        stock,
    }
}

pub fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// A complete checkout payload for the given `(product, size, qty)` lines.
pub fn submission(lines: &[(ProductId, Option<&str>, i64)], method: &str) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, size, qty)| {
            serde_json::json!({ "productId": id, "size": size, "qty": qty })
        })
        .collect();

    serde_json::json!({
        "items": items,
        "customer": {
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "address": {
                "line1": "12 St James's Square",
                "city": "London",
                "postalCode": "SW1Y 4JH",
                "country": "GB"
            }
        },
        "shipping": { "method": method, "cost": "0.00" }
    })
}
