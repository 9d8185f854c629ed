//! Stripe-compatible REST client for hosted checkout sessions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{
    CheckoutSession, CheckoutSessionRequest, ORDER_ID_METADATA_KEY, PaymentError, PaymentGateway,
};
use crate::config::StripeConfig;

/// Provider calls are not retried; this bounds how long checkout waits.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Payment API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new payment API client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Config(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Flatten a session request into the provider's bracketed form encoding.
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("client_reference_id".to_string(), request.order_id.clone()),
        (
            format!("metadata[{ORDER_ID_METADATA_KEY}]"),
            request.order_id.clone(),
        ),
        (
            format!("payment_intent_data[metadata][{ORDER_ID_METADATA_KEY}]"),
            request.order_id.clone(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        form.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(image) = &item.image {
            form.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
    }

    let rate = "shipping_options[0][shipping_rate_data]";
    form.push((format!("{rate}[type]"), "fixed_amount".to_string()));
    form.push((
        format!("{rate}[display_name]"),
        request.shipping.display_name.clone(),
    ));
    form.push((
        format!("{rate}[fixed_amount][amount]"),
        request.shipping.amount.to_string(),
    ));
    form.push((
        format!("{rate}[fixed_amount][currency]"),
        request.currency.clone(),
    ));

    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .client
            .post(&url)
            .form(&session_form(request))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Parse("checkout session has no url".to_string()))?;

        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{SessionLineItem, SessionShipping};

    fn lookup<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form_encoding() {
        let request = CheckoutSessionRequest {
            line_items: vec![
                SessionLineItem {
                    name: "Field Tee".to_string(),
                    unit_amount: 2800,
                    quantity: 2,
                    image: Some("https://cdn.test/tee.jpg".to_string()),
                },
                SessionLineItem {
                    name: "Canvas Tote".to_string(),
                    unit_amount: 1500,
                    quantity: 1,
                    image: None,
                },
            ],
            shipping: SessionShipping {
                display_name: "Express".to_string(),
                amount: 0,
            },
            currency: "usd".to_string(),
            customer_email: "ada@test.dev".to_string(),
            success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.test/cart".to_string(),
            order_id: "42".to_string(),
        };

        let form = session_form(&request);

        assert_eq!(lookup(&form, "mode"), Some("payment"));
        assert_eq!(lookup(&form, "metadata[order_id]"), Some("42"));
        assert_eq!(lookup(&form, "line_items[0][price_data][unit_amount]"), Some("2800"));
        assert_eq!(lookup(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            lookup(&form, "line_items[0][price_data][product_data][images][0]"),
            Some("https://cdn.test/tee.jpg")
        );
        assert_eq!(
            lookup(&form, "line_items[1][price_data][product_data][images][0]"),
            None
        );
        assert_eq!(
            lookup(
                &form,
                "shipping_options[0][shipping_rate_data][fixed_amount][amount]"
            ),
            Some("0")
        );
    }
}
