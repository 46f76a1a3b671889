//! Stripe Checkout over its form-encoded REST API.

use async_trait::async_trait;
use reqwest::Url;
use tracing::{info, instrument, warn};
use treido_core::validation::validate_checkout_session_id;

use super::{CheckoutSession, NewCheckoutSession, PaymentGateway};
use crate::config::PaymentSettings;
use crate::error::{MarketError, MarketResult};

/// Stripe-backed [`PaymentGateway`].
#[derive(Clone)]
pub struct StripeGateway {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        StripeGateway {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &PaymentSettings) -> Self {
        StripeGateway::new(&settings.api_base_url, &settings.secret_key)
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    fn session_params(request: &NewCheckoutSession) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.client_reference_id.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
            params.push((format!("{}[price_data][currency]", prefix), request.currency.clone()));
            params.push((
                format!("{}[price_data][unit_amount]", prefix),
                item.unit_amount.minor().to_string(),
            ));
            params.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
            if let Some(image) = item.image.as_ref().filter(|url| url.starts_with("http")) {
                params.push((format!("{}[price_data][product_data][images][0]", prefix), image.clone()));
            }
        }

        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        params
    }

    /// `{base}/v1/checkout/sessions/{id}`, with the id pushed as one encoded segment.
    fn session_url(&self, session_id: &str) -> MarketResult<Url> {
        let session_id = validate_checkout_session_id(session_id)
            .map_err(|e| MarketError::Payment(format!("Refusing session id: {}", e)))?;

        let mut url = Url::parse(&format!("{}/v1/checkout/sessions", self.base_url))
            .map_err(|e| MarketError::Payment(format!("Invalid Stripe base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MarketError::Payment("Stripe base URL cannot have a path".to_string()))?
            .push(&session_id);
        Ok(url)
    }

    async fn read_session(response: reqwest::Response) -> MarketResult<CheckoutSession> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, "Stripe API error: {}", error_text);
            return Err(MarketError::Payment(format!("{}: {}", status, error_text)));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| MarketError::Payment(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(&self, request: &NewCheckoutSession) -> MarketResult<CheckoutSession> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .form(&Self::session_params(request))
            .send()
            .await
            .map_err(|e| MarketError::Payment(format!("Stripe API error: {}", e)))?;

        let session = Self::read_session(response).await?;
        info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(&self, session_id: &str) -> MarketResult<CheckoutSession> {
        let response = self
            .client
            .get(self.session_url(session_id)?)
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| MarketError::Payment(format!("Stripe API error: {}", e)))?;

        Self::read_session(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::CheckoutLineItem;
    use serde_json::json;
    use std::collections::BTreeMap;
    use treido_core::Money;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("sk_test_123:")
    const AUTH: &str = "Basic c2tfdGVzdF8xMjM6";

    fn request() -> NewCheckoutSession {
        let mut metadata = BTreeMap::new();
        metadata.insert("user_id".to_string(), "buyer".to_string());
        NewCheckoutSession {
            currency: "eur".into(),
            line_items: vec![CheckoutLineItem {
                name: "Oak chair".into(),
                unit_amount: Money::from_minor(1999),
                quantity: 2,
                image: Some("/placeholder.svg".into()),
            }],
            success_url: "http://shop.test/en/checkout/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "http://shop.test/en/cart".into(),
            client_reference_id: "buyer".into(),
            metadata,
        }
    }

    #[test]
    fn test_session_params() {
        let params = StripeGateway::session_params(&request());
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1999"));
        assert_eq!(get("metadata[user_id]"), Some("buyer"));
        // relative image paths are not sent
        assert_eq!(get("line_items[0][price_data][product_data][images][0]"), None);
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", AUTH))
            .and(body_string_contains("client_reference_id=buyer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.test/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = StripeGateway::new(server.uri(), "sk_test_123");
        let session = gateway.create_checkout_session(&request()).await.unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert!(session.url.unwrap().contains("cs_test_1"));
    }

    #[tokio::test]
    async fn test_retrieve_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "payment_status": "paid",
                "payment_intent": "pi_1",
                "amount_total": 3998
            })))
            .mount(&server)
            .await;

        let gateway = StripeGateway::new(server.uri(), "sk_test_123");
        let session = gateway.retrieve_checkout_session("cs_test_1").await.unwrap();
        assert!(session.is_paid());
        assert_eq!(session.payment_intent_id(), Some("pi_1"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_path_segments_in_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1" })))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = StripeGateway::new(server.uri(), "sk_test_123");
        for id in [" cs_/../../../../v1/customers ", "cs_x/..", "cs_x?expand[]=customer"] {
            let err = gateway.retrieve_checkout_session(id).await.unwrap_err();
            assert!(matches!(err, MarketError::Payment(_)), "{id}");
        }

        let url = gateway.session_url("cs_test_1").unwrap();
        assert_eq!(url.path(), "/v1/checkout/sessions/cs_test_1");
    }

    #[tokio::test]
    async fn test_provider_error_is_payment_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such checkout.session"))
            .mount(&server)
            .await;

        let gateway = StripeGateway::new(server.uri(), "sk_test_123");
        let err = gateway.retrieve_checkout_session("cs_missing").await.unwrap_err();
        match err {
            MarketError::Payment(message) => assert!(message.contains("No such checkout.session")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
