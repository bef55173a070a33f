use std::sync::Arc;

use kps_common::Cents;
use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::PaypalConfig,
    data_objects::{CaptureResponse, OrderCreated, WebhookSignature},
    PaypalApiError,
};

#[derive(Clone)]
pub struct PaypalApi {
    config: PaypalConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

impl PaypalApi {
    pub fn new(config: PaypalConfig) -> Result<Self, PaypalApiError> {
        let client = Client::builder().build().map_err(|e| PaypalApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Obtains a client-credentials access token. Tokens are not cached; PayPal rate limits are generous compared
    /// to this storefront's traffic.
    pub async fn access_token(&self) -> Result<String, PaypalApiError> {
        if !self.is_configured() {
            return Err(PaypalApiError::NotConfigured);
        }
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaypalApiError::AuthError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PaypalApiError::QueryError { status, message });
        }
        let token: AccessTokenResponse =
            response.json().await.map_err(|e| PaypalApiError::JsonError(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, PaypalApiError> {
        let token = self.access_token().await?;
        trace!("🅿️ POST {path}");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaypalApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<Value>().await.map_err(|e| PaypalApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaypalApiError::RestResponseError(e.to_string()))?;
            Err(PaypalApiError::QueryError { status, message })
        }
    }

    /// Creates a checkout order for the given amount. Amounts go over the wire as two-decimal major-unit strings.
    pub async fn create_order(&self, total: Cents, currency: &str) -> Result<OrderCreated, PaypalApiError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": { "currency_code": currency, "value": total.to_major_string() }
            }]
        });
        let result = self.post_json("/v2/checkout/orders", body).await?;
        let order: OrderCreated = serde_json::from_value(result).map_err(|e| PaypalApiError::JsonError(e.to_string()))?;
        debug!("🅿️ Created order {} ({})", order.id, order.status);
        Ok(order)
    }

    /// Captures an approved checkout order.
    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResponse, PaypalApiError> {
        let path = format!("/v2/checkout/orders/{paypal_order_id}/capture");
        let result = self.post_json(&path, json!({})).await?;
        let capture = CaptureResponse::from_value(result);
        debug!("🅿️ Capture of {paypal_order_id} came back {}", capture.status);
        Ok(capture)
    }

    /// Verifies a webhook delivery against PayPal's verification endpoint. `Ok(false)` means PayPal answered and
    /// rejected the signature.
    pub async fn verify_webhook_signature(
        &self,
        signature: &WebhookSignature,
        event: &Value,
    ) -> Result<bool, PaypalApiError> {
        let body = json!({
            "auth_algo": signature.auth_algo,
            "cert_url": signature.cert_url,
            "transmission_id": signature.transmission_id,
            "transmission_sig": signature.transmission_sig,
            "transmission_time": signature.transmission_time,
            "webhook_id": self.config.webhook_id,
            "webhook_event": event,
        });
        let result = self.post_json("/v1/notifications/verify-webhook-signature", body).await?;
        let verified = result["verification_status"].as_str() == Some("SUCCESS");
        if !verified {
            warn!("🅿️ Webhook signature verification came back {}", result["verification_status"]);
        }
        Ok(verified)
    }
}
