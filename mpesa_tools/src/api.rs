use std::sync::Arc;

use chrono::Utc;
use kps_common::Cents;
use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::MpesaConfig,
    data_objects::{DarajaErrorResponse, StkPushResponse},
    helpers::{daraja_timestamp, stk_password},
    MpesaApiError,
};

#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        let client = Client::builder().build().map_err(|e| MpesaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn access_token(&self) -> Result<String, MpesaApiError> {
        if !self.is_configured() {
            return Err(MpesaApiError::NotConfigured);
        }
        let response = self
            .client
            .get(self.url("/oauth/v1/generate?grant_type=client_credentials"))
            .basic_auth(&self.config.consumer_key, Some(self.config.consumer_secret.reveal()))
            .send()
            .await
            .map_err(|e| MpesaApiError::AuthError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(MpesaApiError::QueryError { status, message });
        }
        let token: AccessTokenResponse = response.json().await.map_err(|e| MpesaApiError::JsonError(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Sends an STK push prompting `msisdn` to pay `amount` for `reference`.
    ///
    /// `msisdn` must already be in `2547XXXXXXXX` form. Daraja only accepts whole-unit amounts, so the amount is
    /// rounded to the nearest whole major unit on the wire.
    pub async fn stk_push(
        &self,
        msisdn: &str,
        amount: Cents,
        reference: &str,
        description: &str,
    ) -> Result<StkPushResponse, MpesaApiError> {
        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.shortcode, self.config.passkey.reveal(), &timestamp);
        let body = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount.to_whole_major_units(),
            "PartyA": msisdn,
            "PartyB": self.config.shortcode,
            "PhoneNumber": msisdn,
            "CallBackURL": self.config.callback_url_with_token(),
            "AccountReference": reference,
            "TransactionDesc": description,
        });
        trace!("📱️ Sending STK push for {reference}");
        let response = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| MpesaApiError::RestResponseError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| MpesaApiError::RestResponseError(e.to_string()))?;
            if let Ok(err) = serde_json::from_str::<DarajaErrorResponse>(&text) {
                if err.error_message.is_some() {
                    return Err(MpesaApiError::DarajaError {
                        code: err.error_code.unwrap_or_default(),
                        message: err.error_message.unwrap_or_default(),
                    });
                }
            }
            return Err(MpesaApiError::QueryError { status, message: text });
        }
        let raw: Value = response.json().await.map_err(|e| MpesaApiError::JsonError(e.to_string()))?;
        let push: StkPushResponse =
            serde_json::from_value(raw.clone()).map_err(|e| MpesaApiError::JsonError(e.to_string()))?;
        if push.response_code != "0" {
            warn!("📱️ STK push for {reference} was not accepted: {:?}", push.response_description);
            return Err(MpesaApiError::DarajaError {
                code: push.response_code,
                message: push.response_description.unwrap_or_default(),
            });
        }
        debug!("📱️ STK push for {reference} queued as {}", push.checkout_request_id);
        Ok(push)
    }
}
