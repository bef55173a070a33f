use kahawa_payment_engine::traits::{ProviderError, PushOutcome, PushProvider, PushRequest};
use log::*;
use mpesa_tools::{MpesaApi, MpesaApiError, MpesaConfig};
use rand::Rng;
use serde_json::json;

/// The push rail, backed by Daraja STK push. When Daraja credentials are absent the gateway runs in mock mode and
/// fabricates checkout request ids, so dev environments can exercise the full flow end to end.
#[derive(Clone)]
pub enum MpesaGateway {
    Live(MpesaApi),
    Mock,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        if config.is_configured() {
            Ok(Self::Live(MpesaApi::new(config)?))
        } else {
            warn!("📱️ Daraja credentials are not set. STK pushes will be mocked.");
            Ok(Self::Mock)
        }
    }
}

fn mock_checkout_request_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..16).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
    format!("ws_CO_mock_{suffix}")
}

impl PushProvider for MpesaGateway {
    async fn initiate_push(&self, request: PushRequest) -> Result<PushOutcome, ProviderError> {
        match self {
            Self::Live(api) => {
                let push = api
                    .stk_push(&request.phone, request.amount, &request.reference, &request.description)
                    .await
                    .map_err(|e| match e {
                        MpesaApiError::NotConfigured => ProviderError::NotConfigured("M-Pesa".to_string()),
                        other => ProviderError::Upstream(other.to_string()),
                    })?;
                Ok(PushOutcome {
                    checkout_request_id: push.checkout_request_id,
                    merchant_request_id: Some(push.merchant_request_id),
                    customer_message: push.customer_message,
                    mock: false,
                    raw: json!({ "ResponseCode": push.response_code }),
                })
            },
            Self::Mock => {
                let checkout_request_id = mock_checkout_request_id();
                info!("📱️ Mock STK push for {}: {checkout_request_id}", request.reference);
                Ok(PushOutcome {
                    checkout_request_id,
                    merchant_request_id: None,
                    customer_message: Some("Mock push sent. Confirm via the simulated callback.".to_string()),
                    mock: true,
                    raw: json!({ "mock": true }),
                })
            },
        }
    }
}
