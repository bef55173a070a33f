use kahawa_payment_engine::traits::{
    CaptureOutcome,
    ProviderError,
    PushOutcome,
    PushProvider,
    PushRequest,
    RedirectProvider,
    WebhookSignature,
};
use kps_common::Cents;
use mockall::mock;
use serde_json::Value;

mock! {
    pub PaypalProvider {}
    impl RedirectProvider for PaypalProvider {
        async fn create_order(&self, total: Cents, currency: &str) -> Result<String, ProviderError>;
        async fn capture_order(&self, provider_order_id: &str) -> Result<CaptureOutcome, ProviderError>;
        async fn verify_webhook_signature(&self, signature: &WebhookSignature, event: &Value) -> Result<bool, ProviderError>;
    }
}

mock! {
    pub MpesaProvider {}
    impl PushProvider for MpesaProvider {
        async fn initiate_push(&self, request: PushRequest) -> Result<PushOutcome, ProviderError>;
    }
}
