use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use kahawa_payment_engine::traits::{PaymentGatewayError, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Invalid callback token")]
    InvalidCallbackToken,
    #[error("Webhook signature verification failed")]
    InvalidWebhookSignature,
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Upstream payment provider error. {0}")]
    UpstreamError(String),
    #[error("Too many requests. Slow down.")]
    RateLimited,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCallbackToken => StatusCode::UNAUTHORIZED,
            Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "message": self.to_string() }).to_string())
    }
}

/// Client mistakes become 4xx responses; provider and backend trouble stays 5xx. A provider that is simply not
/// configured is the server's problem, never the client's.
impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::EmptyCart |
            PaymentGatewayError::InvalidTotal |
            PaymentGatewayError::ItemNotFound(_) |
            PaymentGatewayError::TotalMismatch { .. } |
            PaymentGatewayError::InvalidPhone(_) |
            PaymentGatewayError::InvalidOrderId(_) => Self::BadRequest(e.to_string()),
            PaymentGatewayError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentGatewayError::ProviderError(ProviderError::NotConfigured(p)) => {
                Self::ConfigurationError(format!("{p} is not configured on this server"))
            },
            PaymentGatewayError::ProviderError(ProviderError::Upstream(m)) => Self::UpstreamError(m),
            PaymentGatewayError::DatabaseError(m) => Self::BackendError(m),
        }
    }
}
