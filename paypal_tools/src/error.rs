use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaypalApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("PayPal credentials are not configured")]
    NotConfigured,
    #[error("Could not obtain an access token: {0}")]
    AuthError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
