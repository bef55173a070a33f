use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpesaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Daraja credentials are not configured")]
    NotConfigured,
    #[error("Could not obtain an access token: {0}")]
    AuthError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Daraja rejected the request. Error {code}. {message}")]
    DarajaError { code: String, message: String },
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
