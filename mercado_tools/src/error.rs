use thiserror::Error;

#[derive(Debug, Error)]
pub enum MercadoApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid request: {0}")]
    RequestError(String),
    #[error("Invalid response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl MercadoApiError {
    /// True when the failure came back from the provider with an HTTP status, as opposed to a transport or
    /// decoding problem on our side.
    pub fn is_provider_rejection(&self) -> bool {
        matches!(self, MercadoApiError::QueryError { .. })
    }
}
