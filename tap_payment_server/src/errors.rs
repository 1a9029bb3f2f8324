use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use tap_payment_engine::{traits::StorageError, CheckoutApiError, LinkFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request query: {0}")]
    InvalidRequestQuery(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("The state parameter is invalid. {0}")]
    InvalidStateToken(String),
    #[error("The vendor does not exist or does not belong to the authenticated user.")]
    VendorNotOwned,
    #[error("The request origin is not allowed.")]
    ForbiddenPeer,
    #[error("The provider rejected the token exchange.")]
    ExchangeFailed { status: u16, body: String },
    #[error("Payments are unavailable right now. {0}")]
    PaymentUnavailable(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestQuery(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidStateToken(_) => StatusCode::BAD_REQUEST,
            Self::ExchangeFailed { .. } => StatusCode::BAD_REQUEST,
            Self::VendorNotOwned => StatusCode::FORBIDDEN,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The provider's error body is relayed for the exchange case; it aids debugging a misconfigured
        // app and never contains our secrets.
        let body = match self {
            Self::ExchangeFailed { status, body } => {
                serde_json::json!({ "error": "Token exchange failed", "provider_status": status, "provider_error": body })
            },
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Session token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Session token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Session has expired.")]
    Expired,
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(s) => ServerError::NoRecordFound(s),
            StorageError::DatabaseError(s) => ServerError::BackendError(s),
        }
    }
}

impl From<LinkFlowError> for ServerError {
    fn from(e: LinkFlowError) -> Self {
        match e {
            LinkFlowError::ExchangeRejected { status, body } => ServerError::ExchangeFailed { status, body },
            LinkFlowError::MissingMerchantId => {
                ServerError::ExchangeFailed { status: 200, body: "No merchant id in token response".to_string() }
            },
            LinkFlowError::ProviderUnreachable(msg) => ServerError::BackendError(msg),
            LinkFlowError::DatabaseError(msg) => ServerError::BackendError(msg),
        }
    }
}

impl From<CheckoutApiError> for ServerError {
    fn from(e: CheckoutApiError) -> Self {
        match e {
            CheckoutApiError::OrderNotFound(id) => ServerError::NoRecordFound(format!("Order {id}")),
            CheckoutApiError::PaymentUnavailable(msg) => ServerError::PaymentUnavailable(msg),
            CheckoutApiError::ProviderError(msg) => ServerError::BackendError(msg),
            CheckoutApiError::DatabaseError(msg) => ServerError::BackendError(msg),
        }
    }
}
