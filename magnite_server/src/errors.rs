use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use magnite_engine::traits::{OrderQueryError, PaymentGatewayError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    /// The message shown to clients is deliberately generic; the wrapped detail goes to the log only.
    #[error("An internal server error occurred. Please try again later.")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Access token invalid or not provided")]
    CouldNotDeserializeAuthToken,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The order could not be accepted. {0}")]
    OrderRejected(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    /// The outbound call to the payment processor failed. The wrapped detail goes to the log only.
    #[error("The payment processor could not be reached. Please try again later.")]
    PaymentProcessorError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializeAuthToken => StatusCode::UNAUTHORIZED,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::OrderRejected(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::PaymentProcessorError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // 5xx bodies carry a generic message; put the real cause on record before it is lost.
        if self.status_code().is_server_error() {
            error!("💻️ Responding with {}: {self:?}", self.status_code());
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    ExpiredToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            // NotFound and Forbidden share one rendering so a client cannot probe which order ids exist.
            PaymentGatewayError::OrderNotFound(id) | PaymentGatewayError::Forbidden(id) => {
                Self::NoRecordFound(format!("Order {id}"))
            },
            PaymentGatewayError::UnknownTransaction(intent_id) => {
                Self::NoRecordFound(format!("Payment intent {intent_id}"))
            },
            PaymentGatewayError::Validation(e) => Self::OrderRejected(e.to_string()),
            PaymentGatewayError::Inventory(e) => Self::OrderRejected(e.to_string()),
            PaymentGatewayError::NotCancellable(id) => {
                Self::OrderRejected(format!("Order {id} has already been paid and can no longer be cancelled"))
            },
            PaymentGatewayError::NotPayable(id) => Self::OrderRejected(format!("Order {id} is not awaiting payment")),
            PaymentGatewayError::TransactionNotPending(id) => {
                Self::OrderRejected(format!("Transaction {id} is not awaiting a payment outcome"))
            },
            PaymentGatewayError::DatabaseError(e) => Self::BackendError(e),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderQueryError> for ServerError {
    fn from(e: OrderQueryError) -> Self {
        match e {
            OrderQueryError::QueryError(e) => Self::InvalidRequestBody(e),
            OrderQueryError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}
