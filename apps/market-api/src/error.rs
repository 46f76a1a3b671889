//! # Market Errors
//!
//! Service-level errors and the JSON error body every endpoint returns.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Market API                         │
//! │                                                                         │
//! │  Storefront                  Rust Backend                               │
//! │  ──────────                  ────────────                               │
//! │                                                                         │
//! │  fetch('/api/cart', POST)                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler: Result<Json<T>, ApiError>                              │  │
//! │  │         │                                                        │  │
//! │  │  DbError ───────────┐                                            │  │
//! │  │  CoreError ─────────┤                                            │  │
//! │  │  MarketError ───────┼──► ApiError { code, message } ──► status   │  │
//! │  │  VerifyError ───────┤        (+ reason for checkout)             │  │
//! │  │  CreateSessionError ┘                                            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "BUSINESS_LOGIC",                                            │
//! │    "message": "You cannot buy your own listing",                       │
//! │    "reason": "selfPurchase" }                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal details (SQL errors, provider responses) are logged and replaced
//! with generic messages before they reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use treido_core::{CoreError, ValidationError};
use treido_db::DbError;

use crate::checkout::{CreateSessionError, CreateSessionErrorCode, VerifyError};
use treido_core::VerifyErrorCode;

// =============================================================================
// Market Error
// =============================================================================

/// Result type alias for market operations.
pub type MarketResult<T> = Result<T, MarketError>;

/// Failures of the market services.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Payment provider request failed or was rejected.
    #[error("Payment provider error: {0}")]
    Payment(String),

    /// Catalog HTTP transport failed or returned a non-success status.
    #[error("Catalog request failed: {0}")]
    Catalog(String),

    /// Local cart storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No authenticated user on a request that needs one.
    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<ValidationError> for MarketError {
    fn from(err: ValidationError) -> Self {
        MarketError::Core(CoreError::Validation(err))
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Error body returned by every endpoint.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Category not found: phones"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Checkout failure reason (`selfPurchase`, `paymentNotCompleted`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// No or unknown user (401)
    Unauthorized,

    /// User may not act on this resource (403)
    Forbidden,

    /// Payment not completed (402)
    PaymentError,

    /// Marketplace rule violated (422)
    BusinessLogic,

    /// Cart operation failed (422)
    CartError,

    /// Payment provider or catalog backend failed (502)
    UpstreamError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::PaymentError => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::BusinessLogic | ErrorCode::CartError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            reason: None,
        }
    }

    /// Attaches a checkout reason code.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized() -> Self {
        ApiError::new(ErrorCode::Unauthorized, "Authentication required")
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Creates a cart error.
    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::InvalidInput(message) => ApiError::validation(message),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::CorruptColumn { column, reason } => {
                tracing::error!(column = %column, "Corrupt column: {}", reason);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::SelfPurchase { .. } => {
                ApiError::new(ErrorCode::BusinessLogic, "You cannot buy your own listing")
                    .with_reason("selfPurchase")
            }
            CoreError::EmptyCart => ApiError::cart("Cart is empty").with_reason("emptyCart"),
            CoreError::InvalidCartItem { reason } => ApiError::cart(reason),
            CoreError::Serialization(e) => {
                tracing::error!("Serialization failed: {}", e);
                ApiError::internal("Serialization failed")
            }
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts service errors to API errors.
impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Payment(e) => {
                tracing::error!("Payment provider error: {}", e);
                ApiError::new(ErrorCode::UpstreamError, "Payment provider request failed")
            }
            MarketError::Catalog(e) => {
                tracing::warn!("Catalog request failed: {}", e);
                ApiError::new(ErrorCode::UpstreamError, "Catalog request failed")
            }
            MarketError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                ApiError::internal("Storage error")
            }
            MarketError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                ApiError::internal("Server misconfigured")
            }
            MarketError::Unauthorized => ApiError::unauthorized(),
            MarketError::Db(e) => e.into(),
            MarketError::Core(e) => e.into(),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        let code = match err.code {
            VerifyErrorCode::InvalidSession => ErrorCode::ValidationError,
            VerifyErrorCode::AuthRequired => ErrorCode::Unauthorized,
            VerifyErrorCode::NotAuthorized => ErrorCode::Forbidden,
            VerifyErrorCode::PaymentNotCompleted | VerifyErrorCode::MissingPaymentIntent => {
                ErrorCode::PaymentError
            }
            VerifyErrorCode::MissingItems => ErrorCode::BusinessLogic,
            VerifyErrorCode::Database => ErrorCode::DatabaseError,
            VerifyErrorCode::Unknown => ErrorCode::Internal,
        };
        ApiError::new(code, err.message).with_reason(err.code.as_str())
    }
}

impl From<CreateSessionError> for ApiError {
    fn from(err: CreateSessionError) -> Self {
        let code = match err.code {
            CreateSessionErrorCode::AuthRequired => ErrorCode::Unauthorized,
            CreateSessionErrorCode::EmptyCart => ErrorCode::CartError,
            CreateSessionErrorCode::SelfPurchase => ErrorCode::BusinessLogic,
            CreateSessionErrorCode::ProductNotFound => ErrorCode::NotFound,
            CreateSessionErrorCode::Payment => ErrorCode::UpstreamError,
        };
        ApiError::new(code, err.message).with_reason(err.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization() {
        let err = ApiError::not_found("Category", "phones");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Category not found: phones");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_db_errors_hide_details() {
        let err: ApiError = DbError::QueryFailed("near \"SELEC\": syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_self_purchase_maps_to_business_logic() {
        let err: ApiError = CoreError::SelfPurchase {
            product_id: "p1".into(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.reason.as_deref(), Some("selfPurchase"));
    }

    #[test]
    fn test_verify_error_mapping() {
        let err: ApiError = VerifyError::new(VerifyErrorCode::NotAuthorized).into();
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert_eq!(err.reason.as_deref(), Some("notAuthorized"));

        let err: ApiError = VerifyError::new(VerifyErrorCode::PaymentNotCompleted).into();
        assert_eq!(err.code.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_market_error_mapping() {
        let err: ApiError = MarketError::Payment("card_declined".into()).into();
        assert_eq!(err.code, ErrorCode::UpstreamError);
        assert!(!err.message.contains("card_declined"));

        let err: ApiError = MarketError::Unauthorized.into();
        assert_eq!(err.code.status(), StatusCode::UNAUTHORIZED);
    }
}
