//! Error types for billing operations.
//!
//! Every operation in the crate returns [`Result`], whose error side is the
//! single [`BillingError`] taxonomy. The variants map one-to-one onto how a
//! caller is expected to react: correct the input, pick another payment
//! method, wait and retry, or raise an operator alert.

use crate::billing::transaction::TransactionStatus;

/// The main error type for billing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Missing or malformed input. The user corrects it and resubmits.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The payment rail refused the request or is not enabled.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Illegal status change on a ledger row.
    #[error("Invalid transition for transaction {transaction_id}: {from} -> {to}")]
    InvalidTransition {
        transaction_id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// A referenced tenant, plan, transaction or session does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An identical submission is already in flight.
    #[error("Duplicate submission: {0}")]
    Duplicate(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be built.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BillingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Check if the caller can fix this by changing the request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Gateway(_) | Self::Duplicate(_) | Self::NotFound { .. }
        )
    }

    /// Check if resubmitting the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Duplicate(_) | Self::Storage(_))
    }

    /// Check if this error must reach an operator rather than only the user.
    ///
    /// Missing referenced records point at data corruption, and refused
    /// transitions point at a race or a bug in the caller.
    #[must_use]
    pub fn requires_alert(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidTransition { .. } | Self::Storage(_)
        )
    }
}

/// Result type alias for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            BillingError::Validation(format!("JSON error: {}", err))
        } else {
            BillingError::Storage(format!("JSON serialization error: {}", err))
        }
    }
}

#[cfg(feature = "api")]
mod response {
    use super::BillingError;
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde::{Deserialize, Serialize};

    /// Standard error body for API errors.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorResponse {
        pub error: String,
        pub error_id: String,
    }

    impl BillingError {
        pub(crate) fn status_code(&self) -> StatusCode {
            match self {
                Self::Validation(_) => StatusCode::BAD_REQUEST,
                Self::Gateway(_) => StatusCode::PAYMENT_REQUIRED,
                Self::InvalidTransition { .. } => StatusCode::CONFLICT,
                Self::NotFound { .. } => StatusCode::NOT_FOUND,
                Self::Duplicate(_) => StatusCode::TOO_MANY_REQUESTS,
                Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }

        /// Message that is safe to show to API clients.
        ///
        /// Backend and configuration failures are reduced to a generic
        /// message; the full text is only logged server-side.
        fn safe_message(&self) -> String {
            match self {
                Self::Storage(_) | Self::Config(_) => "Internal server error".to_string(),
                other => other.to_string(),
            }
        }
    }

    impl IntoResponse for BillingError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let error_id = uuid::Uuid::new_v4().to_string();

            if status.is_server_error() || self.requires_alert() {
                tracing::error!(
                    status = status.as_u16(),
                    error_id = %error_id,
                    error = %self,
                    "Request failed"
                );
            } else {
                tracing::debug!(
                    status = status.as_u16(),
                    error_id = %error_id,
                    error = %self,
                    "Request rejected"
                );
            }

            let body = ErrorResponse {
                error: self.safe_message(),
                error_id,
            };
            (status, Json(body)).into_response()
        }
    }
}

#[cfg(feature = "api")]
pub use response::ErrorResponse;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BillingError::not_found("tenant", "t1");
        assert_eq!(err.to_string(), "tenant not found: t1");

        let err = BillingError::InvalidTransition {
            transaction_id: "tx_1".to_string(),
            from: TransactionStatus::Completed,
            to: TransactionStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for transaction tx_1: COMPLETED -> PENDING"
        );
    }

    #[test]
    fn test_error_classification() {
        let err = BillingError::validation("proof of payment required");
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert!(!err.requires_alert());

        let err = BillingError::duplicate("already processing");
        assert!(err.is_client_error());
        assert!(err.is_retryable());

        let err = BillingError::not_found("tenant", "t1");
        assert!(err.requires_alert());

        let err = BillingError::InvalidTransition {
            transaction_id: "tx_1".to_string(),
            from: TransactionStatus::Rejected,
            to: TransactionStatus::Completed,
        };
        assert!(!err.is_client_error());
        assert!(err.requires_alert());
    }

    #[test]
    fn test_from_json_error() {
        let err: BillingError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[cfg(feature = "api")]
    #[test]
    fn test_status_codes() {
        use axum::http::StatusCode;

        assert_eq!(
            BillingError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BillingError::gateway("x").status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            BillingError::not_found("plan", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BillingError::storage("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
