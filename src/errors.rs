//! # Error Handling
//!
//! Two classes of problems exist in this crate and they are handled very differently:
//!
//! - **Filter problems** (unknown fields, values that do not coerce, malformed tokens) never
//!   fail a request. They are reported as [`FilterWarning`]s next to the results and the
//!   offending token simply contributes no predicate.
//! - **Execution problems** (connection failures, malformed SQL, constraint violations,
//!   timeouts) are logged once at the execution boundary and surface as [`ApiError`].
//!
//! `ApiError` maps onto HTTP status codes and never exposes driver details to clients:
//!
//! ```rust,ignore
//! async fn list_orders(
//!     State(state): State<AppState>,
//!     Query(query): Query<ListQuery>,
//! ) -> Result<QueryOutput, ApiError> {
//!     state.engine.list::<Order>(&state.db, &query, &state.principal).await
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// API error type with sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from user
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 504 Gateway Timeout - the fixed command timeout elapsed
    Timeout {
        /// The ceiling that was exceeded
        seconds: u64,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// # Example
    /// ```rust,ignore
    /// let row = db.query_one(stmt).await.map_err(ApiError::database)?;
    /// ```
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Create a timeout error for a query that ran past the command ceiling
    #[must_use]
    pub const fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    /// Create a 500 Internal Server Error with optional details
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
            Self::Timeout { seconds } => format!("Query exceeded the {seconds}s command timeout"),
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Execution failures were already logged with full detail where they happened.
        tracing::debug!(
            error = %self.user_message(),
            status = %self.status_code(),
            "API error"
        );

        let body = ErrorResponse {
            error: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database { internal, .. } => Some(internal),
            _ => None,
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}

/// Why a filter or sort token contributed nothing to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No `field<op>value` shape could be found
    MalformedToken,
    /// The field is not a scalar property of the entity
    UnknownField,
    /// The value does not coerce to the property's type
    UnparseableValue,
    /// The operator makes no sense for the value (e.g. `<null`)
    UnsupportedOperator,
    /// An `order_by` entry did not resolve
    UnknownSortField,
}

impl WarningKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::UnknownField => "unknown_field",
            Self::UnparseableValue => "unparseable_value",
            Self::UnsupportedOperator => "unsupported_operator",
            Self::UnknownSortField => "unknown_sort_field",
        }
    }
}

/// A degraded filter or sort token, reported next to the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterWarning {
    /// The raw token as it appeared in the query string
    pub token: String,
    pub kind: WarningKind,
}

impl FilterWarning {
    pub fn new(token: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

impl fmt::Display for FilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.token)
    }
}
