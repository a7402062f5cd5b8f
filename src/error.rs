//! # Error Handling
//!
//! Two layers of errors live here. [`SyncError`] is the domain error produced by the
//! orchestrator and its collaborators. [`ApiError`] is the problem+json response returned
//! by the webhook endpoint, with trace ID propagation.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Errors raised while gating, executing and finalizing a repository sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid account: {0:?}")]
    InvalidIdentity(String),
    #[error("unknown repo type: {0:?}")]
    UnknownRepoType(String),
    #[error("repository {repo} is already syncing")]
    AlreadySyncing { repo: String },
    /// Internal signal from the RepoSync store: no row exists for the key yet.
    #[error("repo sync record not found")]
    NotFound,
    #[error("repo sync record changed concurrently (expected version {version})")]
    ConcurrentUpdateConflict { version: i32 },
    #[error("repo sync record was created concurrently")]
    DuplicateCreate,
    #[error("platform query failed: {0}")]
    PlatformQueryFailure(String),
    #[error("external transfer tool failed: {0}")]
    ExternalToolFailure(String),
    #[error("object store operation failed: {0}")]
    ObjectStoreFailure(String),
    #[error("failed to persist final sync state: {0}")]
    FinalizeFailure(#[source] Box<SyncError>),
    #[error("invalid repo sync record: {0}")]
    InvalidRecord(String),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Whether the error means another attempt owns (or just won) the repository.
    pub fn is_lost_race(&self) -> bool {
        matches!(
            self,
            SyncError::ConcurrentUpdateConflict { .. } | SyncError::DuplicateCreate
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidIdentity(_) => "invalid_identity",
            SyncError::UnknownRepoType(_) => "unknown_repo_type",
            SyncError::AlreadySyncing { .. } => "already_syncing",
            SyncError::NotFound => "not_found",
            SyncError::ConcurrentUpdateConflict { .. } => "concurrent_update_conflict",
            SyncError::DuplicateCreate => "duplicate_create",
            SyncError::PlatformQueryFailure(_) => "platform_query_failure",
            SyncError::ExternalToolFailure(_) => "external_tool_failure",
            SyncError::ObjectStoreFailure(_) => "object_store_failure",
            SyncError::FinalizeFailure(_) => "finalize_failure",
            SyncError::InvalidRecord(_) => "invalid_record",
            SyncError::Database(_) => "database",
            SyncError::Io(_) => "io",
        }
    }
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract the current delivery trace ID (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        let (status, code) = match &error {
            SyncError::InvalidIdentity(_) | SyncError::UnknownRepoType(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            SyncError::AlreadySyncing { .. }
            | SyncError::ConcurrentUpdateConflict { .. }
            | SyncError::DuplicateCreate => (StatusCode::CONFLICT, "CONFLICT"),
            SyncError::PlatformQueryFailure(_)
            | SyncError::ExternalToolFailure(_)
            | SyncError::ObjectStoreFailure(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            _ => {
                tracing::error!(error = ?error, "Internal sync error");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                );
            }
        };

        Self::new(status, code, error.to_string())
            .with_details(serde_json::json!({ "kind": error.kind() }))
    }
}

/// Whether a database error is a unique-constraint violation on any supported backend.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const MYSQL_DUPLICATE_CODES: &[&str] = &["1022", "1062", "1169", "1586"];
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_error.code() {
        let code_str = code.as_ref();
        if code_str == PG_UNIQUE
            || MYSQL_DUPLICATE_CODES.contains(&code_str)
            || SQLITE_DUPLICATE_CODES.contains(&code_str)
        {
            return true;
        }
    }

    false
}
