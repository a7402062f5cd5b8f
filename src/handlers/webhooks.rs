//! # Webhook Handlers
//!
//! GitLab push hooks enter here. The shared token is verified, the hook is normalized
//! into a [`RepoInfo`], and the sync runs on a background task so GitLab gets its answer
//! right away. A failed sync hands the raw hook to the [`Redeliverer`], when one is
//! configured.
//!
//! [`Redeliverer`]: crate::redelivery::Redeliverer

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Account, RepoInfo};
use crate::error::ApiError;
use crate::server::AppState;
use crate::telemetry::{TraceContext, with_trace_context};

pub const TOKEN_HEADER: &str = "X-Gitlab-Token";
pub const EVENT_HEADER: &str = "X-Gitlab-Event";
pub const EVENT_UUID_HEADER: &str = "X-Gitlab-Event-UUID";

const ACCEPTED_EVENTS: [&str; 2] = ["Push Hook", "System Hook"];
const PUSH_KIND: &str = "push";

/// Webhook accept response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAcceptResponse {
    /// `accepted` when a sync was scheduled, `ignored` otherwise
    pub status: String,
}

impl WebhookAcceptResponse {
    fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }

    fn ignored() -> Self {
        Self {
            status: "ignored".to_string(),
        }
    }
}

/// Fields of a GitLab push (or system push) hook the service reads.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GitLabPushHook {
    /// `push` for project push hooks
    #[serde(default)]
    pub object_kind: Option<String>,
    /// `push` for system hooks
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub project: Option<GitLabProject>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GitLabProject {
    pub name: String,
    /// Owner of the project
    pub namespace: String,
}

impl GitLabPushHook {
    fn is_push(&self) -> bool {
        self.object_kind
            .as_deref()
            .or(self.event_name.as_deref())
            .is_some_and(|kind| kind == PUSH_KIND)
    }

    /// Normalize into the orchestrator's input.
    pub fn repo_info(&self) -> Result<RepoInfo, ApiError> {
        let (Some(project_id), Some(project)) = (self.project_id, self.project.as_ref()) else {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "push hook is missing project_id or project",
            ));
        };

        let owner = Account::new(project.namespace.as_str())?;
        Ok(RepoInfo::new(owner, project_id.to_string(), project.name.as_str())?)
    }
}

fn verify_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        warn!("GitLab webhook token is not configured; rejecting hook");
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "WEBHOOK_NOT_CONFIGURED",
            "GitLab webhook verification is not configured",
        ));
    };

    let provided = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "missing X-Gitlab-Token header",
            )
        })?;

    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "invalid webhook token",
        ))
    }
}

/// Receive a GitLab push hook and schedule a sync of the pushed repository.
#[utoipa::path(
    post,
    path = "/webhooks/gitlab",
    params(
        ("X-Gitlab-Token" = String, Header, description = "Shared webhook secret"),
        ("X-Gitlab-Event" = String, Header, description = "`Push Hook` or `System Hook`"),
        ("X-Gitlab-Event-UUID" = Option<String>, Header, description = "Delivery ID, used as the trace ID"),
    ),
    request_body(content = GitLabPushHook, description = "GitLab push hook payload", content_type = "application/json"),
    responses(
        (status = 202, description = "Sync scheduled", body = WebhookAcceptResponse),
        (status = 200, description = "Event ignored", body = WebhookAcceptResponse),
        (status = 400, description = "Malformed hook, invalid owner or unknown repo type", body = ApiError),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 503, description = "Webhook token not configured", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn gitlab_push_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAcceptResponse>), ApiError> {
    verify_token(&headers, state.config.webhook_gitlab_token.as_deref())?;

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "missing X-Gitlab-Event header",
            )
        })?;

    if !ACCEPTED_EVENTS.contains(&event) {
        debug!(event, "Ignoring GitLab event");
        return Ok((StatusCode::OK, Json(WebhookAcceptResponse::ignored())));
    }

    let hook: GitLabPushHook = serde_json::from_slice(&body).map_err(|err| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_BODY",
            format!("malformed push hook: {err}"),
        )
    })?;

    if !hook.is_push() {
        debug!(event, "Ignoring non-push GitLab hook");
        return Ok((StatusCode::OK, Json(WebhookAcceptResponse::ignored())));
    }

    let info = hook.repo_info()?;

    let trace_id = headers
        .get(EVENT_UUID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        repo = %info.key(),
        repo_name = %info.repo_name,
        trace_id = %trace_id,
        "Scheduling repository sync"
    );

    let orchestrator = state.orchestrator.clone();
    let redeliverer = state.redeliverer.clone();
    let body = body.to_vec();

    tokio::spawn(with_trace_context(TraceContext { trace_id }, async move {
        if orchestrator.sync_repo(&info).await.is_ok() {
            return;
        }

        match redeliverer {
            Some(redeliverer) => {
                if let Err(err) = redeliverer.redeliver(body).await {
                    error!(repo = %info.key(), error = %err, "Failed to re-deliver push hook");
                }
            }
            None => warn!(repo = %info.key(), "Sync failed and no redelivery endpoint is configured"),
        }
    }));

    Ok((StatusCode::ACCEPTED, Json(WebhookAcceptResponse::accepted())))
}
