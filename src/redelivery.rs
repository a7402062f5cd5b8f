//! Re-delivery of push notifications whose sync failed.
//!
//! The original hook body is posted back to a configured endpoint, dressed as a GitLab
//! system hook, so the notification comes around again later.

use std::time::Duration;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::retry::RetryPolicy;

/// User agent sent with re-delivered notifications.
pub const USER_AGENT: &str = "reposync";

/// Event name re-delivered notifications are tagged with.
pub const SYSTEM_HOOK_EVENT: &str = "System Hook";

/// Attempts per notification, including the first one.
pub const REDELIVERY_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum RedeliveryError {
    #[error("redelivery request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("redelivery endpoint returned {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Posts failed notifications back to the hook endpoint.
#[derive(Debug, Clone)]
pub struct Redeliverer {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    retry: RetryPolicy,
}

impl Redeliverer {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            retry: RetryPolicy::new(REDELIVERY_ATTEMPTS, Duration::from_millis(100)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `None` when no redelivery endpoint is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.redeliver_endpoint.as_ref().map(|endpoint| {
            Self::new(
                endpoint.clone(),
                config.webhook_gitlab_token.clone().unwrap_or_default(),
            )
            .with_retry(RetryPolicy::new(
                REDELIVERY_ATTEMPTS,
                Duration::from_millis(config.retry.base_delay_ms),
            ))
        })
    }

    /// Post `body` (the raw push hook JSON) to the redelivery endpoint.
    ///
    /// Failed posts are retried; every attempt carries the same event UUID.
    pub async fn redeliver(&self, body: Vec<u8>) -> Result<(), RedeliveryError> {
        let event_uuid = Uuid::new_v4().to_string();

        self.retry
            .run("redeliver_notification", || self.post(&event_uuid, body.clone()))
            .await?;

        info!(event_uuid = %event_uuid, "Notification re-delivered");
        Ok(())
    }

    async fn post(&self, event_uuid: &str, body: Vec<u8>) -> Result<(), RedeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("X-Gitlab-Event", SYSTEM_HOOK_EVENT)
            .header("X-Gitlab-Token", &self.token)
            .header("X-Gitlab-Event-UUID", event_uuid)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RedeliveryError::Rejected { status, body });
        }
        Ok(())
    }
}
