// Side-effect port - how decisions reach the chat platform.
//
// Every effect is best-effort: the pipeline records the outcome and moves
// on, it never aborts because a delete or a send was rejected.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Target not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Platform side effects the orchestrator can request.
///
/// Implemented by the host bot over its platform client. Following the same
/// port pattern as the policy stores.
#[async_trait]
pub trait ModerationSink: Send + Sync {
    /// Remove the offending message.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), SinkError>;

    /// Post a notice (warning, timeout announcement, audit line) to a channel.
    async fn send_channel_message(&self, channel_id: u64, content: &str) -> Result<(), SinkError>;

    /// Apply a communication timeout to an actor.
    async fn timeout_actor(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Duration,
        reason: &str,
    ) -> Result<(), SinkError>;

    /// Resolve a configured channel id to a sendable channel, if it still exists.
    async fn fetch_channel(&self, channel_id: u64) -> Result<Option<u64>, SinkError>;
}

/// Success/failure of one side effect, collected into the audit record's
/// diagnostics so swallowed failures stay visible to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideEffectOutcome {
    pub effect: &'static str,
    pub ok: bool,
    pub detail: Option<String>,
}

impl SideEffectOutcome {
    /// Record the result of a sink call, logging failures as it goes.
    pub fn capture(effect: &'static str, result: Result<(), SinkError>) -> Self {
        match result {
            Ok(()) => Self {
                effect,
                ok: true,
                detail: None,
            },
            Err(e) => {
                tracing::warn!("Side effect {} failed: {}", effect, e);
                Self {
                    effect,
                    ok: false,
                    detail: Some(e.to_string()),
                }
            }
        }
    }
}
