// Warning escalation - consecutive infractions accumulate into a timeout.
//
// One counter per actor, shared across spam and profanity infractions: a
// caps violation followed by a profanity violation lands on the same count.

use super::moderation_models::{ActorState, MessageEvent, Penalty, Violation};
use super::sink::{ModerationSink, SideEffectOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Infractions before the timeout strike.
pub const WARNINGS_BEFORE_TIMEOUT: u32 = 3;

/// Timeout applied on the third strike.
pub const TIMEOUT_DURATION: Duration = Duration::from_secs(600);

/// Converts infractions into penalties and performs the actor-facing
/// notifications. All sink calls are best-effort: the counter advances (and
/// resets) whether or not the platform accepted the action.
pub struct EscalationEngine {
    sink: Arc<dyn ModerationSink>,
}

impl EscalationEngine {
    pub fn new(sink: Arc<dyn ModerationSink>) -> Self {
        Self { sink }
    }

    /// Record one infraction against the actor and apply the resulting
    /// penalty. Returns the penalty plus the outcome of every side effect.
    pub async fn escalate(
        &self,
        guild_id: u64,
        state: &mut ActorState,
        event: &MessageEvent,
        violation: &Violation,
    ) -> (Penalty, Vec<SideEffectOutcome>) {
        state.warn_count += 1;
        let mut outcomes = Vec::new();

        if state.warn_count >= WARNINGS_BEFORE_TIMEOUT {
            // The counter resets even if the timeout call is rejected - the
            // timeout is advisory, not required for the machine's correctness.
            state.warn_count = 0;

            outcomes.push(SideEffectOutcome::capture(
                "timeout_actor",
                self.sink
                    .timeout_actor(guild_id, event.user_id, TIMEOUT_DURATION, &violation.reason)
                    .await,
            ));

            let notice = format!(
                "🔇 <@{}> has been timed out for {} minutes: {}",
                event.user_id,
                TIMEOUT_DURATION.as_secs() / 60,
                violation.reason
            );
            outcomes.push(SideEffectOutcome::capture(
                "send_notice",
                self.sink.send_channel_message(event.channel_id, &notice).await,
            ));

            (
                Penalty::Timeout {
                    duration: TIMEOUT_DURATION,
                },
                outcomes,
            )
        } else {
            let count = state.warn_count;
            let notice = format!(
                "⚠️ <@{}> **Warning** ({}/{}): {}",
                event.user_id, count, WARNINGS_BEFORE_TIMEOUT, violation.reason
            );
            outcomes.push(SideEffectOutcome::capture(
                "send_warning",
                self.sink.send_channel_message(event.channel_id, &notice).await,
            ));

            (Penalty::Warn { count }, outcomes)
        }
    }
}
