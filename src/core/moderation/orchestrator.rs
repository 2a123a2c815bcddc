// Moderation orchestrator - sequences the pipeline for one message.
//
// Control flow per message: resolve the guild policy, short-circuit on the
// bypasses, run the spam heuristics first (first violation wins), fall back
// to the lexicon, and convert any violation into delete + escalation + an
// audit record. At most one rule category fires per message.

use super::escalation::EscalationEngine;
use super::lexicon::{LexiconMatcher, Verdict};
use super::moderation_models::{
    ActorState, AuditRecord, Capability, MessageEvent, RuleCategory, Violation,
};
use super::rate_guard::RateGuard;
use super::sink::{ModerationSink, SideEffectOutcome};
use crate::core::policy::{CacheStore, OverrideStore, Policy, PolicyResolver};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

// ============================================================================
// ACTOR STATE PORT
// ============================================================================

/// Storage for per-actor sliding-window state.
///
/// Owned by the orchestrator and injected at construction. Load/save is
/// plain read-modify-write with last-write-wins semantics; implementations
/// are expected to evict actors that have been at rest for a while (see
/// `InMemoryActorStore` in infra) instead of growing without bound.
#[async_trait]
pub trait ActorStateStore: Send + Sync {
    /// The actor's current state, created lazily on first sight.
    async fn load(&self, guild_id: u64, user_id: u64, now: DateTime<Utc>) -> ActorState;

    /// Persist the state back, replacing whatever is there.
    async fn save(&self, guild_id: u64, user_id: u64, state: ActorState);
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct ModerationOrchestrator<O: OverrideStore, C: CacheStore, A: ActorStateStore> {
    resolver: PolicyResolver<O, C>,
    actors: A,
    lexicon: LexiconMatcher,
    escalation: EscalationEngine,
    sink: Arc<dyn ModerationSink>,
}

impl<O: OverrideStore, C: CacheStore, A: ActorStateStore> ModerationOrchestrator<O, C, A> {
    pub fn new(
        resolver: PolicyResolver<O, C>,
        actors: A,
        lexicon: LexiconMatcher,
        sink: Arc<dyn ModerationSink>,
    ) -> Self {
        Self {
            resolver,
            actors,
            lexicon,
            escalation: EscalationEngine::new(Arc::clone(&sink)),
            sink,
        }
    }

    /// Settings access for the host's configuration commands.
    pub fn resolver(&self) -> &PolicyResolver<O, C> {
        &self.resolver
    }

    /// Evaluate one message. Returns `true` when the message was suppressed
    /// and a penalty was issued, `false` when it passed through untouched.
    pub async fn enforce(&self, event: &MessageEvent) -> bool {
        let guild_id = match event.guild_id {
            Some(id) => id,
            None => return false,
        };
        if event.is_bot_author {
            return false;
        }

        let policy = self.resolver.get_guild_settings(guild_id).await;
        if !policy.enabled {
            return false;
        }
        if policy.ignored_channels.contains(&event.channel_id) {
            return false;
        }
        if event.actor_roles.iter().any(|r| policy.ignored_roles.contains(r)) {
            return false;
        }
        // Members who can manage messages moderate themselves.
        if event.capabilities.contains(&Capability::ManageMessages)
            || event.capabilities.contains(&Capability::Administrator)
        {
            return false;
        }

        let now = Utc::now();
        let mut state: Option<ActorState> = None;
        let mut violation: Option<Violation> = None;

        if policy.spam_protection {
            let mut actor = self.actors.load(guild_id, event.user_id, now).await;
            violation = RateGuard::evaluate(&mut actor, now, event);
            state = Some(actor);
        }

        if violation.is_none() && policy.profanity_filter {
            violation = match self.lexicon.classify(&event.body, true) {
                Verdict::CoreHit(_) => Some(Violation {
                    category: RuleCategory::ProfanityFilter,
                    reason: "Inappropriate language".to_string(),
                }),
                Verdict::SlurHit(_) => Some(Violation {
                    category: RuleCategory::ProfanityFilter,
                    reason: "Slurs are not tolerated".to_string(),
                }),
                Verdict::Clean => None,
            };
        }

        let Some(violation) = violation else {
            // Window/history updates stick even when nothing fired.
            if let Some(actor) = state {
                self.actors.save(guild_id, event.user_id, actor).await;
            }
            return false;
        };

        let mut actor = match state {
            Some(actor) => actor,
            // Lexicon-only path: the warn counter still lives in actor state.
            None => self.actors.load(guild_id, event.user_id, now).await,
        };

        let mut diagnostics = vec![SideEffectOutcome::capture(
            "delete_message",
            self.sink
                .delete_message(event.channel_id, event.message_id)
                .await,
        )];

        let (penalty, mut escalation_outcomes) = self
            .escalation
            .escalate(guild_id, &mut actor, event, &violation)
            .await;
        diagnostics.append(&mut escalation_outcomes);

        self.actors.save(guild_id, event.user_id, actor).await;

        let record = AuditRecord {
            rule: violation.category,
            user_id: event.user_id,
            channel_id: event.channel_id,
            reason: violation.reason,
            penalty,
            timestamp: now,
            diagnostics,
        };
        self.emit_audit(&policy, event, &record).await;

        true
    }

    /// Send the audit record to the configured log channel, falling back to
    /// the originating channel when none is configured or it no longer
    /// resolves. The send itself is best-effort.
    async fn emit_audit(&self, policy: &Policy, event: &MessageEvent, record: &AuditRecord) {
        let target = match policy.log_channel {
            Some(configured) => match self.sink.fetch_channel(configured).await {
                Ok(Some(channel)) => channel,
                Ok(None) => event.channel_id,
                Err(e) => {
                    tracing::warn!(channel = configured, "Log channel lookup failed: {}", e);
                    event.channel_id
                }
            },
            None => event.channel_id,
        };

        if let Err(e) = self
            .sink
            .send_channel_message(target, &format_audit(record))
            .await
        {
            tracing::warn!("Failed to send audit record: {}", e);
        }
    }
}

fn format_audit(record: &AuditRecord) -> String {
    let mut line = format!(
        "🛡️ **{}** | <@{}> in <#{}> | {} | {}",
        record.rule, record.user_id, record.channel_id, record.reason, record.penalty
    );

    let failed: Vec<&str> = record
        .diagnostics
        .iter()
        .filter(|o| !o.ok)
        .map(|o| o.effect)
        .collect();
    if !failed.is_empty() {
        line.push_str(&format!(" | failed: {}", failed.join(", ")));
    }
    line
}

// ============================================================================
// TESTS
// ============================================================================
