// Moderation domain models - data structures for the decision pipeline.
//
// These are pure domain types with no platform dependencies.
// The host bot converts platform events into a `MessageEvent` and maps the
// resulting penalties back onto platform actions through the sink.

use super::sink::SideEffectOutcome;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// Permissions the acting member holds, as far as moderation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Message management - bypasses the whole pipeline
    ManageMessages,
    Administrator,
    ModerateMembers,
}

/// One incoming message, as handed over by the host process.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// `None` for DMs and other channels with no guild association
    pub guild_id: Option<u64>,
    pub user_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub body: String,
    /// Distinct user mentions in the message
    pub user_mentions: u32,
    /// Distinct role mentions in the message
    pub role_mentions: u32,
    /// Roles the author holds (for the ignored-roles exception list)
    pub actor_roles: HashSet<u64>,
    pub capabilities: HashSet<Capability>,
    pub is_bot_author: bool,
}

/// Which rule family produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    SpamProtection,
    ProfanityFilter,
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleCategory::SpamProtection => write!(f, "SpamProtection"),
            RuleCategory::ProfanityFilter => write!(f, "ProfanityFilter"),
        }
    }
}

/// A single detected infraction. At most one per message.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub category: RuleCategory,
    /// Human-readable reason shown to the actor and the audit log
    pub reason: String,
}

/// What the escalation machine decided to do about an infraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Penalty {
    /// Warn the actor, carrying the new consecutive-infraction count
    Warn { count: u32 },
    /// Third strike - communication timeout
    Timeout { duration: Duration },
}

impl std::fmt::Display for Penalty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Penalty::Warn { count } => write!(f, "warn {}/3", count),
            Penalty::Timeout { duration } => write!(f, "timeout {}m", duration.as_secs() / 60),
        }
    }
}

/// Write-only record of one enforcement, sent to the guild's log channel.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub rule: RuleCategory,
    pub user_id: u64,
    pub channel_id: u64,
    pub reason: String,
    pub penalty: Penalty,
    pub timestamp: DateTime<Utc>,
    /// Per-side-effect success/failure, so silent failures stay observable
    pub diagnostics: Vec<SideEffectOutcome>,
}

/// Sliding-window bookkeeping for one `(guild, user)` pair.
///
/// Created lazily on first message, mutated with plain read-modify-write.
/// Two interleaved messages from the same actor may under-count a flood;
/// that's acceptable for a heuristic, and append/prune on bounded sequences
/// stays structurally sound under last-write-wins.
#[derive(Debug, Clone)]
pub struct ActorState {
    /// Message instants inside the trailing flood window, oldest first
    pub recent_timestamps: VecDeque<DateTime<Utc>>,
    /// Last few message bodies, for duplicate detection
    pub recent_texts: VecDeque<String>,
    /// Consecutive infractions; resets to 0 on the third strike
    pub warn_count: u32,
    /// Last time this actor touched the pipeline (drives store eviction)
    pub last_seen: DateTime<Utc>,
}

impl ActorState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            recent_timestamps: VecDeque::new(),
            recent_texts: VecDeque::new(),
            warn_count: 0,
            last_seen: now,
        }
    }
}
