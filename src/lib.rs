// Moderation decision engine for a multi-tenant chat community.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, caches)
//
// The surrounding bot process owns the platform transport. It feeds one
// `MessageEvent` per incoming message into `ModerationOrchestrator::enforce`
// and supplies a `ModerationSink` for the side effects (delete / notify /
// timeout). Nothing in here knows how to talk to the chat platform.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;

pub use crate::core::moderation::{
    normalize, ActorState, ActorStateStore, AuditRecord, Capability, EscalationEngine,
    LexiconMatcher, MessageEvent, ModerationOrchestrator, ModerationSink, Penalty, RateGuard,
    RuleCategory, SideEffectOutcome, SinkError, Verdict, Violation,
};
pub use crate::core::policy::{CacheStore, OverrideStore, Policy, PolicyError, PolicyResolver};
pub use crate::infra::moderation::InMemoryActorStore;
pub use crate::infra::policy::{InMemoryCacheStore, SqliteOverrideStore};
