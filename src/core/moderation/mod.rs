// Core moderation module - the per-message decision pipeline.
// Following the same pattern as the policy module.

pub mod escalation;
pub mod lexicon;
pub mod moderation_models;
pub mod normalizer;
pub mod orchestrator;
pub mod rate_guard;
pub mod sink;

pub use escalation::*;
pub use lexicon::*;
pub use moderation_models::*;
pub use normalizer::*;
pub use orchestrator::*;
pub use rate_guard::*;
pub use sink::*;
