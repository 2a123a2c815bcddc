// Moderation infra - actor-state storage.

pub mod actor_store;

pub use actor_store::*;
