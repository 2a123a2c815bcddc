// Core policy module - per-guild moderation settings.
// Following the same pattern as the moderation module.

pub mod policy_models;
pub mod policy_resolver;

pub use policy_models::*;
pub use policy_resolver::*;
