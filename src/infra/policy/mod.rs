// Policy infra - implementations of the override and cache ports.

pub mod memory_cache;
pub mod sqlite_override_store;

pub use memory_cache::*;
pub use sqlite_override_store::*;
