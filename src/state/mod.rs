//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `BoundedDedupSet`: remembers item identifiers already delivered for an entity
//! - `EntityState`: explicit retry state of one entity in the crawl scheduler

mod dedup_set;
mod entity_state;

// Re-export main types
pub use dedup_set::BoundedDedupSet;
pub use entity_state::EntityState;
