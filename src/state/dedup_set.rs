//! Insertion-ordered identifier set with count and age caps
//!
//! Used by the crawl scheduler to remember which item identifiers an entity's
//! earlier trials already delivered.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A capacity-bounded, insertion-ordered set of identifiers
///
/// Two independent caps apply: a maximum element count and a maximum age per
/// element. A zero value disables the corresponding cap. When an insertion
/// pushes the set past either cap, the oldest entries (by insertion order) are
/// evicted first.
///
/// Not safe for concurrent writers; callers keep a single writer at a time.
#[derive(Debug, Clone)]
pub struct BoundedDedupSet {
    max_elements: usize,
    max_age: Option<Duration>,
    order: VecDeque<(String, Instant)>,
    members: HashMap<String, Instant>,
}

impl BoundedDedupSet {
    /// Creates a new set
    ///
    /// # Arguments
    ///
    /// * `max_elements` - Maximum number of identifiers kept (0 = unbounded)
    /// * `max_age` - Maximum lifetime of an identifier (zero = unbounded)
    pub fn new(max_elements: usize, max_age: Duration) -> Self {
        Self {
            max_elements,
            max_age: (!max_age.is_zero()).then_some(max_age),
            order: VecDeque::new(),
            members: HashMap::new(),
        }
    }

    /// Creates a set with neither cap
    pub fn unbounded() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Adds an identifier, returning true if it was not already present
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.add_at(id, Instant::now())
    }

    /// Adds an identifier as of `now`
    pub fn add_at(&mut self, id: impl Into<String>, now: Instant) -> bool {
        let id = id.into();
        self.purge_expired(now);

        if self.members.contains_key(&id) {
            return false;
        }

        self.members.insert(id.clone(), now);
        self.order.push_back((id, now));

        if self.max_elements > 0 {
            while self.order.len() > self.max_elements {
                self.evict_oldest();
            }
        }

        true
    }

    /// Returns true if the identifier is present and not expired
    pub fn contains(&self, id: &str) -> bool {
        self.contains_at(id, Instant::now())
    }

    /// Returns true if the identifier is present and not expired as of `now`
    pub fn contains_at(&self, id: &str, now: Instant) -> bool {
        match self.members.get(id) {
            Some(inserted) => !self.is_expired(*inserted, now),
            None => false,
        }
    }

    /// Drops every entry older than the age cap
    pub fn purge_expired(&mut self, now: Instant) {
        while let Some((_, inserted)) = self.order.front() {
            if !self.is_expired(*inserted, now) {
                break;
            }
            self.evict_oldest();
        }
    }

    /// Number of identifiers currently held
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn is_expired(&self, inserted: Instant, now: Instant) -> bool {
        match self.max_age {
            Some(max_age) => now.saturating_duration_since(inserted) > max_age,
            None => false,
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((id, _)) = self.order.pop_front() {
            self.members.remove(&id);
        }
    }
}

impl Default for BoundedDedupSet {
    fn default() -> Self {
        Self::unbounded()
    }
}
