//! Keyed content cache.
//!
//! A memoization table from fragment-stripped location to loaded
//! content. Unlike a resource cache there is no size bound and no
//! eviction: entries live until the owning frame clears the table.

use std::collections::HashMap;

use ferry_types::Location;

/// Content cache keyed by [`Location::without_fragment`].
///
/// Generic over the stored value so the frame can keep shared content
/// handles while tests use plain values.
#[derive(Debug)]
pub struct ContentCache<T> {
    entries: HashMap<Location, T>,
}

impl<T> Default for ContentCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> ContentCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up content for `location`, ignoring its fragment.
    pub fn get(&self, location: &Location) -> Option<T> {
        self.entries.get(&location.without_fragment()).cloned()
    }

    /// Store content for `location`, replacing any previous entry for
    /// the same document.
    pub fn insert(&mut self, location: &Location, content: T) {
        self.entries.insert(location.without_fragment(), content);
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.entries.contains_key(&location.without_fragment())
    }

    pub fn remove(&mut self, location: &Location) -> Option<T> {
        self.entries.remove(&location.without_fragment())
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
