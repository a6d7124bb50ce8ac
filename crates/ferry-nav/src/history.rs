//! Per-frame back-navigation history.

use ferry_types::Location;

/// Stack of previously visited locations.
///
/// Entries are pushed when a `New` navigation commits to loading (before
/// the load is known to succeed) and popped only by a back-navigation
/// that passed its cancellation check.
#[derive(Debug, Default, Clone)]
pub struct HistoryStack {
    entries: Vec<Location>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a location as the most recent entry.
    pub fn push(&mut self, location: Location) {
        self.entries.push(location);
    }

    /// Remove and return the most recent entry.
    pub fn pop(&mut self) -> Option<Location> {
        self.entries.pop()
    }

    /// The most recent entry, without removing it.
    pub fn peek(&self) -> Option<&Location> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.iter().rev()
    }
}
