//! Non-owning registry of child frames.
//!
//! A frame lists the frames discovered below it in the host tree so it
//! can ask them whether its own navigation may proceed. Entries are
//! weak: listing a frame never keeps it alive. Each traversal validates
//! every entry against a structural predicate supplied by the caller
//! and drops dead or detached entries on the spot.

use crate::frame::{Frame, WeakFrame};

#[derive(Debug, Default)]
pub struct FrameRegistry {
    children: Vec<WeakFrame>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live children for which `is_child` holds, in registration order.
    /// Every other entry is pruned.
    pub fn resolve(&mut self, mut is_child: impl FnMut(&Frame) -> bool) -> Vec<Frame> {
        let mut live = Vec::with_capacity(self.children.len());
        self.children.retain(|entry| match entry.upgrade() {
            Some(frame) if is_child(&frame) => {
                live.push(frame);
                true
            },
            Some(frame) => {
                log::trace!("pruning detached child {}", frame.id());
                false
            },
            None => {
                log::trace!("pruning dropped child frame");
                false
            },
        });
        live
    }

    /// Add `child` unless it is already a validated entry. Returns
    /// whether it was added.
    pub fn register(&mut self, child: &Frame, is_child: impl FnMut(&Frame) -> bool) -> bool {
        if self.resolve(is_child).iter().any(|f| f == child) {
            return false;
        }
        self.children.push(child.downgrade());
        true
    }

    /// Number of entries, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
