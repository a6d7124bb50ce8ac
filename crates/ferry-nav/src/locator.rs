//! Frame-tree location.
//!
//! The engine does not own the host's element tree. It asks a
//! [`FrameLocator`] two questions: which frame is structurally above a
//! given frame, and which frame a link target name refers to.
//! [`FrameTree`] is a reference implementation for hosts that track
//! frames explicitly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::events::FrameId;
use crate::frame::{Frame, WeakFrame};

/// Link target naming the frame that contains the link.
pub const TARGET_SELF: &str = "_self";
/// Link target naming the parent of the frame that contains the link.
pub const TARGET_PARENT: &str = "_parent";
/// Link target naming the outermost frame.
pub const TARGET_TOP: &str = "_top";

/// Host-supplied view of the frame tree.
pub trait FrameLocator {
    /// Nearest frame structurally above `frame`, if any.
    fn parent_of(&self, frame: &Frame) -> Option<Frame>;

    /// Resolve a link target relative to `source`.
    ///
    /// `None`, empty, or [`TARGET_SELF`] resolve to `source`.
    fn find_frame(&self, target: Option<&str>, source: &Frame) -> Option<Frame>;
}

struct TreeNode {
    frame: WeakFrame,
    parent: Option<FrameId>,
}

/// Explicit parent/child bookkeeping for frames.
#[derive(Default)]
pub struct FrameTree {
    nodes: RefCell<HashMap<FrameId, TreeNode>>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `frame` below `parent` (or at the root). Re-attaching moves
    /// the frame. An unknown parent is added as a root.
    ///
    /// Returns false, leaving the tree unchanged, if `parent` is `frame`
    /// itself or one of its descendants.
    pub fn attach(&self, frame: &Frame, parent: Option<&Frame>) -> bool {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = parent {
            if is_at_or_below(&nodes, parent.id(), frame.id()) {
                log::warn!("refusing to attach {} below {}: cycle", frame.id(), parent.id());
                return false;
            }
            nodes.entry(parent.id()).or_insert_with(|| TreeNode {
                frame: parent.downgrade(),
                parent: None,
            });
        }
        nodes.insert(
            frame.id(),
            TreeNode {
                frame: frame.downgrade(),
                parent: parent.map(Frame::id),
            },
        );
        true
    }

    /// Remove `frame` and everything below it. Returns the number of
    /// frames removed.
    pub fn detach(&self, frame: &Frame) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let mut removed: HashSet<FrameId> = HashSet::new();
        if nodes.remove(&frame.id()).is_none() {
            return 0;
        }
        removed.insert(frame.id());

        loop {
            let orphans: Vec<FrameId> = nodes
                .iter()
                .filter(|(_, node)| node.parent.is_some_and(|p| removed.contains(&p)))
                .map(|(id, _)| *id)
                .collect();
            if orphans.is_empty() {
                break;
            }
            for id in orphans {
                nodes.remove(&id);
                removed.insert(id);
            }
        }
        log::debug!("detached {} frame(s) starting at {}", removed.len(), frame.id());
        removed.len()
    }

    pub fn contains(&self, frame: &Frame) -> bool {
        self.nodes.borrow().contains_key(&frame.id())
    }

    /// `frame` followed by its ancestors, nearest first.
    fn ancestors_or_self(&self, frame: &Frame) -> Vec<Frame> {
        let mut chain = vec![frame.clone()];
        let mut seen: HashSet<FrameId> = HashSet::from([frame.id()]);
        while let Some(parent) = chain.last().and_then(|f| self.parent_of(f)) {
            if !seen.insert(parent.id()) {
                log::warn!("cycle in frame tree at {}", parent.id());
                break;
            }
            chain.push(parent);
        }
        chain
    }
}

/// Whether `id` is `ancestor` or lies somewhere below it.
fn is_at_or_below(nodes: &HashMap<FrameId, TreeNode>, id: FrameId, ancestor: FrameId) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(id);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = nodes.get(&id).and_then(|node| node.parent);
    }
    false
}

impl FrameLocator for FrameTree {
    fn parent_of(&self, frame: &Frame) -> Option<Frame> {
        let nodes = self.nodes.borrow();
        let parent = nodes.get(&frame.id())?.parent?;
        nodes.get(&parent)?.frame.upgrade()
    }

    fn find_frame(&self, target: Option<&str>, source: &Frame) -> Option<Frame> {
        match target.map(str::trim) {
            None | Some("") | Some(TARGET_SELF) => Some(source.clone()),
            Some(TARGET_PARENT) => self.parent_of(source),
            Some(TARGET_TOP) => self.ancestors_or_self(source).pop(),
            Some(name) => self
                .ancestors_or_self(source)
                .into_iter()
                .find(|f| f.name() == Some(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[test]
    fn parent_of_follows_attach() {
        let h = Harness::new();
        let top = h.frame("top");
        let child = h.child_frame("child", &top);
        assert_eq!(h.tree.parent_of(&child), Some(top.clone()));
        assert_eq!(h.tree.parent_of(&top), None);
    }

    #[test]
    fn reattach_moves_frame() {
        let h = Harness::new();
        let a = h.frame("a");
        let b = h.frame("b");
        let child = h.child_frame("child", &a);
        h.tree.attach(&child, Some(&b));
        assert_eq!(h.tree.parent_of(&child), Some(b));
    }

    #[test]
    fn detach_removes_subtree() {
        let h = Harness::new();
        let top = h.frame("top");
        let mid = h.child_frame("mid", &top);
        let leaf = h.child_frame("leaf", &mid);
        assert_eq!(h.tree.detach(&mid), 2);
        assert!(!h.tree.contains(&mid));
        assert!(!h.tree.contains(&leaf));
        assert!(h.tree.contains(&top));
        assert_eq!(h.tree.parent_of(&mid), None);
        assert_eq!(h.tree.detach(&mid), 0);
    }

    #[test]
    fn find_self_parent_top() {
        let h = Harness::new();
        let top = h.frame("top");
        let mid = h.child_frame("mid", &top);
        let leaf = h.child_frame("leaf", &mid);

        assert_eq!(h.tree.find_frame(None, &leaf), Some(leaf.clone()));
        assert_eq!(h.tree.find_frame(Some(""), &leaf), Some(leaf.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_SELF), &leaf), Some(leaf.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_PARENT), &leaf), Some(mid.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_TOP), &leaf), Some(top.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_TOP), &top), Some(top.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_PARENT), &top), None);
    }

    #[test]
    fn find_named_ancestor() {
        let h = Harness::new();
        let top = h.frame("top");
        let mid = h.child_frame("mid", &top);
        let leaf = h.child_frame("leaf", &mid);

        assert_eq!(h.tree.find_frame(Some("mid"), &leaf), Some(mid));
        assert_eq!(h.tree.find_frame(Some("leaf"), &leaf), Some(leaf.clone()));
        assert_eq!(h.tree.find_frame(Some("nowhere"), &leaf), None);
    }

    #[test]
    fn attach_refuses_cycles() {
        let h = Harness::new();
        let a = h.frame("a");
        let b = h.child_frame("b", &a);
        let c = h.child_frame("c", &b);

        assert!(!h.tree.attach(&a, Some(&a)));
        assert!(!h.tree.attach(&a, Some(&c)));
        assert!(!h.tree.attach(&b, Some(&c)));
        assert_eq!(h.tree.parent_of(&a), None);
        assert_eq!(h.tree.parent_of(&b), Some(a.clone()));
        assert_eq!(h.tree.find_frame(Some(TARGET_TOP), &c), Some(a.clone()));

        // Moving a subtree sideways is fine.
        let d = h.frame("d");
        assert!(h.tree.attach(&b, Some(&d)));
        assert_eq!(h.tree.find_frame(Some(TARGET_TOP), &c), Some(d));
    }
}
