//! Content-frame navigation engine.
//!
//! A [`Frame`] shows one piece of content at a time and moves between
//! locations. It keeps a back history, caches loaded content by
//! location, asks its child frames and observers whether a navigation
//! may proceed, runs at most one load at a time and raises navigation
//! events in a fixed order.
//!
//! The engine never fetches or renders anything itself. Hosts supply a
//! [`ContentLoader`], a [`FrameLocator`] describing the frame tree, and
//! a single-threaded executor on which load continuations run.

pub mod cache;
pub mod content;
pub mod events;
pub mod frame;
pub mod history;
pub mod link;
pub mod locator;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::ContentCache;
pub use content::{Content, ContentLoader, ContentRef, Displayed, LoadFailure, LoadResult};
pub use events::{
    FailureHandling, FragmentNavigationArgs, FrameId, FrameObserver, FrameState, NavigatedArgs,
    NavigatingArgs, NavigationDecision, NavigationFailedArgs, NavigationOutcome, NavigationType,
    OperationId, SubscriptionId,
};
pub use frame::{Frame, FrameHost, WeakFrame};
pub use history::HistoryStack;
pub use link::{ExternalOpener, FrameCommand, LinkNavigator, LinkOutcome, LogOpener};
pub use locator::{FrameLocator, FrameTree, TARGET_PARENT, TARGET_SELF, TARGET_TOP};
pub use registry::FrameRegistry;
