//! Navigation event arguments, decisions, and the observer contract.
//!
//! Events are raised in a fixed order when applicable:
//! `Navigating` -> `NavigationFailed` -> `Navigated` -> `FragmentNavigation`.

use std::fmt;
use std::rc::Rc;

use ferry_types::Location;
use serde::Serialize;

use crate::content::ContentRef;

/// Process-unique frame identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId(pub(crate) u64);

impl FrameId {
    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Identity of one load operation within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OperationId(pub(crate) u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// How a navigation was initiated. Decides history and cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    /// Explicit request. Pushes history, may hit the cache.
    New,
    /// History replay. Never pushes, may hit the cache.
    Back,
    /// Reload of the current location. Never pushes, bypasses the cache.
    Refresh,
}

impl fmt::Display for NavigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationType::New => "new",
            NavigationType::Back => "back",
            NavigationType::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

/// Answer of a participant in the cancelable navigating check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationDecision {
    #[default]
    Proceed,
    Cancel,
}

impl NavigationDecision {
    pub fn is_cancel(self) -> bool {
        self == NavigationDecision::Cancel
    }
}

/// Answer of an observer to a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureHandling {
    /// The observer dealt with the failure; the frame shows nothing.
    Handled,
    /// The frame shows the error in place of content.
    #[default]
    Unhandled,
}

/// Where a frame is in its navigation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    /// Running the cancelable navigating check.
    Evaluating,
    /// A load operation is outstanding.
    Loading,
    /// Assigning the result and raising events.
    Applying,
}

/// Arguments of the cancelable `Navigating` check.
#[derive(Debug, Clone)]
pub struct NavigatingArgs {
    /// The frame that is navigating.
    pub frame: FrameId,
    /// Target location.
    pub source: Location,
    pub navigation_type: NavigationType,
    /// True when the receiver is a descendant of the navigating frame.
    pub is_parent_frame_navigating: bool,
}

/// Arguments of the `Navigated` event and the content navigation hooks.
#[derive(Debug, Clone)]
pub struct NavigatedArgs {
    pub frame: FrameId,
    pub source: Location,
    pub content: ContentRef,
    pub navigation_type: NavigationType,
}

/// Failure report raised when a load fails.
#[derive(Debug, Clone)]
pub struct NavigationFailedArgs {
    pub frame: FrameId,
    pub source: Location,
    pub error: Rc<anyhow::Error>,
}

/// Arguments of the `FragmentNavigation` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNavigationArgs {
    pub frame: FrameId,
    /// `None` when the fragment was removed. An empty string is the
    /// explicit empty fragment (`L#`).
    pub fragment: Option<String>,
}

/// Result of a navigation request, known synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Requested location is already current, or there was nothing to do.
    Unchanged,
    /// Only the fragment changed; no load happened.
    Fragment,
    /// A participant vetoed the navigation.
    Cancelled,
    /// Content was applied synchronously from the cache.
    Completed,
    /// A load operation was started.
    Loading(OperationId),
}

/// Host observer of a frame's navigation events.
///
/// Every method has a default, so observers implement only what they
/// watch. Methods are called on the owning thread with no frame state
/// borrowed, so they may call back into the frame.
pub trait FrameObserver {
    fn navigating(&self, _args: &NavigatingArgs) -> NavigationDecision {
        NavigationDecision::Proceed
    }

    fn navigation_failed(&self, _args: &NavigationFailedArgs) -> FailureHandling {
        FailureHandling::Unhandled
    }

    fn navigated(&self, _args: &NavigatedArgs) {}

    fn fragment_navigation(&self, _args: &FragmentNavigationArgs) {}

    fn loading_changed(&self, _frame: FrameId, _loading: bool) {}
}

/// Handle returned by `Frame::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
