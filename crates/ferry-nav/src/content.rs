//! Content and content-loader contracts.
//!
//! The engine treats content as opaque. It only calls the optional
//! lifecycle hooks of [`Content`] and asks it whether it wants to be
//! cached. Loading is delegated to a host-supplied [`ContentLoader`].

use std::fmt;
use std::rc::Rc;

use ferry_types::Location;
use futures::future::LocalBoxFuture;
use tokio_util::sync::CancellationToken;

use crate::events::{FragmentNavigationArgs, NavigatedArgs, NavigatingArgs, NavigationDecision};

/// Loaded content. All hooks are optional; the defaults do nothing.
pub trait Content: fmt::Debug {
    /// Per-content retention override. `None` defers to the frame's
    /// keep-alive setting.
    fn keep_alive(&self) -> Option<bool> {
        None
    }

    /// The frame showing this content (or an ancestor of it) is about to
    /// navigate away.
    fn on_navigating_from(&self, _args: &NavigatingArgs) -> NavigationDecision {
        NavigationDecision::Proceed
    }

    /// This content is being replaced.
    fn on_navigated_from(&self, _args: &NavigatedArgs) {}

    /// This content has become the displayed content.
    fn on_navigated_to(&self, _args: &NavigatedArgs) {}

    /// A fragment of this content has been navigated to.
    fn on_fragment_navigation(&self, _args: &FragmentNavigationArgs) {}
}

/// Shared handle to loaded content.
pub type ContentRef = Rc<dyn Content>;

/// Why a load did not produce content.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    /// The loader observed its cancellation handle. Never reported.
    #[error("load cancelled")]
    Cancelled,

    /// Loader-defined error. Reported through `NavigationFailed`.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type LoadResult = std::result::Result<ContentRef, LoadFailure>;

/// Host capability that turns a location into content.
///
/// Called once per load operation; implementations must not assume any
/// caching on their side. `cancel` is triggered when the frame starts a
/// newer load or is dropped. Honouring it is optional: the frame
/// discards superseded results regardless.
pub trait ContentLoader {
    fn load_content(
        &self,
        location: &Location,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, LoadResult>;
}

impl<F> ContentLoader for F
where
    F: Fn(&Location, CancellationToken) -> LocalBoxFuture<'static, LoadResult>,
{
    fn load_content(
        &self,
        location: &Location,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, LoadResult> {
        self(location, cancel)
    }
}

/// What a frame is currently showing.
#[derive(Debug, Clone, Default)]
pub enum Displayed {
    /// Nothing: initial state, or a failure an observer handled.
    #[default]
    Empty,
    /// Successfully loaded content.
    Content(ContentRef),
    /// An unhandled load failure, shown in place of content.
    Error(Rc<anyhow::Error>),
}

impl Displayed {
    pub fn content(&self) -> Option<&ContentRef> {
        match self {
            Displayed::Content(content) => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Rc<anyhow::Error>> {
        match self {
            Displayed::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Displayed::Empty)
    }
}
