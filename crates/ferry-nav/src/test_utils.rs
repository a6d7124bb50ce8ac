//! Shared test utilities for the navigation engine.
//!
//! Provides a [`Harness`] (executor, frame tree, host), a
//! [`ScriptedLoader`] whose loads can be resolved by hand, a
//! [`TestContent`] that records its lifecycle hooks, and a
//! [`RecordingObserver`] that records frame events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ferry_types::{FrameConfig, Location};
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, Either, LocalBoxFuture};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::content::{Content, ContentLoader, ContentRef, LoadFailure, LoadResult};
use crate::events::{
    FailureHandling, FragmentNavigationArgs, FrameId, FrameObserver, NavigatedArgs,
    NavigatingArgs, NavigationDecision, NavigationFailedArgs, NavigationType,
};
use crate::frame::{Frame, FrameHost};
use crate::locator::{FrameLocator, FrameTree};

pub fn loc(s: &str) -> Location {
    Location::parse(s).unwrap()
}

// -----------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------

pub struct Harness {
    pub pool: LocalPool,
    pub tree: Rc<FrameTree>,
    pub host: FrameHost,
    pub loader: Rc<ScriptedLoader>,
}

impl Harness {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let tree = Rc::new(FrameTree::new());
        let locator: Rc<dyn FrameLocator> = Rc::clone(&tree) as Rc<dyn FrameLocator>;
        let host = FrameHost::new(pool.spawner(), locator);
        Self {
            pool,
            tree,
            host,
            loader: Rc::new(ScriptedLoader::new()),
        }
    }

    /// A root frame using the shared scripted loader.
    pub fn frame(&self, name: &str) -> Frame {
        self.frame_with(FrameConfig::named(name))
    }

    pub fn frame_with(&self, config: FrameConfig) -> Frame {
        let loader: Rc<dyn ContentLoader> = Rc::clone(&self.loader) as Rc<dyn ContentLoader>;
        let frame = Frame::new(&self.host, config, loader).unwrap();
        self.tree.attach(&frame, None);
        frame
    }

    /// A frame attached below `parent` and registered with it.
    pub fn child_frame(&self, name: &str, parent: &Frame) -> Frame {
        let loader: Rc<dyn ContentLoader> = Rc::clone(&self.loader) as Rc<dyn ContentLoader>;
        let frame = Frame::new(&self.host, FrameConfig::named(name), loader).unwrap();
        assert!(self.tree.attach(&frame, Some(parent)));
        frame.register_with_parent();
        frame
    }

    pub fn observe(&self, frame: &Frame) -> Rc<RecordingObserver> {
        let observer = Rc::new(RecordingObserver::default());
        frame.subscribe(Rc::clone(&observer) as Rc<dyn FrameObserver>);
        observer
    }

    /// Run every ready continuation on the owning executor.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }
}

// -----------------------------------------------------------------------
// TestContent
// -----------------------------------------------------------------------

#[derive(Debug)]
pub struct TestContent {
    keep_alive: Cell<Option<bool>>,
    veto: Cell<bool>,
    events: RefCell<Vec<String>>,
}

impl TestContent {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            keep_alive: Cell::new(None),
            veto: Cell::new(false),
            events: RefCell::new(Vec::new()),
        })
    }

    pub fn set_keep_alive(&self, keep_alive: Option<bool>) {
        self.keep_alive.set(keep_alive);
    }

    pub fn set_veto(&self, veto: bool) {
        self.veto.set(veto);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl Content for TestContent {
    fn keep_alive(&self) -> Option<bool> {
        self.keep_alive.get()
    }

    fn on_navigating_from(&self, args: &NavigatingArgs) -> NavigationDecision {
        self.events
            .borrow_mut()
            .push(format!("navigating_from:{}", args.source));
        if self.veto.get() {
            NavigationDecision::Cancel
        } else {
            NavigationDecision::Proceed
        }
    }

    fn on_navigated_from(&self, args: &NavigatedArgs) {
        self.events
            .borrow_mut()
            .push(format!("navigated_from:{}", args.source));
    }

    fn on_navigated_to(&self, args: &NavigatedArgs) {
        self.events
            .borrow_mut()
            .push(format!("navigated_to:{}", args.source));
    }

    fn on_fragment_navigation(&self, args: &FragmentNavigationArgs) {
        let event = match &args.fragment {
            Some(fragment) => format!("fragment:{fragment}"),
            None => "fragment".to_string(),
        };
        self.events.borrow_mut().push(event);
    }
}

/// Whether `content` is the same allocation as `expected`.
pub fn is_content(content: Option<ContentRef>, expected: &Rc<TestContent>) -> bool {
    content.is_some_and(|c| std::ptr::addr_eq(Rc::as_ptr(&c), Rc::as_ptr(expected)))
}

// -----------------------------------------------------------------------
// ScriptedLoader
// -----------------------------------------------------------------------

pub struct PendingRequest {
    pub location: Location,
    pub token: CancellationToken,
    sender: Option<oneshot::Sender<LoadResult>>,
}

/// Loader serving scripted pages and failures.
///
/// In immediate mode each load resolves on the next executor turn. In
/// manual mode loads stay outstanding until [`ScriptedLoader::resolve`].
#[derive(Default)]
pub struct ScriptedLoader {
    pages: RefCell<HashMap<String, ContentRef>>,
    failures: RefCell<HashMap<String, String>>,
    manual: Cell<bool>,
    ignore_cancellation: Cell<bool>,
    calls: RefCell<Vec<Location>>,
    pending: RefCell<Vec<PendingRequest>>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a fresh [`TestContent`] at `path`.
    pub fn add_page(&self, path: &str) -> Rc<TestContent> {
        let content = TestContent::new();
        self.pages
            .borrow_mut()
            .insert(path.to_string(), Rc::clone(&content) as ContentRef);
        content
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.failures
            .borrow_mut()
            .insert(path.to_string(), message.to_string());
    }

    pub fn set_manual(&self, manual: bool) {
        self.manual.set(manual);
    }

    /// Manual loads ignore their token, so only the frame's operation
    /// check can discard them.
    pub fn set_ignore_cancellation(&self, ignore: bool) {
        self.ignore_cancellation.set(ignore);
    }

    pub fn calls(&self) -> Vec<Location> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn token(&self, index: usize) -> CancellationToken {
        self.pending.borrow()[index].token.clone()
    }

    /// Complete the `index`-th manual request with its scripted result.
    /// Returns false if the request was already resolved or abandoned.
    pub fn resolve(&self, index: usize) -> bool {
        let mut pending = self.pending.borrow_mut();
        let request = &mut pending[index];
        let result = self.scripted(&request.location);
        match request.sender.take() {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    fn scripted(&self, location: &Location) -> LoadResult {
        let key = location.without_fragment().as_str().to_string();
        if let Some(message) = self.failures.borrow().get(&key) {
            return Err(LoadFailure::Failed(anyhow::anyhow!("{message}")));
        }
        match self.pages.borrow().get(&key) {
            Some(content) => Ok(Rc::clone(content)),
            None => Err(anyhow::anyhow!("no page at {key}").into()),
        }
    }
}

impl ContentLoader for ScriptedLoader {
    fn load_content(
        &self,
        location: &Location,
        cancel: CancellationToken,
    ) -> LocalBoxFuture<'static, LoadResult> {
        self.calls.borrow_mut().push(location.clone());

        if !self.manual.get() {
            let result = self.scripted(location);
            return async move { result }.boxed_local();
        }

        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push(PendingRequest {
            location: location.clone(),
            token: cancel.clone(),
            sender: Some(sender),
        });

        if self.ignore_cancellation.get() {
            return async move { receiver.await.unwrap_or(Err(LoadFailure::Cancelled)) }
                .boxed_local();
        }

        async move {
            let cancelled = cancel.cancelled();
            futures::pin_mut!(cancelled);
            match future::select(receiver, cancelled).await {
                Either::Left((Ok(result), _)) => result,
                _ => Err(LoadFailure::Cancelled),
            }
        }
        .boxed_local()
    }
}

// -----------------------------------------------------------------------
// RecordingObserver
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Navigating {
        source: String,
        navigation_type: NavigationType,
        parent: bool,
    },
    Failed {
        source: String,
        error: String,
    },
    Navigated {
        source: String,
        navigation_type: NavigationType,
    },
    Fragment(Option<String>),
    Loading(bool),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<Recorded>>,
    veto: Cell<bool>,
    handle_failures: Cell<bool>,
}

impl RecordingObserver {
    pub fn set_veto(&self, veto: bool) {
        self.veto.set(veto);
    }

    pub fn set_handle_failures(&self, handle: bool) {
        self.handle_failures.set(handle);
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.borrow().clone()
    }

    /// Event kinds in order, for sequence assertions.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .map(|e| match e {
                Recorded::Navigating { .. } => "navigating",
                Recorded::Failed { .. } => "failed",
                Recorded::Navigated { .. } => "navigated",
                Recorded::Fragment(_) => "fragment",
                Recorded::Loading(true) => "loading",
                Recorded::Loading(false) => "loaded",
            })
            .collect()
    }
}

impl FrameObserver for RecordingObserver {
    fn navigating(&self, args: &NavigatingArgs) -> NavigationDecision {
        self.events.borrow_mut().push(Recorded::Navigating {
            source: args.source.to_string(),
            navigation_type: args.navigation_type,
            parent: args.is_parent_frame_navigating,
        });
        if self.veto.get() {
            NavigationDecision::Cancel
        } else {
            NavigationDecision::Proceed
        }
    }

    fn navigation_failed(&self, args: &NavigationFailedArgs) -> FailureHandling {
        self.events.borrow_mut().push(Recorded::Failed {
            source: args.source.to_string(),
            error: args.error.to_string(),
        });
        if self.handle_failures.get() {
            FailureHandling::Handled
        } else {
            FailureHandling::Unhandled
        }
    }

    fn navigated(&self, args: &NavigatedArgs) {
        self.events.borrow_mut().push(Recorded::Navigated {
            source: args.source.to_string(),
            navigation_type: args.navigation_type,
        });
    }

    fn fragment_navigation(&self, args: &FragmentNavigationArgs) {
        self.events
            .borrow_mut()
            .push(Recorded::Fragment(args.fragment.clone()));
    }

    fn loading_changed(&self, _frame: FrameId, loading: bool) {
        self.events.borrow_mut().push(Recorded::Loading(loading));
    }
}
