//! Frame controller: the per-frame navigation state machine.
//!
//! A [`Frame`] owns a history stack, a content cache, the displayed
//! content and at most one outstanding load operation. Navigation runs
//! through four states:
//!
//! 1. `Evaluating`: the cancelable navigating check, asked of child
//!    frames (depth first), then the displayed content, then observers.
//! 2. `Loading`: the previous load is cancelled, history is updated, and
//!    content comes from the cache or from a new load operation.
//! 3. `Applying`: the result is assigned and events are raised.
//! 4. back to `Idle`.
//!
//! Everything runs on the thread that owns the [`FrameHost`] executor.
//! Load continuations are spawned on that executor, so cache, history
//! and event dispatch are never touched from another thread. A late
//! result is applied only if its operation id still matches the frame's
//! current operation.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ferry_types::{FerryError, FrameConfig, Location, Result};
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use tokio_util::sync::CancellationToken;

use crate::cache::ContentCache;
use crate::content::{ContentLoader, ContentRef, Displayed, LoadFailure, LoadResult};
use crate::events::{
    FailureHandling, FragmentNavigationArgs, FrameId, FrameObserver, FrameState, NavigatedArgs,
    NavigatingArgs, NavigationDecision, NavigationFailedArgs, NavigationOutcome, NavigationType,
    OperationId, SubscriptionId,
};
use crate::history::HistoryStack;
use crate::locator::FrameLocator;
use crate::registry::FrameRegistry;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// The owning-thread context shared by every frame of one tree: the
/// executor continuations run on, and the host's frame locator.
#[derive(Clone)]
pub struct FrameHost {
    spawner: LocalSpawner,
    locator: Rc<dyn FrameLocator>,
}

impl FrameHost {
    pub fn new(spawner: LocalSpawner, locator: Rc<dyn FrameLocator>) -> Self {
        Self { spawner, locator }
    }

    pub fn locator(&self) -> &Rc<dyn FrameLocator> {
        &self.locator
    }
}

struct PendingLoad {
    id: OperationId,
    token: CancellationToken,
}

struct FrameCore {
    source: Option<Location>,
    displayed: Displayed,
    history: HistoryStack,
    cache: ContentCache<ContentRef>,
    pending: Option<PendingLoad>,
    state: FrameState,
    loading: bool,
    keep_content_alive: bool,
    next_operation: u64,
    next_subscription: u64,
}

struct FrameInner {
    id: FrameId,
    name: Option<String>,
    host: FrameHost,
    loader: RefCell<Rc<dyn ContentLoader>>,
    core: RefCell<FrameCore>,
    children: RefCell<FrameRegistry>,
    observers: RefCell<Vec<(SubscriptionId, Rc<dyn FrameObserver>)>>,
}

impl Drop for FrameInner {
    fn drop(&mut self) {
        if let Some(pending) = self.core.get_mut().pending.take() {
            log::debug!("{}: dropped with {} outstanding", self.id, pending.id);
            pending.token.cancel();
        }
    }
}

/// Shared handle to a navigable frame.
#[derive(Clone)]
pub struct Frame {
    inner: Rc<FrameInner>,
}

/// Non-owning handle to a frame.
#[derive(Debug, Clone)]
pub struct WeakFrame {
    inner: Weak<FrameInner>,
}

impl WeakFrame {
    pub fn upgrade(&self) -> Option<Frame> {
        self.inner.upgrade().map(|inner| Frame { inner })
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Frame {
    /// Create a frame. Fails if `config` is invalid.
    pub fn new(host: &FrameHost, config: FrameConfig, loader: Rc<dyn ContentLoader>) -> Result<Self> {
        config.validate()?;
        let id = FrameId(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed));
        log::debug!("{id}: created (name: {:?})", config.name);

        Ok(Self {
            inner: Rc::new(FrameInner {
                id,
                name: config.name,
                host: host.clone(),
                loader: RefCell::new(loader),
                core: RefCell::new(FrameCore {
                    source: None,
                    displayed: Displayed::Empty,
                    history: HistoryStack::new(),
                    cache: ContentCache::new(),
                    pending: None,
                    state: FrameState::Idle,
                    loading: false,
                    keep_content_alive: config.keep_content_alive,
                    next_operation: 0,
                    next_subscription: 0,
                }),
                children: RefCell::new(FrameRegistry::new()),
                observers: RefCell::new(Vec::new()),
            }),
        })
    }

    pub fn id(&self) -> FrameId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn downgrade(&self) -> WeakFrame {
        WeakFrame {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------

    /// The current location. Set as soon as a navigation is requested;
    /// reset later if the navigation is vetoed.
    pub fn source(&self) -> Option<Location> {
        self.inner.core.borrow().source.clone()
    }

    pub fn displayed(&self) -> Displayed {
        self.inner.core.borrow().displayed.clone()
    }

    pub fn content(&self) -> Option<ContentRef> {
        self.inner.core.borrow().displayed.content().map(Rc::clone)
    }

    pub fn state(&self) -> FrameState {
        self.inner.core.borrow().state
    }

    /// True from the start of loading until the result has been applied.
    pub fn is_loading(&self) -> bool {
        self.inner.core.borrow().loading
    }

    /// History entries, most recent first.
    pub fn history(&self) -> Vec<Location> {
        self.inner.core.borrow().history.iter().cloned().collect()
    }

    pub fn can_go_back(&self) -> bool {
        !self.inner.core.borrow().history.is_empty()
    }

    pub fn can_refresh(&self) -> bool {
        self.inner.core.borrow().source.is_some()
    }

    pub fn is_cached(&self, location: &Location) -> bool {
        self.inner.core.borrow().cache.contains(location)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.core.borrow().cache.len()
    }

    pub fn keep_content_alive(&self) -> bool {
        self.inner.core.borrow().keep_content_alive
    }

    /// Change the retention policy. Any change clears the content cache
    /// at once; an in-flight load is judged against the new policy when
    /// it completes.
    pub fn set_keep_content_alive(&self, keep: bool) {
        let mut core = self.inner.core.borrow_mut();
        if core.keep_content_alive == keep {
            return;
        }
        core.keep_content_alive = keep;
        let dropped = core.cache.len();
        core.cache.clear();
        log::debug!(
            "{}: keep_content_alive = {keep}, dropped {dropped} cached entries",
            self.id()
        );
    }

    /// Replace the content loader. Cached content is kept.
    pub fn set_content_loader(&self, loader: Rc<dyn ContentLoader>) {
        *self.inner.loader.borrow_mut() = loader;
    }

    // -------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------

    pub fn subscribe(&self, observer: Rc<dyn FrameObserver>) -> SubscriptionId {
        let id = {
            let mut core = self.inner.core.borrow_mut();
            core.next_subscription += 1;
            SubscriptionId(core.next_subscription)
        };
        self.inner.observers.borrow_mut().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    fn observers(&self) -> Vec<Rc<dyn FrameObserver>> {
        self.inner
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect()
    }

    // -------------------------------------------------------------------
    // Child frames
    // -------------------------------------------------------------------

    /// Validated child frames. Entries that were dropped or are no
    /// longer structurally below this frame are pruned.
    pub fn child_frames(&self) -> Vec<Frame> {
        let locator = Rc::clone(&self.inner.host.locator);
        let id = self.id();
        self.inner
            .children
            .borrow_mut()
            .resolve(|child| locator.parent_of(child).is_some_and(|p| p.id() == id))
    }

    /// List `child` as a child frame. Returns false if already listed.
    pub fn register_child(&self, child: &Frame) -> bool {
        let locator = Rc::clone(&self.inner.host.locator);
        let id = self.id();
        let added = self
            .inner
            .children
            .borrow_mut()
            .register(child, |c| locator.parent_of(c).is_some_and(|p| p.id() == id));
        if added {
            log::debug!("{}: registered child {}", id, child.id());
        }
        added
    }

    /// Register this frame with its structural parent, if it has one.
    /// Hosts call this once the frame is part of the tree.
    pub fn register_with_parent(&self) -> bool {
        match self.inner.host.locator.parent_of(self) {
            Some(parent) => parent.register_child(self),
            None => false,
        }
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Request navigation to `location`.
    ///
    /// The source is updated immediately. Equal locations are a no-op, a
    /// fragment-only change never loads, and a vetoed navigation resets
    /// the source on the next executor turn.
    pub fn navigate(&self, location: Location) -> Result<NavigationOutcome> {
        let old = {
            let mut core = self.inner.core.borrow_mut();
            if core.source.as_ref() == Some(&location) {
                return Ok(NavigationOutcome::Unchanged);
            }
            core.source.replace(location.clone())
        };
        self.source_changed(old, location, NavigationType::New)
    }

    /// Navigate to the most recent history entry.
    ///
    /// The entry is only consumed once the navigating check approves.
    pub fn go_back(&self) -> Result<NavigationOutcome> {
        let (old, target) = {
            let core = self.inner.core.borrow();
            let Some(target) = core.history.peek().cloned() else {
                return Ok(NavigationOutcome::Unchanged);
            };
            (core.source.clone(), target)
        };

        if !self.can_navigate(old.as_ref(), &target, NavigationType::Back)? {
            return Ok(NavigationOutcome::Cancelled);
        }

        {
            let mut core = self.inner.core.borrow_mut();
            core.history.pop();
            core.source = Some(target.clone());
        }
        if old.as_ref() == Some(&target) {
            return Ok(NavigationOutcome::Unchanged);
        }
        self.source_changed(old, target, NavigationType::Back)
    }

    /// Reload the current location, bypassing the cache.
    pub fn refresh(&self) -> Result<NavigationOutcome> {
        let Some(current) = self.source() else {
            return Ok(NavigationOutcome::Unchanged);
        };
        if !self.can_navigate(Some(&current), &current, NavigationType::Refresh)? {
            return Ok(NavigationOutcome::Cancelled);
        }
        self.start_navigation(Some(current.clone()), current, NavigationType::Refresh)
    }

    // -------------------------------------------------------------------
    // State machine
    // -------------------------------------------------------------------

    fn source_changed(
        &self,
        old: Option<Location>,
        new: Location,
        navigation_type: NavigationType,
    ) -> Result<NavigationOutcome> {
        if old.as_ref().is_some_and(|old| old.same_document(&new)) {
            let fragment = new.fragment().map(str::to_string);
            self.raise_fragment_navigation(self.content(), fragment);
            return Ok(NavigationOutcome::Fragment);
        }

        if navigation_type == NavigationType::New
            && !self.can_navigate(old.as_ref(), &new, navigation_type)?
        {
            return Ok(NavigationOutcome::Cancelled);
        }

        self.start_navigation(old, new, navigation_type)
    }

    /// Run the navigating check. On a veto, schedule the source reset
    /// and return false.
    fn can_navigate(
        &self,
        old: Option<&Location>,
        new: &Location,
        navigation_type: NavigationType,
    ) -> Result<bool> {
        let previous = self.set_state(FrameState::Evaluating);
        let args = NavigatingArgs {
            frame: self.id(),
            source: new.clone(),
            navigation_type,
            is_parent_frame_navigating: false,
        };
        let decision = self.raise_navigating(&args, &mut HashSet::new());
        self.set_state(previous);

        if !decision.is_cancel() {
            return Ok(true);
        }

        log::warn!(
            "{}: {navigation_type} navigation from {} to {new} cancelled",
            self.id(),
            old.map_or("<none>", Location::as_str),
        );
        if self.source().as_ref() != old
            && let Err(err) = self.schedule_source_reset(new.clone(), old.cloned())
        {
            self.inner.core.borrow_mut().source = old.cloned();
            return Err(err);
        }
        Ok(false)
    }

    /// Ask children (depth first), then the displayed content, then
    /// observers. Stops at the first veto. Each frame is asked once even
    /// if a host locator reports a cyclic tree.
    fn raise_navigating(
        &self,
        args: &NavigatingArgs,
        visited: &mut HashSet<FrameId>,
    ) -> NavigationDecision {
        if !visited.insert(self.id()) {
            log::warn!("{}: already asked, frame tree has a cycle", self.id());
            return NavigationDecision::Proceed;
        }
        for child in self.child_frames() {
            if child.raise_navigating(args, visited).is_cancel() {
                return NavigationDecision::Cancel;
            }
        }

        let args = NavigatingArgs {
            is_parent_frame_navigating: args.frame != self.id(),
            ..args.clone()
        };

        if let Some(content) = self.content()
            && content.on_navigating_from(&args).is_cancel()
        {
            return NavigationDecision::Cancel;
        }

        for observer in self.observers() {
            if observer.navigating(&args).is_cancel() {
                return NavigationDecision::Cancel;
            }
        }
        NavigationDecision::Proceed
    }

    /// Put the pre-navigation source back on the next executor turn,
    /// unless something else has changed it meanwhile. The reset writes
    /// the field directly and never re-enters the state machine.
    fn schedule_source_reset(&self, vetoed: Location, previous: Option<Location>) -> Result<()> {
        let frame = self.downgrade();
        self.inner
            .host
            .spawner
            .spawn_local(async move {
                let Some(frame) = frame.upgrade() else {
                    return;
                };
                let mut core = frame.inner.core.borrow_mut();
                if core.source.as_ref() == Some(&vetoed) {
                    log::debug!("{}: source reset after veto of {vetoed}", frame.id());
                    core.source = previous;
                }
            })
            .map_err(|e| FerryError::Executor(e.to_string()))
    }

    fn start_navigation(
        &self,
        old: Option<Location>,
        new: Location,
        navigation_type: NavigationType,
    ) -> Result<NavigationOutcome> {
        log::debug!(
            "{}: {navigation_type} navigation from {} to {new}",
            self.id(),
            old.as_ref().map_or("<none>", Location::as_str),
        );

        let cached = {
            let mut core = self.inner.core.borrow_mut();
            core.state = FrameState::Loading;
            if let Some(previous) = core.pending.take() {
                log::debug!("{}: cancelling {}", self.id(), previous.id);
                previous.token.cancel();
            }
            if navigation_type == NavigationType::New
                && let Some(old) = old.clone()
            {
                core.history.push(old);
            }
            match navigation_type {
                NavigationType::Refresh => None,
                NavigationType::New | NavigationType::Back => core.cache.get(&new),
            }
        };
        self.set_loading(true);

        match cached {
            Some(content) => {
                log::debug!("{}: cache hit for {new}", self.id());
                self.apply_content(&new, navigation_type, content);
                Ok(NavigationOutcome::Completed)
            },
            None => self.begin_load(new.clone(), navigation_type).inspect_err(|_| {
                self.revert_navigation(old, &new, navigation_type);
            }),
        }
    }

    /// Undo the source and history changes of a navigation whose load
    /// could not be started.
    fn revert_navigation(&self, old: Option<Location>, new: &Location, navigation_type: NavigationType) {
        let mut core = self.inner.core.borrow_mut();
        match navigation_type {
            NavigationType::New => {
                if old.is_some() {
                    core.history.pop();
                }
            },
            NavigationType::Back => core.history.push(new.clone()),
            NavigationType::Refresh => {},
        }
        if core.source.as_ref() == Some(new) {
            core.source = old;
        }
        log::debug!("{}: navigation to {new} reverted", self.id());
    }

    fn begin_load(&self, location: Location, navigation_type: NavigationType) -> Result<NavigationOutcome> {
        let token = CancellationToken::new();
        let id = {
            let mut core = self.inner.core.borrow_mut();
            core.next_operation += 1;
            let id = OperationId(core.next_operation);
            core.pending = Some(PendingLoad {
                id,
                token: token.clone(),
            });
            id
        };

        let loader = Rc::clone(&self.inner.loader.borrow());
        let load = loader.load_content(&location, token);
        let frame = self.downgrade();
        log::debug!("{}: {id} started for {location}", self.id());

        let spawned = self.inner.host.spawner.spawn_local(async move {
            let result = load.await;
            match frame.upgrade() {
                Some(frame) => frame.complete_load(id, &location, navigation_type, result),
                None => log::trace!("{id}: frame dropped before the load completed"),
            }
        });

        if let Err(err) = spawned {
            {
                let mut core = self.inner.core.borrow_mut();
                core.pending = None;
                core.state = FrameState::Idle;
            }
            self.set_loading(false);
            return Err(FerryError::Executor(err.to_string()));
        }
        Ok(NavigationOutcome::Loading(id))
    }

    /// Load continuation, run on the owning executor.
    fn complete_load(
        &self,
        id: OperationId,
        location: &Location,
        navigation_type: NavigationType,
        result: LoadResult,
    ) {
        let is_current = {
            let mut core = self.inner.core.borrow_mut();
            let is_current = core
                .pending
                .as_ref()
                .is_some_and(|p| p.id == id && !p.token.is_cancelled());
            if is_current {
                core.pending = None;
                core.state = FrameState::Applying;
            }
            is_current
        };
        if !is_current {
            log::debug!("{}: discarding result of superseded {id}", self.id());
            return;
        }

        match result {
            Err(LoadFailure::Cancelled) => {
                log::debug!("{}: {id} for {location} cancelled by the loader", self.id());
                self.finish_applying();
            },
            Err(LoadFailure::Failed(error)) => self.apply_failure(location, error),
            Ok(content) => {
                let keep = content.keep_alive();
                {
                    let mut core = self.inner.core.borrow_mut();
                    if keep.unwrap_or(core.keep_content_alive) {
                        core.cache.insert(location, Rc::clone(&content));
                    }
                }
                self.apply_content(location, navigation_type, content);
            },
        }
    }

    fn apply_failure(&self, location: &Location, error: anyhow::Error) {
        self.set_state(FrameState::Applying);
        let error = Rc::new(error);
        log::warn!("{}: navigation to {location} failed: {error:#}", self.id());

        let args = NavigationFailedArgs {
            frame: self.id(),
            source: location.clone(),
            error: Rc::clone(&error),
        };
        let mut handled = false;
        for observer in self.observers() {
            if observer.navigation_failed(&args) == FailureHandling::Handled {
                handled = true;
            }
        }

        self.inner.core.borrow_mut().displayed = if handled {
            Displayed::Empty
        } else {
            Displayed::Error(error)
        };
        self.finish_applying();
    }

    fn apply_content(&self, location: &Location, navigation_type: NavigationType, content: ContentRef) {
        self.set_state(FrameState::Applying);
        let args = NavigatedArgs {
            frame: self.id(),
            source: location.clone(),
            content: Rc::clone(&content),
            navigation_type,
        };

        if let Some(previous) = self.content() {
            previous.on_navigated_from(&args);
        }
        self.inner.core.borrow_mut().displayed = Displayed::Content(Rc::clone(&content));
        content.on_navigated_to(&args);
        for observer in self.observers() {
            observer.navigated(&args);
        }
        log::info!("{}: navigated to {location} ({navigation_type})", self.id());

        if let Some(fragment) = location.fragment() {
            self.raise_fragment_navigation(Some(content), Some(fragment.to_string()));
        }
        self.finish_applying();
    }

    fn raise_fragment_navigation(&self, content: Option<ContentRef>, fragment: Option<String>) {
        let args = FragmentNavigationArgs {
            frame: self.id(),
            fragment,
        };
        log::debug!(
            "{}: fragment navigation to #{}",
            self.id(),
            args.fragment.as_deref().unwrap_or("<none>"),
        );
        if let Some(content) = content {
            content.on_fragment_navigation(&args);
        }
        for observer in self.observers() {
            observer.fragment_navigation(&args);
        }
    }

    /// Leave `Applying`. A handler may have started another load, in
    /// which case the frame stays in `Loading`.
    fn finish_applying(&self) {
        let idle = {
            let mut core = self.inner.core.borrow_mut();
            if core.pending.is_none() {
                core.state = FrameState::Idle;
                true
            } else {
                core.state = FrameState::Loading;
                false
            }
        };
        if idle {
            self.set_loading(false);
        }
    }

    fn set_state(&self, state: FrameState) -> FrameState {
        std::mem::replace(&mut self.inner.core.borrow_mut().state, state)
    }

    fn set_loading(&self, loading: bool) {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            let changed = core.loading != loading;
            core.loading = loading;
            changed
        };
        if changed {
            for observer in self.observers() {
                observer.loading_changed(self.id(), loading);
            }
        }
    }
}
