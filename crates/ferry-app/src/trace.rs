//! Event tracing for scripted sessions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ferry_nav::{
    FailureHandling, FragmentNavigationArgs, FrameId, FrameObserver, NavigatedArgs,
    NavigatingArgs, NavigationDecision, NavigationFailedArgs, NavigationType,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Navigating {
        frame: String,
        source: String,
        navigation_type: NavigationType,
        parent_navigating: bool,
        cancelled: bool,
    },
    NavigationFailed {
        frame: String,
        source: String,
        error: String,
        handled: bool,
    },
    Navigated {
        frame: String,
        source: String,
        navigation_type: NavigationType,
    },
    Fragment {
        frame: String,
        fragment: Option<String>,
    },
    Loading {
        frame: String,
        loading: bool,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Navigating {
                frame,
                source,
                navigation_type,
                parent_navigating,
                cancelled,
            } => {
                write!(f, "[{frame}] navigating ({navigation_type}) to {source}")?;
                if *parent_navigating {
                    f.write_str(" [parent]")?;
                }
                if *cancelled {
                    f.write_str(" -> cancelled")?;
                }
                Ok(())
            },
            TraceEvent::NavigationFailed {
                frame,
                source,
                error,
                handled,
            } => {
                let handled = if *handled { "handled" } else { "unhandled" };
                write!(f, "[{frame}] failed {source}: {error} ({handled})")
            },
            TraceEvent::Navigated {
                frame,
                source,
                navigation_type,
            } => write!(f, "[{frame}] navigated ({navigation_type}) to {source}"),
            TraceEvent::Fragment { frame, fragment } => match fragment {
                Some(fragment) => write!(f, "[{frame}] fragment #{fragment}"),
                None => write!(f, "[{frame}] fragment removed"),
            },
            TraceEvent::Loading { frame, loading } => {
                let state = if *loading { "loading" } else { "idle" };
                write!(f, "[{frame}] {state}")
            },
        }
    }
}

/// Shared, ordered record of every traced event.
pub type TraceLog = Rc<RefCell<Vec<TraceEvent>>>;

/// Observer attached to one frame. Logs each event and appends it to
/// the shared trace log. Can be told to veto navigations and to handle
/// failures.
pub struct TraceObserver {
    frame: String,
    log: TraceLog,
    json: bool,
    veto: Cell<bool>,
    handle_failures: Cell<bool>,
}

impl TraceObserver {
    pub fn new(frame: &str, log: TraceLog, json: bool) -> Self {
        Self {
            frame: frame.to_string(),
            log,
            json,
            veto: Cell::new(false),
            handle_failures: Cell::new(false),
        }
    }

    pub fn set_veto(&self, veto: bool) {
        self.veto.set(veto);
    }

    pub fn set_handle_failures(&self, handle: bool) {
        self.handle_failures.set(handle);
    }

    fn record(&self, event: TraceEvent) {
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => log::info!("{line}"),
                Err(e) => log::warn!("cannot encode trace event: {e}"),
            }
        } else {
            log::info!("{event}");
        }
        self.log.borrow_mut().push(event);
    }
}

impl FrameObserver for TraceObserver {
    fn navigating(&self, args: &NavigatingArgs) -> NavigationDecision {
        let cancelled = self.veto.get();
        self.record(TraceEvent::Navigating {
            frame: self.frame.clone(),
            source: args.source.to_string(),
            navigation_type: args.navigation_type,
            parent_navigating: args.is_parent_frame_navigating,
            cancelled,
        });
        if cancelled {
            NavigationDecision::Cancel
        } else {
            NavigationDecision::Proceed
        }
    }

    fn navigation_failed(&self, args: &NavigationFailedArgs) -> FailureHandling {
        let handled = self.handle_failures.get();
        self.record(TraceEvent::NavigationFailed {
            frame: self.frame.clone(),
            source: args.source.to_string(),
            error: format!("{:#}", args.error),
            handled,
        });
        if handled {
            FailureHandling::Handled
        } else {
            FailureHandling::Unhandled
        }
    }

    fn navigated(&self, args: &NavigatedArgs) {
        self.record(TraceEvent::Navigated {
            frame: self.frame.clone(),
            source: args.source.to_string(),
            navigation_type: args.navigation_type,
        });
    }

    fn fragment_navigation(&self, args: &FragmentNavigationArgs) {
        self.record(TraceEvent::Fragment {
            frame: self.frame.clone(),
            fragment: args.fragment.clone(),
        });
    }

    fn loading_changed(&self, _frame: FrameId, loading: bool) {
        self.record(TraceEvent::Loading {
            frame: self.frame.clone(),
            loading,
        });
    }
}
