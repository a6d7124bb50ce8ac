//! Drives a session: builds the frame tree and runs its steps.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Context, Result};
use ferry_nav::{
    ContentLoader, Displayed, Frame, FrameHost, FrameLocator, FrameObserver, FrameTree,
    LinkNavigator,
};
use ferry_types::{FerryError, Location};
use futures::executor::LocalPool;
use serde::Serialize;

use crate::session::{SessionConfig, Step};
use crate::site::SiteLoader;
use crate::trace::{TraceEvent, TraceLog, TraceObserver};

/// End-of-session state of one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub name: String,
    pub source: Option<String>,
    pub displayed: String,
    pub history: Vec<String>,
    pub cached: usize,
    pub loading: bool,
}

pub struct Runner {
    pool: LocalPool,
    // Declaration order, for stable summaries.
    frames: Vec<(String, Frame)>,
    observers: HashMap<String, Rc<TraceObserver>>,
    links: LinkNavigator,
    trace: TraceLog,
    auto_pump: bool,
}

impl Runner {
    pub fn new(session: &SessionConfig, json: bool) -> Result<Self> {
        let pool = LocalPool::new();
        let tree = Rc::new(FrameTree::new());
        let locator: Rc<dyn FrameLocator> = Rc::clone(&tree) as Rc<dyn FrameLocator>;
        let host = FrameHost::new(pool.spawner(), Rc::clone(&locator));

        let site = SiteLoader::from_pages(&session.pages).context("building site")?;
        log::info!("serving {} page(s)", site.len());
        let loader: Rc<dyn ContentLoader> = Rc::new(site);

        let trace = TraceLog::default();
        let mut frames: Vec<(String, Frame)> = Vec::new();
        let mut observers = HashMap::new();
        for spec in &session.frames {
            let frame = Frame::new(&host, spec.config(), Rc::clone(&loader))
                .with_context(|| format!("creating frame '{}'", spec.name))?;
            let parent = spec
                .parent
                .as_deref()
                .and_then(|p| frames.iter().find(|(name, _)| name == p))
                .map(|(_, f)| f.clone());
            if !tree.attach(&frame, parent.as_ref()) {
                anyhow::bail!("frame '{}' cannot be placed below its own subtree", spec.name);
            }
            frame.register_with_parent();

            let observer = Rc::new(TraceObserver::new(&spec.name, Rc::clone(&trace), json));
            frame.subscribe(Rc::clone(&observer) as Rc<dyn FrameObserver>);
            observers.insert(spec.name.clone(), observer);
            frames.push((spec.name.clone(), frame));
        }

        Ok(Self {
            pool,
            frames,
            observers,
            links: LinkNavigator::new(locator),
            trace,
            auto_pump: session.auto_pump,
        })
    }

    fn frame(&self, name: &str) -> Result<&Frame, FerryError> {
        self.frames
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
            .ok_or_else(|| FerryError::FrameNotFound(name.to_string()))
    }

    fn observer(&self, name: &str) -> Result<&TraceObserver, FerryError> {
        self.observers
            .get(name)
            .map(Rc::as_ref)
            .ok_or_else(|| FerryError::FrameNotFound(name.to_string()))
    }

    /// Run every step. A failing step is logged and the session goes on.
    /// Returns the number of failed steps.
    pub fn run(&mut self, steps: &[Step]) -> usize {
        let mut failures = 0;
        for (index, step) in steps.iter().enumerate() {
            log::debug!("step {}: {step:?}", index + 1);
            if let Err(e) = self.execute(step) {
                log::error!("step {} failed: {e:#}", index + 1);
                failures += 1;
            }
            if self.auto_pump {
                self.pump();
            }
        }
        self.pump();
        failures
    }

    pub fn execute(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Navigate { frame, location } => {
                let outcome = self.frame(frame)?.navigate(Location::parse(location)?)?;
                log::debug!("navigate {frame} -> {location}: {outcome:?}");
            },
            Step::Link {
                frame,
                location,
                target,
            } => {
                let source = frame.as_deref().map(|f| self.frame(f)).transpose()?;
                let outcome =
                    self.links
                        .navigate(&Location::parse(location)?, source, target.as_deref())?;
                log::debug!("link {location}: {outcome:?}");
            },
            Step::Back { frame } => {
                let outcome = self.frame(frame)?.go_back()?;
                log::debug!("back {frame}: {outcome:?}");
            },
            Step::Refresh { frame } => {
                let outcome = self.frame(frame)?.refresh()?;
                log::debug!("refresh {frame}: {outcome:?}");
            },
            Step::KeepAlive { frame, enabled } => {
                self.frame(frame)?.set_keep_content_alive(*enabled);
            },
            Step::Veto { frame, enabled } => self.observer(frame)?.set_veto(*enabled),
            Step::Handle { frame, enabled } => self.observer(frame)?.set_handle_failures(*enabled),
            Step::Pump => self.pump(),
        }
        Ok(())
    }

    pub fn pump(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }

    pub fn summary(&self) -> Vec<FrameSummary> {
        self.frames
            .iter()
            .map(|(name, frame)| FrameSummary {
                name: name.clone(),
                source: frame.source().map(|s| s.to_string()),
                displayed: match frame.displayed() {
                    Displayed::Empty => "empty".to_string(),
                    Displayed::Content(content) => format!("{content:?}"),
                    Displayed::Error(error) => format!("error: {error:#}"),
                },
                history: frame.history().iter().map(ToString::to_string).collect(),
                cached: frame.cache_len(),
                loading: frame.is_loading(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
[[frames]]
name = "main"

[[frames]]
name = "preview"
parent = "main"

[[pages]]
location = "/home"
title = "Home"

[[pages]]
location = "/guide"
title = "Guide"

[[pages]]
location = "/broken"
fail = "backend unavailable"
"#;

    fn runner(extra: &str) -> (Runner, SessionConfig) {
        let session = SessionConfig::from_toml_str(&format!("{SITE}{extra}")).unwrap();
        (Runner::new(&session, false).unwrap(), session)
    }

    fn summary_of(runner: &Runner, name: &str) -> FrameSummary {
        runner
            .summary()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[test]
    fn navigation_steps_update_frames() {
        let (mut runner, session) = runner(
            r#"
[[steps]]
action = "navigate"
frame = "main"
location = "/home"

[[steps]]
action = "navigate"
frame = "main"
location = "/guide#install"

[[steps]]
action = "back"
frame = "main"
"#,
        );
        assert_eq!(runner.run(&session.steps), 0);

        let main = summary_of(&runner, "main");
        assert_eq!(main.source.as_deref(), Some("/home"));
        assert_eq!(main.displayed, "Home (/home)");
        assert!(main.history.is_empty());
        assert_eq!(main.cached, 2);
        assert!(!main.loading);
        assert!(runner.trace().contains(&TraceEvent::Fragment {
            frame: "main".to_string(),
            fragment: Some("install".to_string()),
        }));
    }

    #[test]
    fn child_veto_blocks_parent() {
        let (mut runner, session) = runner(
            r#"
[[steps]]
action = "veto"
frame = "preview"
enabled = true

[[steps]]
action = "navigate"
frame = "main"
location = "/home"
"#,
        );
        runner.run(&session.steps);

        let main = summary_of(&runner, "main");
        assert_eq!(main.source, None);
        assert_eq!(main.displayed, "empty");
        assert!(matches!(
            runner.trace().as_slice(),
            [TraceEvent::Navigating {
                parent_navigating: true,
                cancelled: true,
                ..
            }]
        ));
    }

    #[test]
    fn failures_show_unless_handled() {
        let (mut runner, session) = runner(
            r#"
[[steps]]
action = "navigate"
frame = "main"
location = "/broken"

[[steps]]
action = "handle"
frame = "preview"
enabled = true

[[steps]]
action = "navigate"
frame = "preview"
location = "/broken"
"#,
        );
        runner.run(&session.steps);

        assert_eq!(
            summary_of(&runner, "main").displayed,
            "error: backend unavailable"
        );
        assert_eq!(summary_of(&runner, "preview").displayed, "empty");
    }

    #[test]
    fn links_reach_other_frames() {
        let (mut runner, session) = runner(
            r#"
[[steps]]
action = "link"
frame = "preview"
location = "/guide"
target = "_parent"

[[steps]]
action = "link"
frame = "preview"
location = "https://example.com"
"#,
        );
        assert_eq!(runner.run(&session.steps), 0);
        assert_eq!(summary_of(&runner, "main").source.as_deref(), Some("/guide"));
        assert_eq!(summary_of(&runner, "preview").source, None);
    }

    #[test]
    fn failing_steps_are_counted() {
        let (mut runner, session) = runner(
            r#"
[[steps]]
action = "link"
location = "/guide"

[[steps]]
action = "link"
frame = "main"
location = "/guide"
target = "sidebar"
"#,
        );
        assert_eq!(runner.run(&session.steps), 2);
    }

    #[test]
    fn load_waits_for_pump() {
        let (mut runner, _) = runner("");
        runner
            .execute(&Step::Navigate {
                frame: "main".to_string(),
                location: "/home".to_string(),
            })
            .unwrap();
        assert!(summary_of(&runner, "main").loading);

        runner.execute(&Step::Pump).unwrap();
        assert_eq!(summary_of(&runner, "main").displayed, "Home (/home)");
    }
}
