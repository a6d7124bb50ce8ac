//! Scripted host for the ferry navigation engine.
//!
//! Loads a session file (or the bundled demo), builds the frame tree it
//! describes, runs its steps on a single-threaded executor and prints
//! the final state of every frame.
//!
//! Usage: `ferry-app [SESSION.toml] [--json]`

mod runner;
mod session;
mod site;
mod trace;

use std::path::Path;

use anyhow::{Context, Result};

use runner::Runner;
use session::SessionConfig;

const DEMO_SESSION: &str = include_str!("../sessions/demo.toml");

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut json = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        if arg == "--json" {
            json = true;
        } else {
            path = Some(arg);
        }
    }

    let session = match &path {
        Some(path) => SessionConfig::load(Path::new(path))
            .with_context(|| format!("loading session {path}"))?,
        None => {
            log::info!("no session given, running the bundled demo");
            SessionConfig::from_toml_str(DEMO_SESSION).context("parsing demo session")?
        },
    };
    log::info!(
        "session: {} frame(s), {} page(s), {} step(s)",
        session.frames.len(),
        session.pages.len(),
        session.steps.len(),
    );

    let mut runner = Runner::new(&session, json)?;
    let failures = runner.run(&session.steps);
    log::info!("{} event(s) traced", runner.trace().len());

    let summary = runner.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for frame in &summary {
            println!("{}", frame.name);
            println!("  source:    {}", frame.source.as_deref().unwrap_or("-"));
            println!("  displayed: {}", frame.displayed);
            println!("  history:   {}", frame.history.join(" <- "));
            println!("  cached:    {}", frame.cached);
            if frame.loading {
                println!("  (still loading)");
            }
        }
    }

    if failures > 0 {
        log::warn!("{failures} step(s) failed");
    }
    Ok(())
}
