//! Link resolution.
//!
//! A [`LinkNavigator`] decides what following a link means: running a
//! frame command, handing the location to an external opener, or
//! navigating a target frame.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use ferry_types::{FerryError, Location, Result};

use crate::events::{FrameId, NavigationOutcome};
use crate::frame::Frame;
use crate::locator::FrameLocator;

/// Schemes handed to the external opener unless configured otherwise.
pub const DEFAULT_EXTERNAL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Command run against a frame when a link names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    BrowseBack,
    Refresh,
}

impl FrameCommand {
    fn can_execute(self, frame: &Frame) -> bool {
        match self {
            FrameCommand::BrowseBack => frame.can_go_back(),
            FrameCommand::Refresh => frame.can_refresh(),
        }
    }

    fn execute(self, frame: &Frame) -> Result<NavigationOutcome> {
        match self {
            FrameCommand::BrowseBack => frame.go_back(),
            FrameCommand::Refresh => frame.refresh(),
        }
    }
}

impl fmt::Display for FrameCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameCommand::BrowseBack => f.write_str("browse-back"),
            FrameCommand::Refresh => f.write_str("refresh"),
        }
    }
}

/// Host capability for locations that leave the frame tree, such as web
/// links and mail addresses.
pub trait ExternalOpener {
    fn open(&self, location: &Location) -> anyhow::Result<()>;
}

/// Opener that only logs. Used until the host supplies a real one.
#[derive(Debug, Default)]
pub struct LogOpener;

impl ExternalOpener for LogOpener {
    fn open(&self, location: &Location) -> anyhow::Result<()> {
        log::info!("external link {location} (no opener configured)");
        Ok(())
    }
}

/// What following a link did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A registered command. `None` when it could not run, either because
    /// no frame was found or the frame had nothing to go back to or
    /// refresh.
    Command {
        command: FrameCommand,
        outcome: Option<NavigationOutcome>,
    },
    /// Handed to the external opener.
    External,
    /// Navigation requested on a frame.
    Frame {
        frame: FrameId,
        outcome: NavigationOutcome,
    },
}

pub struct LinkNavigator {
    locator: Rc<dyn FrameLocator>,
    opener: Rc<dyn ExternalOpener>,
    commands: HashMap<String, FrameCommand>,
    external_schemes: Vec<String>,
}

impl LinkNavigator {
    /// Navigator with the `cmd://browseback` and `cmd://refresh` commands
    /// and the default external schemes.
    pub fn new(locator: Rc<dyn FrameLocator>) -> Self {
        let mut navigator = Self {
            locator,
            opener: Rc::new(LogOpener),
            commands: HashMap::new(),
            external_schemes: DEFAULT_EXTERNAL_SCHEMES.iter().map(|s| s.to_string()).collect(),
        };
        navigator.commands.insert("cmd://browseback".to_string(), FrameCommand::BrowseBack);
        navigator.commands.insert("cmd://refresh".to_string(), FrameCommand::Refresh);
        navigator
    }

    pub fn with_external_opener(mut self, opener: Rc<dyn ExternalOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn set_external_schemes<I, S>(&mut self, schemes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_schemes = schemes
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
    }

    pub fn external_schemes(&self) -> &[String] {
        &self.external_schemes
    }

    /// Bind `location` to `command`, replacing any earlier binding.
    pub fn register_command(&mut self, location: &Location, command: FrameCommand) {
        self.commands.insert(command_key(location), command);
    }

    pub fn command_for(&self, location: &Location) -> Option<FrameCommand> {
        self.commands.get(&command_key(location)).copied()
    }

    fn is_external(&self, location: &Location) -> bool {
        location.is_absolute()
            && location.scheme().is_some_and(|scheme| {
                self.external_schemes
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(scheme))
            })
    }

    /// Follow a link.
    ///
    /// `source` is the frame the link was activated in; `target` names
    /// the frame to navigate (`_self`, `_parent`, `_top` or a frame
    /// name). Commands and frame navigation resolve the target relative
    /// to `source`.
    pub fn navigate(
        &self,
        location: &Location,
        source: Option<&Frame>,
        target: Option<&str>,
    ) -> Result<LinkOutcome> {
        if let Some(command) = self.command_for(location) {
            let frame = source.and_then(|s| self.locator.find_frame(target, s));
            let outcome = match frame {
                Some(frame) if command.can_execute(&frame) => Some(command.execute(&frame)?),
                _ => {
                    log::debug!("command {command} for {location} cannot run");
                    None
                },
            };
            return Ok(LinkOutcome::Command { command, outcome });
        }

        if self.is_external(location) {
            self.opener
                .open(location)
                .map_err(|e| FerryError::External(format!("{location}: {e:#}")))?;
            return Ok(LinkOutcome::External);
        }

        let Some(source) = source else {
            return Err(FerryError::SourceRequired(location.to_string()));
        };
        let Some(frame) = self.locator.find_frame(target, source) else {
            return Err(FerryError::FrameNotFound(format!(
                "{} (link to {location})",
                target.unwrap_or(crate::locator::TARGET_SELF)
            )));
        };
        let outcome = frame.navigate(location.clone())?;
        Ok(LinkOutcome::Frame {
            frame: frame.id(),
            outcome,
        })
    }
}

fn command_key(location: &Location) -> String {
    location.as_str().to_ascii_lowercase()
}
