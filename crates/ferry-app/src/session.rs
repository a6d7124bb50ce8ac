//! Session scripts loaded from TOML.
//!
//! A session declares a frame tree, the pages the site serves and a list
//! of steps to run against the frames.

use std::collections::HashSet;
use std::path::Path;

use ferry_types::{FerryError, FrameConfig, Location, Result};
use serde::Deserialize;

/// Top-level session file.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Run the executor after every step.
    #[serde(default = "yes")]
    pub auto_pump: bool,
    #[serde(default)]
    pub frames: Vec<FrameSpec>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One frame in the tree. Parents must be declared before children.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "yes")]
    pub keep_content_alive: bool,
}

impl FrameSpec {
    pub fn config(&self) -> FrameConfig {
        FrameConfig {
            name: Some(self.name.clone()),
            keep_content_alive: self.keep_content_alive,
        }
    }
}

/// A page served by the site loader.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    pub location: String,
    #[serde(default)]
    pub title: String,
    /// Overrides the frame's keep-alive policy for this page.
    #[serde(default)]
    pub keep_alive: Option<bool>,
    /// Load error returned instead of content.
    #[serde(default)]
    pub fail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        frame: String,
        location: String,
    },
    /// Follow a link activated in `frame` (if any) towards `target`.
    Link {
        #[serde(default)]
        frame: Option<String>,
        location: String,
        #[serde(default)]
        target: Option<String>,
    },
    Back {
        frame: String,
    },
    Refresh {
        frame: String,
    },
    KeepAlive {
        frame: String,
        enabled: bool,
    },
    /// Make the frame's observer cancel every navigating check.
    Veto {
        frame: String,
        enabled: bool,
    },
    /// Make the frame's observer handle load failures.
    Handle {
        frame: String,
        enabled: bool,
    },
    /// Run the executor until no continuation is ready.
    Pump,
}

impl Step {
    fn frame(&self) -> Option<&str> {
        match self {
            Step::Navigate { frame, .. }
            | Step::Back { frame }
            | Step::Refresh { frame }
            | Step::KeepAlive { frame, .. }
            | Step::Veto { frame, .. }
            | Step::Handle { frame, .. } => Some(frame.as_str()),
            Step::Link { frame, .. } => frame.as_deref(),
            Step::Pump => None,
        }
    }

    fn location(&self) -> Option<&str> {
        match self {
            Step::Navigate { location, .. } | Step::Link { location, .. } => Some(location.as_str()),
            _ => None,
        }
    }
}

fn yes() -> bool {
    true
}

impl SessionConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let session: SessionConfig = toml::from_str(toml)?;
        session.validate()?;
        Ok(session)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FerryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check names, parent order, page locations and step references.
    pub fn validate(&self) -> Result<()> {
        let mut names: HashSet<&str> = HashSet::new();
        for frame in &self.frames {
            frame.config().validate()?;
            if let Some(parent) = &frame.parent
                && !names.contains(parent.as_str())
            {
                return Err(FerryError::Config(format!(
                    "frame '{}' names parent '{parent}' before it is declared",
                    frame.name
                )));
            }
            if !names.insert(&frame.name) {
                return Err(FerryError::Config(format!("duplicate frame '{}'", frame.name)));
            }
        }

        for page in &self.pages {
            Location::parse(&page.location)?;
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(frame) = step.frame()
                && !names.contains(frame)
            {
                return Err(FerryError::Config(format!(
                    "step {} refers to unknown frame '{frame}'",
                    index + 1
                )));
            }
            if let Some(location) = step.location() {
                Location::parse(location)?;
            }
        }
        Ok(())
    }
}
