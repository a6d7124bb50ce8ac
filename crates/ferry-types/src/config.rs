//! Frame configuration.

use serde::{Deserialize, Serialize};

use crate::error::{FerryError, Result};

/// Target names with built-in meaning; frames may not claim them.
pub const RESERVED_TARGETS: [&str; 3] = ["_self", "_parent", "_top"];

/// Per-frame configuration, loadable from TOML.
///
/// ```toml
/// name = "content"
/// keep_content_alive = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Optional frame name, used when a link targets a frame by name.
    pub name: Option<String>,
    /// Retain successfully loaded content in the frame's content cache
    /// unless the content itself overrides the decision.
    pub keep_content_alive: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            name: None,
            keep_content_alive: true,
        }
    }
}

impl FrameConfig {
    /// Configuration for a frame with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: FrameConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject names that are empty or collide with a reserved target.
    pub fn validate(&self) -> Result<()> {
        let Some(name) = &self.name else {
            return Ok(());
        };
        if name.trim().is_empty() {
            return Err(FerryError::Config("frame name must not be empty".to_string()));
        }
        if name.starts_with('_') {
            return Err(FerryError::Config(format!(
                "frame name '{name}' is reserved (names starting with '_' are targets)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keeps_content_alive() {
        let config = FrameConfig::default();
        assert!(config.keep_content_alive);
        assert!(config.name.is_none());
    }

    #[test]
    fn parse_full() {
        let config = FrameConfig::from_toml_str(
            r#"
            name = "content"
            keep_content_alive = false
            "#,
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("content"));
        assert!(!config.keep_content_alive);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = FrameConfig::from_toml_str("").unwrap();
        assert_eq!(config, FrameConfig::default());
    }

    #[test]
    fn reserved_name_rejected() {
        for name in RESERVED_TARGETS {
            let err = FrameConfig::from_toml_str(&format!("name = \"{name}\"")).unwrap_err();
            assert!(matches!(err, FerryError::Config(_)), "{name} accepted");
        }
    }

    #[test]
    fn blank_name_rejected() {
        assert!(FrameConfig::named("  ").validate().is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = FrameConfig::from_toml_str("keep_content_alive = \"yes\"").unwrap_err();
        assert!(matches!(err, FerryError::TomlParse(_)));
    }
}
