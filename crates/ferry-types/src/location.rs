//! Navigable locations.
//!
//! A [`Location`] is an opaque, URI-shaped identifier. The engine never
//! interprets it beyond two operations: splitting off the fragment (the
//! part after the first `#`) and reading the scheme for link routing.
//! Two locations are *cache-equivalent* when they are equal after the
//! fragment has been removed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FerryError, Result};

/// A navigable location, optionally carrying a `#fragment` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    raw: String,
    /// Byte offset of the `#` separator, if any.
    fragment_at: Option<usize>,
}

impl Location {
    /// Parse a location string.
    ///
    /// Leading and trailing whitespace is trimmed. Absolute
    /// (`scheme://host/path`, `mailto:x`), rooted (`/pages/home`) and
    /// relative (`pages/home#intro`) forms are accepted. Empty input and
    /// fragment-only references (`#intro`) are rejected: a fragment-only
    /// reference has no document to navigate to.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(FerryError::InvalidLocation("empty location".to_string()));
        }
        if location.starts_with('#') {
            return Err(FerryError::InvalidLocation(format!(
                "fragment-only reference: {location}"
            )));
        }

        Ok(Self {
            fragment_at: location.find('#'),
            raw: location.to_string(),
        })
    }

    /// The full location text, fragment included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The fragment without its leading `#`, if present.
    ///
    /// `page#` has an empty fragment, which is distinct from no fragment.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment_at.map(|i| &self.raw[i + 1..])
    }

    /// Whether this location carries a fragment suffix.
    pub fn has_fragment(&self) -> bool {
        self.fragment_at.is_some()
    }

    /// The location with any fragment removed. This is the content
    /// cache key.
    pub fn without_fragment(&self) -> Location {
        match self.fragment_at {
            Some(i) => Location {
                raw: self.raw[..i].to_string(),
                fragment_at: None,
            },
            None => self.clone(),
        }
    }

    /// Return a copy of this location with `fragment` replacing any
    /// existing fragment.
    pub fn with_fragment(&self, fragment: &str) -> Location {
        let base = self.document();
        let raw = format!("{base}#{fragment}");
        Location {
            fragment_at: Some(base.len()),
            raw,
        }
    }

    /// Whether `self` and `other` name the same document, i.e. are equal
    /// once fragments are removed.
    pub fn same_document(&self, other: &Location) -> bool {
        self.document() == other.document()
    }

    /// The scheme component (`http`, `cmd`, `mailto`, ...), if the
    /// location is absolute.
    ///
    /// Follows RFC 3986: an ASCII letter followed by letters, digits,
    /// `+`, `-` or `.`, terminated by `:`.
    pub fn scheme(&self) -> Option<&str> {
        let document = self.document();
        let end = document.find(':')?;
        let scheme = &document[..end];
        let mut chars = scheme.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            Some(scheme)
        } else {
            None
        }
    }

    /// Whether the location carries a scheme.
    pub fn is_absolute(&self) -> bool {
        self.scheme().is_some()
    }

    fn document(&self) -> &str {
        match self.fragment_at {
            Some(i) => &self.raw[..i],
            None => &self.raw,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Location {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        Location::parse(s)
    }
}

impl TryFrom<&str> for Location {
    type Error = FerryError;

    fn try_from(value: &str) -> Result<Self> {
        Location::parse(value)
    }
}

impl TryFrom<String> for Location {
    type Error = FerryError;

    fn try_from(value: String) -> Result<Self> {
        Location::parse(&value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.raw
    }
}

impl AsRef<str> for Location {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
