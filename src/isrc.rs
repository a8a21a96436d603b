//! ISRC codes as read from a disc or returned by MusicBrainz

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// CC-XXX-YY-NNNNN without separators
fn isrc_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}[0-9]{2}[0-9]{5}$").unwrap())
}

/// Trim, uppercase and strip the hyphens of the display form (US-RC1-76-07839)
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// A validated International Standard Recording Code
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isrc(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed ISRC '{raw}': {reason}")]
pub struct MalformedIsrc {
    pub raw: String,
    pub normalized: String,
    pub reason: &'static str,
}

impl Isrc {
    pub fn parse(raw: &str) -> Result<Isrc, MalformedIsrc> {
        let normalized = normalize(raw);

        let reason = if normalized.chars().count() != 12 {
            Some("expected 12 characters")
        } else if !isrc_pattern().is_match(&normalized) {
            Some("expected 2 letters, 3 alphanumerics and 7 digits")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(MalformedIsrc {
                raw: raw.to_string(),
                normalized,
                reason,
            }),
            None => Ok(Isrc(normalized)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn country(&self) -> &str {
        &self.0[0..2]
    }

    pub fn registrant(&self) -> &str {
        &self.0[2..5]
    }

    pub fn year(&self) -> &str {
        &self.0[5..7]
    }

    pub fn designation(&self) -> &str {
        &self.0[7..12]
    }
}

impl FromStr for Isrc {
    type Err = MalformedIsrc;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Isrc::parse(s)
    }
}

impl TryFrom<String> for Isrc {
    type Error = MalformedIsrc;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Isrc::parse(&value)
    }
}

impl From<Isrc> for String {
    fn from(isrc: Isrc) -> Self {
        isrc.0
    }
}

impl fmt::Display for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
