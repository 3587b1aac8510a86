use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Semantic configuration version (`major.minor`)
///
/// Two versions are compatible iff they share the major number. Within a
/// major line the minor number only grows: each applied update batch moves
/// a configuration to `next_minor()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub const fn major(&self) -> u32 {
        self.major
    }

    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Same major line
    pub const fn is_compatible(&self, other: &Version) -> bool {
        self.major == other.major
    }

    /// # Errors
    ///
    /// `ValueParse` once the minor number is exhausted.
    pub fn next_minor(&self) -> Result<Version, ConfigError> {
        let minor = self
            .minor
            .checked_add(1)
            .ok_or_else(|| ConfigError::ValueParse {
                value: self.to_string(),
                reason: "minor version overflow".to_string(),
            })?;
        Ok(Version::new(self.major, minor))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = ConfigError;

    /// Accepts `"M.m"` or a bare major `"M"` (minor 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_part = |part: &str, what: &str| {
            part.trim().parse::<u32>().map_err(|e| ConfigError::ValueParse {
                value: s.to_string(),
                reason: format!("invalid {} number: {}", what, e),
            })
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::ValueParse {
                value: s.to_string(),
                reason: "empty version".to_string(),
            });
        }

        match trimmed.split_once('.') {
            Some((major, minor)) => Ok(Version::new(
                parse_part(major, "major")?,
                parse_part(minor, "minor")?,
            )),
            None => Ok(Version::new(parse_part(trimmed, "major")?, 0)),
        }
    }
}

impl TryFrom<String> for Version {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}
