//! Shared types used across mailprobe.
//!
//! This module defines the newtypes and enums that the store, scanner and
//! binary exchange: normalized probe targets, reputation scores and
//! availability verdicts.

use crate::error::MailprobeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized `local@domain` address to probe.
///
/// Both halves are trimmed and lower-cased on construction; identity is the
/// rendered string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbeTarget {
    address: String,
    at: usize,
}

impl ProbeTarget {
    /// Build a target from a local-part and a domain.
    ///
    /// # Errors
    /// Returns error if either half is empty after trimming, or if the
    /// local-part itself contains `@`.
    pub fn new(local_part: &str, domain: &str) -> Result<Self, MailprobeError> {
        let local = local_part.trim().to_lowercase();
        let domain = domain.trim().to_lowercase();

        if local.is_empty() {
            return Err(MailprobeError::Validation(
                "address has an empty local-part".to_string(),
            ));
        }
        if domain.is_empty() {
            return Err(MailprobeError::Validation(format!(
                "address '{local}' has an empty domain"
            )));
        }
        if local.contains('@') || domain.contains('@') {
            return Err(MailprobeError::Validation(format!(
                "address '{local}@{domain}' contains more than one '@'"
            )));
        }

        let at = local.len();
        Ok(Self {
            address: format!("{local}@{domain}"),
            at,
        })
    }

    /// Parse a full `local@domain` address.
    ///
    /// The split happens at the last `@`.
    pub fn parse(address: &str) -> Result<Self, MailprobeError> {
        let (local, domain) = address.trim().rsplit_once('@').ok_or_else(|| {
            MailprobeError::Validation(format!("'{}' is not a full address", address.trim()))
        })?;
        Self::new(local, domain)
    }

    /// Normalized `local@domain` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// The part before `@`, which is what gets typed into signup forms.
    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.address[..self.at]
    }

    /// The lower-cased domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.address[self.at + 1..]
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl TryFrom<String> for ProbeTarget {
    type Error = MailprobeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProbeTarget> for String {
    fn from(target: ProbeTarget) -> Self {
        target.address
    }
}

/// A reputation score in `[0, 100]`.
///
/// Zero is a legal reading but means "not yet computed" and is never cached
/// or reported as a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score(u8);

impl Score {
    /// Highest score the scoring page reports.
    pub const MAX: u8 = 100;

    /// Create a score, rejecting values above 100.
    pub fn new(value: u8) -> Result<Self, MailprobeError> {
        if value > Self::MAX {
            return Err(MailprobeError::Validation(format!(
                "score {value} is outside 0..=100"
            )));
        }
        Ok(Self(value))
    }

    /// Raw value.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the service actually produced a score.
    #[must_use]
    pub fn is_computed(self) -> bool {
        self.0 > 0
    }

    /// Band for a computed score, `None` for zero.
    #[must_use]
    pub fn band(self) -> Option<ScoreBand> {
        match self.0 {
            0 => None,
            71..=u8::MAX => Some(ScoreBand::Good),
            31..=70 => Some(ScoreBand::Medium),
            _ => Some(ScoreBand::Bad),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reputation band a computed score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    /// 71..=100
    Good,
    /// 31..=70
    Medium,
    /// 1..=30
    Bad,
}

impl ScoreBand {
    /// Lower-case name, used in sink file names and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Bad => "bad",
        }
    }
}

/// Availability verdict produced by the signal classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The identifier was never reported taken for a full stable window.
    Free,
    /// The identifier was reported taken, or flickered taken at least once.
    Busy,
    /// Timed out with no evidence either way.
    Unknown,
}

impl Verdict {
    /// Whether the verdict should be reported as available.
    ///
    /// `Unknown` is folded into busy.
    #[must_use]
    pub fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "FREE",
            Self::Busy => "BUSY",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
