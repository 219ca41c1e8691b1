//! Control plane version detection and label layout selection
//!
//! The apiserver changed the label order of its request metrics between
//! releases. `LabelOrder` captures each layout and builds the label
//! predicates for it; `ApiVersion` picks the layout.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProbeError, ProbeResult};
use crate::metrics::selector::LabelPredicate;

/// Quantile used by summary queries
pub const SUMMARY_QUANTILE: &str = "0.99";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

/// Body of the apiserver `/version` endpoint (only the fields we read)
#[derive(Debug, Deserialize)]
struct VersionInfo {
    major: String,
    minor: String,
}

impl ApiVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the JSON returned by `/version`
    ///
    /// Managed clusters report minors like `"27+"`; only the leading digits
    /// are kept.
    pub fn from_document(body: &[u8]) -> ProbeResult<Self> {
        let info: VersionInfo = serde_json::from_slice(body)?;
        Ok(Self {
            major: leading_number(&info.major)?,
            minor: leading_number(&info.minor)?,
        })
    }
}

impl FromStr for ApiVersion {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| ProbeError::Parse(format!("invalid version '{}'", s)))?;
        Ok(Self {
            major: leading_number(major)?,
            minor: leading_number(minor)?,
        })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn leading_number(s: &str) -> ProbeResult<u32> {
    let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| ProbeError::Parse(format!("invalid version component '{}'", s)))
}

/// Label layout of the apiserver request metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOrder {
    /// `code=...,...,verb=...` (1.7)
    CodeFirst,
    /// `verb=...,code=...` and `scope=...,quantile=...,verb=...`
    VerbFirst,
}

impl LabelOrder {
    pub fn for_version(version: ApiVersion) -> Self {
        match (version.major, version.minor) {
            (1, 7) => Self::CodeFirst,
            _ => Self::VerbFirst,
        }
    }

    /// Predicate for request counters of `verb`; `errors_only` keeps 5xx codes
    pub fn request_predicate(self, verb: &str, errors_only: bool) -> ProbeResult<LabelPredicate> {
        let verb = regex::escape(verb);
        let code = if errors_only { r"5\d\d" } else { "[^,]*" };

        let pattern = match self {
            Self::CodeFirst => format!(r"^code={},(?:.*,)?verb={}(?:,|$)", code, verb),
            Self::VerbFirst => format!(r"^verb={},code={}(?:,|$)", verb, code),
        };
        LabelPredicate::new(&pattern)
    }

    /// Predicate for the 0.99 latency quantile of `verb`
    pub fn latency_predicate(self, verb: &str) -> ProbeResult<LabelPredicate> {
        let verb = regex::escape(verb);
        let quantile = regex::escape(SUMMARY_QUANTILE);

        let pattern = match self {
            Self::CodeFirst => format!(r"^quantile={},verb={}(?:,|$)", quantile, verb),
            Self::VerbFirst => {
                format!(r"^scope=[^,]*,quantile={},verb={}(?:,|$)", quantile, verb)
            }
        };
        LabelPredicate::new(&pattern)
    }
}

impl From<ApiVersion> for LabelOrder {
    fn from(version: ApiVersion) -> Self {
        Self::for_version(version)
    }
}
