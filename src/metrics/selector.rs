//! Sample selection by exact name and label predicates

use regex::Regex;
use std::borrow::Cow;

use crate::error::{ProbeError, ProbeResult};
use crate::metrics::parser::{Exposition, Labels, Sample};

const COUNTER_SUFFIX: &str = "_total";

/// Samples whose name equals `name` exactly (case-sensitive, no prefix match)
pub fn select<'a>(exposition: &'a Exposition, name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
    exposition.samples().filter(move |s| s.name == name)
}

/// Append `_total` to a counter name unless it already ends with it
pub fn normalize_counter_name(name: &str) -> Cow<'_, str> {
    if name.ends_with(COUNTER_SUFFIX) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{}{}", name, COUNTER_SUFFIX))
    }
}

/// Render a label set as `k1=v1,k2=v2` in exposition order
///
/// Quote characters and braces are dropped from values so predicates never
/// have to deal with them.
pub fn canonical_labels(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| {
            let v: String = v
                .chars()
                .filter(|c| !matches!(c, '"' | '\'' | '{' | '}'))
                .collect();
            format!("{}={}", k, v)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Regular expression matched at the start of the canonical label string
#[derive(Debug, Clone)]
pub struct LabelPredicate {
    regex: Regex,
}

impl LabelPredicate {
    pub fn new(pattern: &str) -> ProbeResult<Self> {
        let anchored = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            format!("^(?:{})", pattern)
        };

        let regex = Regex::new(&anchored)
            .map_err(|e| ProbeError::BadQuerySyntax(format!("invalid label pattern: {}", e)))?;

        Ok(Self { regex })
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.regex.is_match(&canonical_labels(&sample.labels))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
