//! Type-specific reduction of selected samples to one scalar

use std::str::FromStr;

use crate::error::{ProbeError, ProbeResult};
use crate::metrics::parser::Exposition;
use crate::metrics::selector::{normalize_counter_name, select};
use crate::metrics::version::LabelOrder;

/// What a counter query sums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountBy {
    /// Every response code
    Total,
    /// 5xx responses only
    Errors,
}

impl FromStr for CountBy {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_count" => Ok(Self::Total),
            "error_count" => Ok(Self::Errors),
            other => Err(ProbeError::BadQuerySyntax(format!(
                "unknown count mode '{}' (expected total_count or error_count)",
                other
            ))),
        }
    }
}

/// `-v VERB:total_count` / `-v VERB:error_count`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSelector {
    pub verb: String,
    pub count_by: CountBy,
}

impl FromStr for CounterSelector {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [verb, count_by] = parts.as_slice() else {
            return Err(ProbeError::BadQuerySyntax(format!(
                "wrong selector syntax '{}' (expected VERB:total_count|error_count)",
                s
            )));
        };

        if verb.is_empty() {
            return Err(ProbeError::BadQuerySyntax(format!("empty verb in '{}'", s)));
        }

        Ok(Self {
            verb: verb.to_string(),
            count_by: count_by.parse()?,
        })
    }
}

/// Value of the first sample named `name`
///
/// # Errors
/// `ProbeError::NotFound` when no sample carries that name.
pub fn gauge(exposition: &Exposition, name: &str) -> ProbeResult<f64> {
    select(exposition, name)
        .next()
        .map(|s| s.value)
        .ok_or_else(|| ProbeError::NotFound(format!("metric '{}'", name)))
}

/// Sum of request counters for one verb
///
/// The name is normalized to end in `_total`. NaN values count as zero.
pub fn counter(
    exposition: &Exposition,
    name: &str,
    selector: &CounterSelector,
    order: LabelOrder,
) -> ProbeResult<f64> {
    let name = normalize_counter_name(name);
    let predicate =
        order.request_predicate(&selector.verb, selector.count_by == CountBy::Errors)?;

    Ok(select(exposition, &name)
        .filter(|s| predicate.matches(s))
        .map(|s| if s.value.is_nan() { 0.0 } else { s.value })
        .fold(0.0, |acc, v| acc + v))
}

/// Mean of the 0.99 quantile over every matching series of `verb`
///
/// NaN quantiles (no observations yet) are skipped; with no match the result
/// is `0`.
pub fn summary(
    exposition: &Exposition,
    name: &str,
    verb: &str,
    order: LabelOrder,
) -> ProbeResult<f64> {
    let predicate = order.latency_predicate(verb)?;

    let values: Vec<f64> = select(exposition, name)
        .filter(|s| predicate.matches(s) && !s.value.is_nan())
        .map(|s| s.value)
        .collect();

    if values.is_empty() {
        return Ok(0.0);
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}
