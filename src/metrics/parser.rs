//! Prometheus text exposition parsing
//!
//! Decodes the line-oriented text format served on `/metrics` into metric
//! families. Unlike a scrape-oriented parser, label sets keep the order in
//! which they appear on the wire and summary/histogram components stay
//! separate samples, because selection works on exact sample names and on
//! label strings in exposition order.

use std::fmt;

use crate::error::{ProbeError, ProbeResult};

/// Metric type from a `# TYPE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Summary,
    Histogram,
    Untyped,
}

impl MetricType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(Self::Counter),
            "gauge" => Some(Self::Gauge),
            "summary" => Some(Self::Summary),
            "histogram" => Some(Self::Histogram),
            "untyped" => Some(Self::Untyped),
            _ => None,
        }
    }

    /// Sample name suffixes that still belong to a family of this type
    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Counter => &["_total", "_created"],
            Self::Summary => &["_sum", "_count", "_created"],
            Self::Histogram => &["_bucket", "_sum", "_count", "_created"],
            Self::Gauge | Self::Untyped => &[],
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Summary => "summary",
            Self::Histogram => "histogram",
            Self::Untyped => "untyped",
        };
        f.write_str(s)
    }
}

/// Label set in exposition order; keys are unique
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single data line
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Labels,
    pub value: f64,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: Option<String>,
    pub kind: MetricType,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            help: None,
            kind: MetricType::Untyped,
            samples: Vec::new(),
        }
    }

    fn accepts(&self, sample_name: &str) -> bool {
        if sample_name == self.name {
            return true;
        }
        match sample_name.strip_prefix(self.name.as_str()) {
            Some(suffix) => self.kind.suffixes().contains(&suffix),
            None => false,
        }
    }
}

/// Parsed exposition; immutable and iterable any number of times
#[derive(Debug, Clone, Default)]
pub struct Exposition {
    families: Vec<MetricFamily>,
}

impl Exposition {
    pub fn families(&self) -> impl Iterator<Item = &MetricFamily> {
        self.families.iter()
    }

    /// All samples of all families, in exposition order
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.families.iter().flat_map(|f| f.samples.iter())
    }

    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Parse a fetched body; it must be valid UTF-8
pub fn parse_bytes(body: &[u8]) -> ProbeResult<Exposition> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ProbeError::Parse(format!("exposition is not UTF-8: {}", e)))?;
    parse(text)
}

/// Parse Prometheus text exposition format
///
/// # Errors
/// `ProbeError::Parse` naming the 1-based line for unbalanced braces,
/// unterminated or duplicate labels, invalid names, missing or non-numeric
/// values, bad timestamps and unknown `# TYPE` values.
pub fn parse(text: &str) -> ProbeResult<Exposition> {
    let mut families: Vec<MetricFamily> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let mut cursor = Cursor::new(line, idx + 1);

        if let Some(comment) = line.strip_prefix('#') {
            parse_comment(comment.trim_start(), &cursor, &mut families)?;
            continue;
        }

        let mut sample = parse_sample(&mut cursor)?;

        let joins = families.last().is_some_and(|f| f.accepts(&sample.name));
        if !joins {
            families.push(MetricFamily::new(&sample.name));
        }
        if let Some(family) = families.last_mut() {
            // older exporters write counter samples without `_total`
            if family.kind == MetricType::Counter
                && sample.name == family.name
                && !sample.name.ends_with("_total")
            {
                sample.name.push_str("_total");
            }
            family.samples.push(sample);
        }
    }

    Ok(Exposition { families })
}

fn parse_comment(
    comment: &str,
    cursor: &Cursor<'_>,
    families: &mut Vec<MetricFamily>,
) -> ProbeResult<()> {
    let (keyword, rest) = split_word(comment);
    if keyword != "HELP" && keyword != "TYPE" {
        // free-form comment
        return Ok(());
    }

    let (name, rest) = split_word(rest);
    if name.is_empty() {
        return Err(cursor.error(format!("# {} without a metric name", keyword)));
    }

    // metadata for the family currently open, or the start of a new one
    if families.last().map_or(true, |f| f.name != name) {
        families.push(MetricFamily::new(name));
    }
    let Some(family) = families.last_mut() else {
        return Ok(());
    };

    if keyword == "HELP" {
        family.help = Some(unescape_help(rest));
    } else {
        family.kind = MetricType::parse(rest.trim())
            .ok_or_else(|| cursor.error(format!("unknown metric type '{}'", rest.trim())))?;
    }

    Ok(())
}

fn parse_sample(cursor: &mut Cursor<'_>) -> ProbeResult<Sample> {
    let name = cursor.take_while(is_metric_name_char);
    if !is_valid_name(name) {
        return Err(cursor.error(format!("invalid metric name '{}'", name)));
    }

    cursor.skip_ws();
    let labels = if cursor.peek() == Some('{') {
        cursor.bump();
        parse_labels(cursor)?
    } else {
        Labels::default()
    };

    cursor.skip_ws();
    let value = cursor.take_while(|c| !c.is_whitespace());
    if value.is_empty() {
        return Err(cursor.error(format!("missing value for '{}'", name)));
    }
    let value = value
        .parse::<f64>()
        .map_err(|_| cursor.error(format!("non-numeric value '{}'", value)))?;

    cursor.skip_ws();
    let timestamp = match cursor.take_while(|c| !c.is_whitespace()) {
        "" => None,
        ts => Some(
            ts.parse::<i64>()
                .map_err(|_| cursor.error(format!("invalid timestamp '{}'", ts)))?,
        ),
    };

    cursor.skip_ws();
    if !cursor.rest().is_empty() {
        return Err(cursor.error(format!("unexpected trailing text '{}'", cursor.rest())));
    }

    Ok(Sample {
        name: name.to_string(),
        labels,
        value,
        timestamp,
    })
}

/// Parse `k="v",...}`; the opening brace is already consumed
fn parse_labels(cursor: &mut Cursor<'_>) -> ProbeResult<Labels> {
    let mut labels: Vec<(String, String)> = Vec::new();

    loop {
        cursor.skip_ws();
        match cursor.peek() {
            Some('}') => {
                cursor.bump();
                break;
            }
            None => return Err(cursor.error("unbalanced label braces")),
            Some(_) => {}
        }

        let key = cursor.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_valid_name(key) {
            return Err(cursor.error("invalid label name"));
        }

        cursor.skip_ws();
        if cursor.bump() != Some('=') {
            return Err(cursor.error(format!("expected '=' after label '{}'", key)));
        }
        cursor.skip_ws();
        if cursor.bump() != Some('"') {
            return Err(cursor.error(format!("expected '\"' to open label '{}'", key)));
        }
        let value = parse_label_value(cursor)?;

        if labels.iter().any(|(k, _)| k == key) {
            return Err(cursor.error(format!("duplicate label '{}'", key)));
        }
        labels.push((key.to_string(), value));

        cursor.skip_ws();
        match cursor.bump() {
            Some(',') => continue,
            Some('}') => break,
            None => return Err(cursor.error("unbalanced label braces")),
            Some(c) => return Err(cursor.error(format!("unexpected '{}' in label set", c))),
        }
    }

    Ok(Labels(labels))
}

/// Parse a quoted label value; the opening quote is already consumed
fn parse_label_value(cursor: &mut Cursor<'_>) -> ProbeResult<String> {
    let mut value = String::new();

    loop {
        match cursor.bump() {
            None => return Err(cursor.error("unterminated label value")),
            Some('"') => return Ok(value),
            Some('\\') => match cursor.bump() {
                Some('n') => value.push('\n'),
                Some('\\') => value.push('\\'),
                Some('"') => value.push('"'),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return Err(cursor.error("unterminated label value")),
            },
            Some(c) => value.push(c),
        }
    }
}

fn unescape_help(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

fn is_metric_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_valid_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !c.is_ascii_digit())
}

/// Position within one line
struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    line_no: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str, line_no: usize) -> Self {
        Self {
            line,
            pos: 0,
            line_no,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    fn skip_ws(&mut self) {
        self.take_while(|c| c == ' ' || c == '\t');
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn error(&self, msg: impl fmt::Display) -> ProbeError {
        ProbeError::Parse(format!("line {}: {}", self.line_no, msg))
    }
}
