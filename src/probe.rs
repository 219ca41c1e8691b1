//! Probe driver
//!
//! Ties the pipeline together: fetch (through the freshness cache), parse,
//! select, aggregate. One `MetricsProbe` answers one query per invocation.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};
use crate::etcd_stats::{self, StatsQuery};
use crate::leader;
use crate::metrics::aggregate::{self, CounterSelector};
use crate::metrics::cache::{CacheKey, FreshnessCache};
use crate::metrics::fetcher::HttpTransport;
use crate::metrics::parser::{self, Exposition};
use crate::metrics::selector::normalize_counter_name;
use crate::metrics::version::{ApiVersion, LabelOrder};

/// Sentinel printed instead of a value when a probe fails
pub const NOT_SUPPORTED: &str = "ZBX_NOTSUPPORTED";

/// Cache file prefix for control-plane targets
pub const KUBE_CACHE_PREFIX: &str = "zbx_metrics_exporter_stats";

/// Cache file prefix for etcd targets
pub const ETCD_CACHE_PREFIX: &str = "zbx_etcd_stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Gauge,
    Counter,
    Summary,
    /// A single histogram component (`_sum`, `_count`, `_bucket`); read like a gauge
    Histogram,
    Healthz,
    GetLeader,
}

impl FromStr for QueryType {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            "summary" => Ok(Self::Summary),
            "histogram" => Ok(Self::Histogram),
            "healthz" => Ok(Self::Healthz),
            "get_leader" => Ok(Self::GetLeader),
            other => Err(ProbeError::NotSupported(format!("query type '{}'", other))),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Summary => "summary",
            Self::Histogram => "histogram",
            Self::Healthz => "healthz",
            Self::GetLeader => "get_leader",
        };
        f.write_str(s)
    }
}

/// One probe request
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryType,
    pub url: String,
    /// Metric name, or the component name for `get_leader`
    pub metric: Option<String>,
    /// `VERB:mode` for counters, `VERB` for summaries
    pub selector: Option<String>,
}

impl Query {
    fn metric(&self) -> ProbeResult<&str> {
        self.metric
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ProbeError::BadQuerySyntax(format!("{} query needs -q", self.kind)))
    }
}

/// Final scalar written to stdout
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutput {
    Number(f64),
    Text(String),
    /// Fetched body passed through byte for byte
    Raw(Vec<u8>),
}

impl ProbeOutput {
    /// Write the value and a trailing newline
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        match self {
            Self::Raw(body) => out.write_all(body)?,
            other => write!(out, "{}", other)?,
        }
        out.write_all(b"\n")
    }
}

impl fmt::Display for ProbeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `-0` is rejected by unsigned items
            Self::Number(v) => write!(f, "{}", v + 0.0),
            Self::Text(s) => f.write_str(s),
            Self::Raw(body) => f.write_str(&String::from_utf8_lossy(body)),
        }
    }
}

pub struct MetricsProbe {
    transport: HttpTransport,
    cache: FreshnessCache,
}

impl MetricsProbe {
    pub fn new(transport: HttpTransport, cache: FreshnessCache) -> Self {
        Self { transport, cache }
    }

    /// Body of `url`, from the cache when fresh
    pub async fn fetch(&self, url: &str) -> ProbeResult<Vec<u8>> {
        self.cache
            .get_or_fetch(&CacheKey::for_url(url), || self.transport.get(url))
            .await
    }

    /// Body of `<base_url>/<stat>`, cached per stat type
    pub async fn fetch_stat(&self, stat: &str, base_url: &str) -> ProbeResult<Vec<u8>> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), stat);
        self.cache
            .get_or_fetch(&CacheKey::for_stat(stat, base_url), || {
                self.transport.get(&url)
            })
            .await
    }

    pub async fn exposition(&self, url: &str) -> ProbeResult<Exposition> {
        let body = self.fetch(url).await?;
        parser::parse_bytes(&body)
    }

    /// Version of the control plane serving `url`, from its `/version` endpoint
    pub async fn api_version(&self, url: &str) -> ProbeResult<ApiVersion> {
        let version_url = leader::server_url(url, "version")?;
        let body = self.fetch(&version_url).await?;
        let version = ApiVersion::from_document(&body)?;
        debug!(%version, "Detected API version");
        Ok(version)
    }

    /// Answer one metrics query
    pub async fn run(&self, query: &Query) -> ProbeResult<ProbeOutput> {
        debug!(kind = %query.kind, url = %query.url, metric = ?query.metric, "Running probe");

        match query.kind {
            QueryType::Healthz => {
                let body = self.fetch(&query.url).await?;
                Ok(ProbeOutput::Raw(body))
            }
            QueryType::Gauge | QueryType::Histogram => {
                let name = query.metric()?;
                let expo = self.exposition(&query.url).await?;
                Ok(ProbeOutput::Number(aggregate::gauge(&expo, name)?))
            }
            QueryType::Counter => {
                let name = query.metric()?;
                match &query.selector {
                    None => {
                        let name = normalize_counter_name(name);
                        let expo = self.exposition(&query.url).await?;
                        Ok(ProbeOutput::Number(aggregate::gauge(&expo, &name)?))
                    }
                    Some(selector) => {
                        let selector: CounterSelector = selector.parse()?;
                        let expo = self.exposition(&query.url).await?;
                        let order = LabelOrder::from(self.api_version(&query.url).await?);
                        Ok(ProbeOutput::Number(aggregate::counter(
                            &expo, name, &selector, order,
                        )?))
                    }
                }
            }
            QueryType::Summary => {
                let name = query.metric()?;
                let verb = query
                    .selector
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| ProbeError::BadQuerySyntax("summary query needs -v".to_string()))?;
                let expo = self.exposition(&query.url).await?;
                let order = LabelOrder::from(self.api_version(&query.url).await?);
                Ok(ProbeOutput::Number(aggregate::summary(&expo, name, verb, order)?))
            }
            QueryType::GetLeader => {
                let component = query.metric()?;
                let url = leader::endpoints_url(&query.url, component)?;
                let body = self.fetch(&url).await?;
                Ok(ProbeOutput::Text(leader::holder_identity(&body)?))
            }
        }
    }

    /// Answer one etcd v2 stats query against `base_url`
    pub async fn run_stats(&self, base_url: &str, query: &StatsQuery) -> ProbeResult<ProbeOutput> {
        let body = self.fetch_stat(query.stat(), base_url).await?;

        let text = match query {
            StatsQuery::Members => etcd_stats::members_discovery(&body)?,
            StatsQuery::Metric { stat, path } => etcd_stats::lookup(&body, stat, path)?,
        };
        Ok(ProbeOutput::Text(text))
    }
}
