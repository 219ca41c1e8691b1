use metrics_probe::metrics::{FreshnessCache, HttpTransport};
use metrics_probe::probe::ETCD_CACHE_PREFIX;
use metrics_probe::{MetricsProbe, ProbeError, ProbeOutput, ProbeResult, Query, QueryType};
use std::path::Path;

use crate::cli::EtcdMetricsArgs;

/// Execute an etcd metrics probe
///
/// Only `gauge`, `histogram` and `counter` make sense against etcd; counters
/// are read by their `_total` sample.
pub async fn execute(config_path: &Path, args: EtcdMetricsArgs) -> ProbeResult<ProbeOutput> {
    let kind: QueryType = args.query_type.parse()?;
    if !matches!(kind, QueryType::Gauge | QueryType::Histogram | QueryType::Counter) {
        return Err(ProbeError::NotSupported(format!(
            "query type '{}' for etcd metrics",
            kind
        )));
    }

    let cfg = super::load(config_path)?;
    let url = match args.url {
        Some(url) => url,
        None => format!("{}/metrics", super::etcd_client_url(&cfg)?),
    };

    let transport = HttpTransport::for_etcd(&cfg.http, &cfg.etcd, &url);
    let cache = FreshnessCache::new(&cfg.cache.dir, ETCD_CACHE_PREFIX, cfg.cache.ttl());
    let probe = MetricsProbe::new(transport, cache);

    let query = Query {
        kind,
        url,
        metric: Some(args.metric),
        selector: None,
    };

    probe.run(&query).await
}
