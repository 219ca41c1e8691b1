use metrics_probe::etcd_stats::StatsQuery;
use metrics_probe::metrics::{FreshnessCache, HttpTransport};
use metrics_probe::probe::ETCD_CACHE_PREFIX;
use metrics_probe::{MetricsProbe, ProbeOutput, ProbeResult};
use std::path::Path;

use crate::cli::EtcdStatsArgs;

/// Execute an etcd v2 stats probe
pub async fn execute(config_path: &Path, args: EtcdStatsArgs) -> ProbeResult<ProbeOutput> {
    let query: StatsQuery = args.metric.parse()?;

    let cfg = super::load(config_path)?;
    let base_url = match args.url {
        Some(url) => url,
        None => super::etcd_client_url(&cfg)?,
    };

    let transport = HttpTransport::for_etcd(&cfg.http, &cfg.etcd, &base_url);
    let cache = FreshnessCache::new(&cfg.cache.dir, ETCD_CACHE_PREFIX, cfg.cache.ttl());
    let probe = MetricsProbe::new(transport, cache);

    probe.run_stats(&base_url, &query).await
}
