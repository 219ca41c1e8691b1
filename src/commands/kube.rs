use metrics_probe::metrics::{FreshnessCache, HttpTransport};
use metrics_probe::probe::KUBE_CACHE_PREFIX;
use metrics_probe::{MetricsProbe, ProbeOutput, ProbeResult, Query, QueryType};
use std::path::Path;

use crate::cli::KubeArgs;

/// Execute a control-plane probe
///
/// The query type is checked before any file or network access.
pub async fn execute(config_path: &Path, args: KubeArgs) -> ProbeResult<ProbeOutput> {
    let kind: QueryType = args.query_type.parse()?;
    let cfg = super::load(config_path)?;

    let transport = HttpTransport::for_kubernetes(&cfg.http, &cfg.kubernetes);
    let cache = FreshnessCache::new(&cfg.cache.dir, KUBE_CACHE_PREFIX, cfg.cache.ttl());
    let probe = MetricsProbe::new(transport, cache);

    let query = Query {
        kind,
        url: args.url,
        metric: args.metric,
        selector: args.selector,
    };

    probe.run(&query).await
}
