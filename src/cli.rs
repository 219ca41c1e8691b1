use clap::{Args, Parser, Subcommand};
use metrics_probe::config::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "metrics-probe",
    version,
    about = "Zabbix probes for etcd and Kubernetes control-plane metrics"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Probe a kube-apiserver or kubelet endpoint
    #[command(alias = "apiserver")]
    Kube(KubeArgs),

    /// Probe the etcd /metrics endpoint
    EtcdMetrics(EtcdMetricsArgs),

    /// Probe the etcd v2 stats API
    EtcdStats(EtcdStatsArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone)]
pub struct KubeArgs {
    /// Target URL (e.g. https://10.0.0.222:443/metrics)
    #[arg(short = 'u', long)]
    pub url: String,

    /// Query type: healthz, gauge, counter, summary, histogram, get_leader
    #[arg(short = 't', long = "type")]
    pub query_type: String,

    /// Metric name, or component name for get_leader
    #[arg(short = 'q', long = "query")]
    pub metric: Option<String>,

    /// VERB:total_count|error_count for counters, VERB for summaries
    #[arg(short = 'v', long = "verb")]
    pub selector: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EtcdMetricsArgs {
    /// Query type: gauge, counter, histogram
    #[arg(short = 't', long = "type")]
    pub query_type: String,

    /// Metric name
    #[arg(short = 'q', long = "query")]
    pub metric: String,

    /// Metrics URL (defaults to ETCD_ADVERTISE_CLIENT_URLS + /metrics)
    #[arg(short = 'u', long)]
    pub url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EtcdStatsArgs {
    /// <stat>:<path>, e.g. v2/stats/self:recvAppendRequestCnt, or v2/members
    #[arg(short = 'm', long)]
    pub metric: String,

    /// etcd client URL (defaults to ETCD_ADVERTISE_CLIENT_URLS)
    #[arg(short = 'u', long)]
    pub url: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration
    Show,

    /// Validate configuration and referenced files
    Validate,
}
