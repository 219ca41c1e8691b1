//! Command implementations for the CLI
//!
//! - kube: kube-apiserver / kubelet metrics, health and leader probes
//! - etcd_metrics: etcd Prometheus metrics probe
//! - etcd_stats: etcd v2 stats probe
//! - config: configuration display and validation

pub mod config;
pub mod etcd_metrics;
pub mod etcd_stats;
pub mod kube;

use metrics_probe::config::{load_config, EnvironmentFile, ProbeConfig};
use metrics_probe::{ProbeError, ProbeOutput, ProbeResult, NOT_SUPPORTED};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing::error;

/// Load configuration for a probe command; failures become probe errors
fn load(path: &Path) -> ProbeResult<ProbeConfig> {
    load_config(path).map_err(|e| ProbeError::Config(format!("{:#}", e)))
}

/// etcd client URL from the etcd environment file
fn etcd_client_url(cfg: &ProbeConfig) -> ProbeResult<String> {
    EnvironmentFile::read(&cfg.etcd.environment_file)?.etcd_client_url()
}

/// Print the probe result, or the sentinel and log the error
///
/// Stdout only ever carries the value or `ZBX_NOTSUPPORTED`.
pub fn report(result: ProbeResult<ProbeOutput>) -> ExitCode {
    match result {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            match output.write_to(&mut stdout).and_then(|_| stdout.flush()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "Failed to write probe result");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Probe failed");
            println!("{}", NOT_SUPPORTED);
            ExitCode::FAILURE
        }
    }
}
