use anyhow::Result;
use colored::Colorize;
use metrics_probe::config::{self, EnvironmentFile, ProbeConfig};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration (defaults, file, environment)
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    // Serialize to TOML format
    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
///
/// Validates the configuration and reports which referenced files are present.
/// Missing files are reported, not fatal: a host usually runs only one of the
/// probed components.
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %path.display(), "Validating configuration file");

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Cache:".bold());
    println!("  Directory: {}", cfg.cache.dir.display());
    println!("  TTL: {}s", cfg.cache.ttl_seconds);
    println!();

    println!("{}", "Referenced files:".bold());
    for (label, file) in referenced_files(&cfg) {
        println!("  {}: {} ({})", label.cyan(), file.display(), file_status(file));
    }
    println!();

    println!("{}", "etcd:".bold());
    match EnvironmentFile::read(&cfg.etcd.environment_file).and_then(|env| env.etcd_client_url()) {
        Ok(url) => println!("  Client URL: {}", url),
        Err(e) => println!("  Client URL: {}", e.to_string().red()),
    }

    info!("Configuration validation completed");
    Ok(())
}

fn referenced_files(cfg: &ProbeConfig) -> Vec<(&'static str, &Path)> {
    vec![
        ("Kubernetes token", cfg.kubernetes.token_file.as_path()),
        ("etcd environment", cfg.etcd.environment_file.as_path()),
        ("etcd client cert", cfg.etcd.client_cert.as_path()),
        ("etcd client key", cfg.etcd.client_key.as_path()),
        ("etcd trusted CA", cfg.etcd.trusted_ca.as_path()),
    ]
}

fn file_status(path: &Path) -> colored::ColoredString {
    if path.is_file() {
        "found".green()
    } else {
        "missing".red()
    }
}
