use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProbeError, ProbeResult};

/// Default location of the probe configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zabbix/metrics-probe.toml";

/// Key holding the etcd client URL(s) in the etcd environment file
pub const ETCD_URL_KEY: &str = "ETCD_ADVERTISE_CLIENT_URLS";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub etcd: EtcdConfig,
    pub kubernetes: KubernetesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp"),
            ttl_seconds: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 5,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EtcdConfig {
    pub environment_file: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub trusted_ca: PathBuf,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            environment_file: PathBuf::from("/rootfs/etc/etcd-environment"),
            client_cert: PathBuf::from("/rootfs/etc/ssl/certs/etcd-client.pem"),
            client_key: PathBuf::from("/rootfs/etc/ssl/certs/etcd-client-key.pem"),
            trusted_ca: PathBuf::from("/rootfs/etc/ssl/certs/etcd-trusted-ca.pem"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KubernetesConfig {
    pub token_file: PathBuf,
    /// The control plane is usually reached by IP with a self-signed certificate
    pub verify_tls: bool,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            verify_tls: false,
        }
    }
}

/// Load the probe configuration
///
/// Sources, lowest priority first: built-in defaults, the optional TOML file at
/// `path`, then `METRICS_PROBE__SECTION__KEY` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<ProbeConfig> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("METRICS_PROBE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: ProbeConfig = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &ProbeConfig) -> anyhow::Result<()> {
    if cfg.cache.ttl_seconds == 0 {
        anyhow::bail!("cache.ttl_seconds must be greater than zero");
    }

    if cfg.http.connect_timeout_seconds == 0 || cfg.http.timeout_seconds == 0 {
        anyhow::bail!("http timeouts must be greater than zero");
    }

    if cfg.http.connect_timeout_seconds > cfg.http.timeout_seconds {
        anyhow::bail!(
            "http.connect_timeout_seconds ({}) exceeds http.timeout_seconds ({})",
            cfg.http.connect_timeout_seconds,
            cfg.http.timeout_seconds
        );
    }

    Ok(())
}

/// Shell-style `KEY=value` file, as written for etcd's systemd unit
pub struct EnvironmentFile {
    values: config::Config,
}

impl EnvironmentFile {
    pub fn read(path: &Path) -> ProbeResult<Self> {
        let values = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Ini))
            .build()
            .map_err(|e| {
                ProbeError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;

        Ok(Self { values })
    }

    /// Look up a key; the INI reader may have folded it to lower case
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get_string(&key.to_lowercase())
            .or_else(|_| self.values.get_string(key))
            .ok()
            .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    }

    /// First URL listed in `ETCD_ADVERTISE_CLIENT_URLS`, without a trailing slash
    pub fn etcd_client_url(&self) -> ProbeResult<String> {
        let urls = self
            .get(ETCD_URL_KEY)
            .ok_or_else(|| ProbeError::Config(format!("{} is not set", ETCD_URL_KEY)))?;

        urls.split(',')
            .map(str::trim)
            .find(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| ProbeError::Config(format!("{} is empty", ETCD_URL_KEY)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let cfg = load_config(Path::new("/nonexistent/metrics-probe.toml")).unwrap();
        assert_eq!(cfg.cache.ttl_seconds, 60);
        assert_eq!(cfg.cache.dir, PathBuf::from("/tmp"));
        assert_eq!(cfg.http.timeout_seconds, 10);
        assert!(!cfg.kubernetes.verify_tls);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cache]\nttl_seconds = 30\n\n[kubernetes]\nverify_tls = true").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.cache.ttl_seconds, 30);
        assert!(cfg.kubernetes.verify_tls);
        // untouched sections keep their defaults
        assert_eq!(cfg.http.connect_timeout_seconds, 5);
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut cfg = ProbeConfig::default();
        cfg.cache.ttl_seconds = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ttl_seconds"));
    }

    #[test]
    fn test_validate_rejects_connect_timeout_above_total() {
        let mut cfg = ProbeConfig::default();
        cfg.http.connect_timeout_seconds = 30;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_environment_file_first_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ETCD_NAME=node1\nETCD_ADVERTISE_CLIENT_URLS=https://10.0.0.1:2379/,https://10.0.0.2:2379"
        )
        .unwrap();

        let env = EnvironmentFile::read(file.path()).unwrap();
        assert_eq!(env.etcd_client_url().unwrap(), "https://10.0.0.1:2379");
        assert_eq!(env.get("ETCD_NAME").as_deref(), Some("node1"));
    }

    #[test]
    fn test_environment_file_missing_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ETCD_NAME=node1").unwrap();

        let env = EnvironmentFile::read(file.path()).unwrap();
        assert!(matches!(env.etcd_client_url(), Err(ProbeError::Config(_))));
    }

    #[test]
    fn test_environment_file_missing_file() {
        let result = EnvironmentFile::read(Path::new("/nonexistent/etcd-environment"));
        assert!(matches!(result, Err(ProbeError::Config(_))));
    }
}
