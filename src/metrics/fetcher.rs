//! HTTP transport for probe targets
//!
//! A thin wrapper around `reqwest::Client` that performs one authenticated GET
//! per call. Authentication is either a bearer token (Kubernetes service
//! account) or a TLS client certificate (etcd), loaded on first use.

use reqwest::{Certificate, Client, Identity, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{EtcdConfig, HttpConfig, KubernetesConfig};
use crate::error::{ProbeError, ProbeResult};

/// How the transport authenticates against the target
#[derive(Clone)]
pub enum Auth {
    None,
    Bearer(String),
    ClientCertificate {
        /// Private key followed by the certificate chain, PEM encoded
        identity_pem: Vec<u8>,
        ca_pem: Option<Vec<u8>>,
    },
}

impl Auth {
    /// Read the service account token for the control plane
    pub fn bearer_from_file(path: &Path) -> ProbeResult<Self> {
        let token = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::Config(format!("cannot read token {}: {}", path.display(), e))
        })?;

        Ok(Self::Bearer(token.trim().to_string()))
    }

    /// Load the etcd client certificate, key and trusted CA
    pub fn client_certificate(cfg: &EtcdConfig) -> ProbeResult<Self> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| {
                ProbeError::Config(format!("cannot read {}: {}", path.display(), e))
            })
        };

        let mut identity_pem = read(&cfg.client_key)?;
        identity_pem.push(b'\n');
        identity_pem.extend(read(&cfg.client_cert)?);

        Ok(Self::ClientCertificate {
            identity_pem,
            ca_pem: Some(read(&cfg.trusted_ca)?),
        })
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bearer(_) => write!(f, "Bearer(***)"),
            Self::ClientCertificate { ca_pem, .. } => f
                .debug_struct("ClientCertificate")
                .field("ca", &ca_pem.is_some())
                .finish(),
        }
    }
}

/// Where request credentials come from
#[derive(Debug, Clone)]
enum CredentialSource {
    Ready(Auth),
    TokenFile(PathBuf),
    EtcdCertificates(EtcdConfig),
}

impl CredentialSource {
    fn load(&self) -> ProbeResult<Auth> {
        match self {
            Self::Ready(auth) => Ok(auth.clone()),
            Self::TokenFile(path) => Auth::bearer_from_file(path),
            Self::EtcdCertificates(cfg) => Auth::client_certificate(cfg),
        }
    }
}

struct Session {
    client: Client,
    auth: Auth,
}

/// HTTP client wrapper for fetching probe targets
///
/// Credentials are read and the client is built on the first request, so a
/// probe answered from the cache never touches tokens or certificates.
pub struct HttpTransport {
    http: HttpConfig,
    verify_tls: bool,
    credentials: CredentialSource,
    session: OnceCell<Session>,
}

impl HttpTransport {
    /// Create a transport with explicit connect and total timeouts
    ///
    /// # Arguments
    /// * `http` - Timeout settings
    /// * `auth` - Credentials attached to every request
    /// * `verify_tls` - Whether the server certificate must be valid
    pub fn new(http: &HttpConfig, auth: Auth, verify_tls: bool) -> Self {
        Self::with_credentials(http, CredentialSource::Ready(auth), verify_tls)
    }

    fn with_credentials(http: &HttpConfig, credentials: CredentialSource, verify_tls: bool) -> Self {
        Self {
            http: http.clone(),
            verify_tls,
            credentials,
            session: OnceCell::new(),
        }
    }

    /// Transport for the Kubernetes control plane (service account token)
    pub fn for_kubernetes(http: &HttpConfig, kube: &KubernetesConfig) -> Self {
        let credentials = CredentialSource::TokenFile(kube.token_file.clone());
        Self::with_credentials(http, credentials, kube.verify_tls)
    }

    /// Transport for etcd; certificates are only used for `https` targets
    pub fn for_etcd(http: &HttpConfig, etcd: &EtcdConfig, url: &str) -> Self {
        let credentials = if url.starts_with("https://") {
            CredentialSource::EtcdCertificates(etcd.clone())
        } else {
            CredentialSource::Ready(Auth::None)
        };
        Self::with_credentials(http, credentials, true)
    }

    fn connect(&self) -> ProbeResult<Session> {
        let auth = self.credentials.load()?;

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(self.http.connect_timeout_seconds))
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .danger_accept_invalid_certs(!self.verify_tls);

        if let Auth::ClientCertificate {
            identity_pem,
            ca_pem,
        } = &auth
        {
            let identity = Identity::from_pem(identity_pem)
                .map_err(|e| ProbeError::Config(format!("invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);

            if let Some(ca) = ca_pem {
                let ca = Certificate::from_pem(ca)
                    .map_err(|e| ProbeError::Config(format!("invalid CA certificate: {}", e)))?;
                builder = builder.add_root_certificate(ca);
            }
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::Config(format!("cannot build HTTP client: {}", e)))?;

        debug!(auth = ?auth, "HTTP client ready");
        Ok(Session { client, auth })
    }

    /// Fetch the raw body of `url`
    ///
    /// A 403 body is returned as payload: the monitored systems answer
    /// access-denied requests with a parseable document.
    ///
    /// # Errors
    /// - `ProbeError::Config` if credentials cannot be loaded
    /// - `ProbeError::Network` if the request or body read fails
    /// - `ProbeError::Upstream` for any other non-2xx status
    pub async fn get(&self, url: &str) -> ProbeResult<Vec<u8>> {
        let session = self
            .session
            .get_or_try_init(|| async { self.connect() })
            .await?;

        let mut request = session.client.get(url);
        if let Auth::Bearer(token) = &session.auth {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(url, status = status.as_u16(), bytes = body.len(), "Fetched target");

        if status.is_success() || status == StatusCode::FORBIDDEN {
            Ok(body.to_vec())
        } else {
            Err(ProbeError::Upstream {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}
