//! Leader lookup for control-plane components
//!
//! kube-controller-manager and kube-scheduler record their leader election in
//! an annotation on an Endpoints object in `kube-system`. The annotation value
//! is itself a JSON document.

use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{ProbeError, ProbeResult};

pub const LEADER_ANNOTATION: &str = "control-plane.alpha.kubernetes.io/leader";

#[derive(Debug, Deserialize)]
struct Endpoints {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LeaderRecord {
    #[serde(rename = "holderIdentity")]
    holder_identity: String,
}

/// `<scheme>://<host>[:port]/<path>` for any URL on the same server
pub fn server_url(url: &str, path: &str) -> ProbeResult<String> {
    let base = Url::parse(url)
        .map_err(|e| ProbeError::BadQuerySyntax(format!("invalid url '{}': {}", url, e)))?;
    let joined = base
        .join(&format!("/{}", path.trim_start_matches('/')))
        .map_err(|e| ProbeError::BadQuerySyntax(format!("invalid path '{}': {}", path, e)))?;
    Ok(joined.to_string())
}

/// Endpoints object of `component` in `kube-system`
pub fn endpoints_url(url: &str, component: &str) -> ProbeResult<String> {
    if component.is_empty() || component.contains('/') {
        return Err(ProbeError::BadQuerySyntax(format!(
            "invalid component name '{}'",
            component
        )));
    }
    server_url(url, &format!("api/v1/namespaces/kube-system/endpoints/{}", component))
}

/// Extract `holderIdentity` from an Endpoints document
///
/// # Errors
/// `ProbeError::NotFound` for bad JSON, a missing annotation or a missing
/// identity.
pub fn holder_identity(body: &[u8]) -> ProbeResult<String> {
    let endpoints: Endpoints = serde_json::from_slice(body)
        .map_err(|e| ProbeError::NotFound(format!("leader record: {}", e)))?;

    let raw = endpoints
        .metadata
        .annotations
        .get(LEADER_ANNOTATION)
        .ok_or_else(|| ProbeError::NotFound(format!("annotation {}", LEADER_ANNOTATION)))?;

    let record: LeaderRecord = serde_json::from_str(raw)
        .map_err(|e| ProbeError::NotFound(format!("holderIdentity: {}", e)))?;

    Ok(record.holder_identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoints_with(annotation: &str) -> Vec<u8> {
        json!({
            "kind": "Endpoints",
            "metadata": {
                "name": "kube-scheduler",
                "annotations": { LEADER_ANNOTATION: annotation }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_server_url_drops_path() {
        assert_eq!(
            server_url("https://10.0.0.222:443/metrics", "version").unwrap(),
            "https://10.0.0.222/version"
        );
        assert_eq!(
            server_url("https://10.0.0.222:6443/healthz", "/version").unwrap(),
            "https://10.0.0.222:6443/version"
        );
    }

    #[test]
    fn test_server_url_rejects_garbage() {
        assert!(matches!(
            server_url("not a url", "version"),
            Err(ProbeError::BadQuerySyntax(_))
        ));
    }

    #[test]
    fn test_endpoints_url() {
        assert_eq!(
            endpoints_url("https://10.0.0.222:6443", "kube-scheduler").unwrap(),
            "https://10.0.0.222:6443/api/v1/namespaces/kube-system/endpoints/kube-scheduler"
        );
        assert!(endpoints_url("https://10.0.0.222:6443", "").is_err());
    }

    #[test]
    fn test_holder_identity() {
        let body = endpoints_with(
            r#"{"holderIdentity":"master-1_4f1c","leaseDurationSeconds":15,"leaderTransitions":2}"#,
        );
        assert_eq!(holder_identity(&body).unwrap(), "master-1_4f1c");
    }

    #[test]
    fn test_missing_annotation() {
        let body = json!({"metadata": {"name": "x"}}).to_string();
        assert!(matches!(
            holder_identity(body.as_bytes()),
            Err(ProbeError::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_inner_json() {
        let body = endpoints_with("not json");
        assert!(matches!(holder_identity(&body), Err(ProbeError::NotFound(_))));
    }

    #[test]
    fn test_bad_outer_json() {
        assert!(matches!(
            holder_identity(b"<html>"),
            Err(ProbeError::NotFound(_))
        ));
    }
}
