/// End-to-end tests of the binary's output contract
use std::process::Command;

fn probe_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_metrics-probe"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_unknown_type_prints_sentinel_and_fails() {
    let output = probe_command()
        .args(["kube", "-u", "http://127.0.0.1:9/metrics", "-t", "percentile", "-q", "up"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ZBX_NOTSUPPORTED\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("not_supported"));
}

#[test]
fn test_bad_stats_query_prints_sentinel() {
    let output = probe_command()
        .args(["etcd-stats", "-m", "v2/stats/self:a:b"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ZBX_NOTSUPPORTED\n");
}

#[test]
fn test_etcd_metrics_rejects_summary() {
    let output = probe_command()
        .args(["etcd-metrics", "-t", "summary", "-q", "etcd_disk_wal_fsync_duration_seconds"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ZBX_NOTSUPPORTED\n");
}

#[test]
fn test_config_validate_with_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let output = probe_command()
        .args(["-c", path.to_str().unwrap(), "config", "validate"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration is valid"));
}

#[test]
fn test_config_validate_rejects_zero_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.toml");
    std::fs::write(&path, "[cache]\nttl_seconds = 0\n").unwrap();

    let output = probe_command()
        .args(["-c", path.to_str().unwrap(), "config", "validate"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_cached_healthz_is_printed_without_token() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://127.0.0.1:9/healthz";
    let config = dir.path().join("probe.toml");
    std::fs::write(
        &config,
        format!(
            "[cache]\ndir = \"{}\"\n\n[kubernetes]\ntoken_file = \"/nonexistent/token\"\n",
            dir.path().display()
        ),
    )
    .unwrap();
    let entry = dir
        .path()
        .join(format!("zbx_metrics_exporter_stats_{}.txt", hex::encode_upper(url)));
    std::fs::write(&entry, "ok").unwrap();

    let output = probe_command()
        .args(["-c", config.to_str().unwrap(), "kube", "-u", url, "-t", "healthz"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
}
