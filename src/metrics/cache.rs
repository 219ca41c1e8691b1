//! On-disk freshness cache for fetched bodies
//!
//! Several probe invocations usually hit the same endpoint within one agent
//! poll cycle, so the raw body is kept on disk and reused while it is younger
//! than the TTL. The cache is read-mostly and last-writer-wins: concurrent
//! misses may both fetch, and each writer renames its own temporary file into
//! place, so no reader sees a partial file. There is no locking.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::error::ProbeResult;

/// Source of the current time, replaceable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Identity of a cache entry
///
/// Built from upper-case hex encodings of its parts joined by `_`. Hex never
/// contains `_`, so distinct targets always map to distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a plain target URL
    pub fn for_url(url: &str) -> Self {
        Self(hex::encode_upper(url))
    }

    /// Key for a stat type fetched from a shared base URL
    pub fn for_stat(stat: &str, url: &str) -> Self {
        Self(format!(
            "{}_{}",
            hex::encode_upper(stat),
            hex::encode_upper(url)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct FreshnessCache {
    dir: PathBuf,
    prefix: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FreshnessCache {
    /// Create a cache storing files as `<dir>/<prefix>_<key>.txt`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(dir, prefix, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            ttl,
            clock,
        }
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", self.prefix, key.as_str()))
    }

    /// Return the cached body for `key`, or run `fetch` and store its result
    ///
    /// Fetch errors propagate unchanged. A failure to store the fetched body is
    /// logged and ignored; the body is still returned.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> ProbeResult<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProbeResult<Vec<u8>>>,
    {
        let path = self.path_for(key);

        if let Some(body) = self.read_fresh(&path).await {
            debug!(path = %path.display(), bytes = body.len(), "Cache hit");
            return Ok(body);
        }

        debug!(path = %path.display(), "Cache miss");
        let body = fetch().await?;

        if let Err(e) = store(&path, &body) {
            warn!(path = %path.display(), error = %e, "Failed to write cache file");
        }

        Ok(body)
    }

    async fn read_fresh(&self, path: &Path) -> Option<Vec<u8>> {
        let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;

        // an mtime in the future counts as age zero
        let age = self
            .clock
            .now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age < self.ttl {
            tokio::fs::read(path).await.ok()
        } else {
            None
        }
    }
}

/// Write `body` to a uniquely named file next to `path` and rename it into place
///
/// Each writer owns its temporary file, so concurrent misses on one key never
/// share a partially written file.
fn store(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".zbx_cache")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    tmp.write_all(body)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    // rename must stay the last step
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ManualClock(Mutex<SystemTime>);

    impl ManualClock {
        fn new() -> Self {
            Self(Mutex::new(SystemTime::now()))
        }

        fn set(&self, to: SystemTime) {
            *self.0.lock().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            *self.0.lock().unwrap()
        }
    }

    fn cache_in(dir: &Path, clock: Arc<ManualClock>) -> FreshnessCache {
        FreshnessCache::with_clock(dir, "zbx_test_stats", Duration::from_secs(60), clock)
    }

    #[test]
    fn test_cache_key_is_hex_of_url() {
        let key = CacheKey::for_url("http://a/metrics");
        assert_eq!(key.as_str(), "687474703A2F2F612F6D657472696373");
    }

    #[test]
    fn test_cache_key_is_injective_over_stat_and_url() {
        let a = CacheKey::for_stat("v2/stats/self", "http://a");
        let b = CacheKey::for_stat("v2/stats/store", "http://a");
        let c = CacheKey::for_url("http://a");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_path_for_uses_prefix() {
        let cache = FreshnessCache::new("/tmp", "zbx_etcd_stats", Duration::from_secs(60));
        let path = cache.path_for(&CacheKey::for_url("x"));
        assert_eq!(path, PathBuf::from("/tmp/zbx_etcd_stats_78.txt"));
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let cache = cache_in(dir.path(), clock.clone());
        let key = CacheKey::for_url("http://node/metrics");
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"up 1\n".to_vec())
            })
            .await
            .unwrap();

        let second = cache
            .get_or_fetch(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"up 0\n".to_vec())
            })
            .await
            .unwrap();

        assert_eq!(first, b"up 1\n");
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let cache = cache_in(dir.path(), clock.clone());
        let key = CacheKey::for_url("http://node/metrics");

        cache
            .get_or_fetch(&key, || async { Ok(b"old".to_vec()) })
            .await
            .unwrap();
        let written = std::fs::metadata(cache.path_for(&key))
            .unwrap()
            .modified()
            .unwrap();

        clock.set(written + Duration::from_secs(59));
        let body = cache
            .get_or_fetch(&key, || async { Ok(b"new".to_vec()) })
            .await
            .unwrap();
        assert_eq!(body, b"old");

        clock.set(written + Duration::from_secs(60));
        let body = cache
            .get_or_fetch(&key, || async { Ok(b"new".to_vec()) })
            .await
            .unwrap();
        assert_eq!(body, b"new");

        // the refreshed body replaced the file
        let on_disk = std::fs::read(cache.path_for(&key)).unwrap();
        assert_eq!(on_disk, b"new");
    }

    #[tokio::test]
    async fn test_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), Arc::new(ManualClock::new()));
        let key = CacheKey::for_url("http://node/metrics");
        let payload: Vec<u8> = (0u8..=255).collect();

        let fetched = payload.clone();
        cache
            .get_or_fetch(&key, || async move { Ok(fetched) })
            .await
            .unwrap();

        let cached = cache
            .get_or_fetch(&key, || async {
                Err::<Vec<u8>, _>(ProbeError::NotFound("fresh entry refetched".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(cached, payload);
        // only the entry itself is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), Arc::new(ManualClock::new()));
        let key = CacheKey::for_url("http://node/metrics");

        let result = cache
            .get_or_fetch(&key, || async {
                Err::<Vec<u8>, _>(ProbeError::NotFound("gone".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ProbeError::NotFound(_))));
        assert!(!cache.path_for(&key).exists());
    }

    #[test]
    fn test_concurrent_writers_never_expose_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zbx_test_stats_41.txt");
        const SIZE: usize = 4 * 1024 * 1024;
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut torn = 0;
                while !done.load(Ordering::SeqCst) {
                    if let Ok(body) = std::fs::read(&path) {
                        if body.len() != SIZE || body.iter().any(|b| *b != body[0]) {
                            torn += 1;
                        }
                    }
                }
                torn
            });

            let writers: Vec<_> = [b'a', b'b', b'c', b'd']
                .into_iter()
                .map(|fill| {
                    let path = &path;
                    scope.spawn(move || {
                        let body = vec![fill; SIZE];
                        for _ in 0..8 {
                            store(path, &body).unwrap();
                        }
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, Ordering::SeqCst);
            assert_eq!(reader.join().unwrap(), 0);
        });

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_dir_still_returns_body() {
        let cache = FreshnessCache::new(
            "/nonexistent/cache/dir",
            "zbx_test_stats",
            Duration::from_secs(60),
        );
        let key = CacheKey::for_url("http://node/metrics");

        let body = cache
            .get_or_fetch(&key, || async { Ok(b"up 1".to_vec()) })
            .await
            .unwrap();
        assert_eq!(body, b"up 1");
    }
}
