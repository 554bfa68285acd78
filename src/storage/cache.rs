use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::common::config::VerificationConfig;
use crate::common::Result;
use crate::storage::{TemplateLookup, TemplateRecord, TemplateSource};

const RETRY_BASE_DELAY_MS: u64 = 250;

struct CacheEntry {
    lookup: TemplateLookup,
    updated_at: Instant,
}

/// Wraps a template source with a freshness window and bounded retries.
pub struct CachedTemplateSource {
    inner: Arc<dyn TemplateSource>,
    ttl: Duration,
    retries: u32,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CachedTemplateSource {
    pub fn new(inner: Arc<dyn TemplateSource>, ttl: Duration, retries: u32) -> Self {
        Self {
            inner,
            ttl,
            retries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(inner: Arc<dyn TemplateSource>, config: &VerificationConfig) -> Self {
        Self::new(inner, Duration::from_secs(config.cache_ttl_secs), config.fetch_retries)
    }

    /// Current lookup state for a user without triggering a fetch.
    pub fn lookup(&self, user_id: &str) -> Option<TemplateLookup> {
        self.entries().get(user_id).map(|entry| entry.lookup.clone())
    }

    /// Drop any cached state so the next fetch goes to the backing source.
    pub fn invalidate(&self, user_id: &str) {
        self.entries().remove(user_id);
    }

    fn fresh(&self, user_id: &str) -> Option<TemplateRecord> {
        let entries = self.entries();
        match entries.get(user_id) {
            Some(CacheEntry { lookup: TemplateLookup::Ready(record), updated_at })
                if updated_at.elapsed() < self.ttl =>
            {
                Some(record.clone())
            }
            _ => None,
        }
    }

    fn set(&self, user_id: &str, lookup: TemplateLookup) {
        self.entries().insert(
            user_id.to_string(),
            CacheEntry { lookup, updated_at: Instant::now() },
        );
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TemplateSource for CachedTemplateSource {
    async fn fetch_template(&self, user_id: &str) -> Result<TemplateRecord> {
        if let Some(record) = self.fresh(user_id) {
            tracing::debug!("Template cache hit for {}", user_id);
            return Ok(record);
        }

        self.set(user_id, TemplateLookup::Loading);

        let mut attempt = 0;
        loop {
            match self.inner.fetch_template(user_id).await {
                Ok(record) => {
                    self.set(user_id, TemplateLookup::Ready(record.clone()));
                    return Ok(record);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Template fetch for {} failed (attempt {}): {}",
                        user_id,
                        attempt,
                        e
                    );
                    let backoff = RETRY_BASE_DELAY_MS * attempt as u64;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    tracing::error!("Template fetch for {} failed: {}", user_id, e);
                    self.set(user_id, TemplateLookup::Failed(e.to_string()));
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FaceScanError;
    use crate::core::types::Template;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySource {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl TemplateSource for FlakySource {
        async fn fetch_template(&self, _user_id: &str) -> Result<TemplateRecord> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(FaceScanError::Storage("backend unavailable".into()))
            } else {
                Ok(TemplateRecord { face_scan: Some(Template::from("stored")) })
            }
        }
    }

    fn cache(failures: u32) -> (Arc<FlakySource>, CachedTemplateSource) {
        let source = Arc::new(FlakySource { calls: AtomicU32::new(0), failures });
        let cache = CachedTemplateSource::new(source.clone(), Duration::from_secs(300), 2);
        (source, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let (source, cache) = cache(2);
        let record = cache.fetch_template("alice").await.unwrap();
        assert_eq!(record.face_scan, Some(Template::from("stored")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.lookup("alice"), Some(TemplateLookup::Ready(record)));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retries() {
        let (source, cache) = cache(10);
        assert!(cache.fetch_template("alice").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(cache.lookup("alice"), Some(TemplateLookup::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn serves_fresh_entries_from_cache() {
        let (source, cache) = cache(0);
        cache.fetch_template("alice").await.unwrap();
        cache.fetch_template("alice").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        cache.fetch_template("alice").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_refetch() {
        let (source, cache) = cache(0);
        cache.fetch_template("alice").await.unwrap();
        cache.invalidate("alice");
        assert_eq!(cache.lookup("alice"), None);
        cache.fetch_template("alice").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
