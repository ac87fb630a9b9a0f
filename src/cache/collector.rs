//! Per-request tag collection.

use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::tags::{CacheTagSet, Lifetime};

/// Source of the tag set for one request.
///
/// `collect` hands the set over at most once; later calls return `None`.
pub trait CacheTagCollector: Send + Sync {
    fn collect(&self) -> Option<CacheTagSet>;
}

/// Collector shared between the cache-tag stage and the core handler
/// through request extensions.
///
/// ```ignore
/// async fn page(Extension(tags): Extension<RequestCacheCollector>) -> Html<String> {
///     tags.add_tags(["pages_12", "tt_content_4"]);
///     tags.limit_lifetime(Lifetime::Seconds(3600));
///     render().await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestCacheCollector {
    inner: Arc<Mutex<Option<CacheTagSet>>>,
}

impl RequestCacheCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(CacheTagSet::new()))),
        }
    }

    pub fn add_tag(&self, tag: impl Into<String>) {
        self.with_set(|set| set.insert(tag));
    }

    pub fn add_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_set(|set| {
            for tag in tags {
                set.insert(tag);
            }
        });
    }

    pub fn limit_lifetime(&self, lifetime: Lifetime) {
        self.with_set(|set| set.limit_lifetime(lifetime));
    }

    // Writes after the set was collected are dropped.
    fn with_set(&self, f: impl FnOnce(&mut CacheTagSet)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = guard.as_mut() {
            f(set);
        }
    }
}

impl Default for RequestCacheCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheTagCollector for RequestCacheCollector {
    fn collect(&self) -> Option<CacheTagSet> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
