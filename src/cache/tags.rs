//! Tag set and lifetime reported by the core handler.

use std::fmt;

/// Header value used for an unbounded lifetime (one year).
pub const UNBOUNDED_LIFETIME_SECS: u64 = 31_536_000;

/// How long a cached response stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    Seconds(u64),
    #[default]
    Unbounded,
}

impl Lifetime {
    /// Lifetime in seconds as emitted in headers.
    pub fn as_secs(&self) -> u64 {
        match self {
            Lifetime::Seconds(n) => *n,
            Lifetime::Unbounded => UNBOUNDED_LIFETIME_SECS,
        }
    }

    /// The shorter of two lifetimes.
    pub fn min(self, other: Lifetime) -> Lifetime {
        match (self, other) {
            (Lifetime::Unbounded, x) | (x, Lifetime::Unbounded) => x,
            (Lifetime::Seconds(a), Lifetime::Seconds(b)) => Lifetime::Seconds(a.min(b)),
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_secs())
    }
}

/// Insertion-ordered, duplicate-free set of tags plus a lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTagSet {
    tags: Vec<String>,
    lifetime: Lifetime,
}

impl CacheTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag. Empty and repeated tags are ignored.
    pub fn insert(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return;
        }
        self.tags.push(tag.to_string());
    }

    /// Lower the lifetime to `lifetime` if it is shorter than the current one.
    pub fn limit_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime = self.lifetime.min(lifetime);
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Comma-joined tag list, in insertion order.
    pub fn header_value(&self) -> String {
        self.tags.join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for CacheTagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CacheTagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}
