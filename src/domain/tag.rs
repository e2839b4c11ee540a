//! Tag domain types
//!
//! A repository's tags are fetched once into a [`TagSet`] snapshot. Every
//! decision about that repository is made against the snapshot.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Repository coordinates as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub namespace: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A single active tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name, unique within the repository
    pub name: String,
    /// Digest of the manifest the tag points at (e.g. "sha256:03fa...")
    pub manifest_digest: String,
    /// When the tag was created, if the registry reported it
    pub created_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn new(name: impl Into<String>, manifest_digest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest_digest: manifest_digest.into(),
            created_at: None,
        }
    }

    /// Builder: set creation time
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// Snapshot of every active tag of one repository, in listing order
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<Tag>,
    by_name: HashMap<String, usize>,
}

impl TagSet {
    pub fn new(tags: Vec<Tag>) -> Self {
        let mut set = Self::default();
        for tag in tags {
            set.push(tag);
        }
        set
    }

    /// Append a tag. A repeated name replaces the earlier entry's lookup slot
    /// but keeps listing order.
    pub fn push(&mut self, tag: Tag) {
        self.by_name.insert(tag.name.clone(), self.tags.len());
        self.tags.push(tag);
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(name).map(|&i| &self.tags[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Manifest digests referenced by at least one tag of the snapshot
#[derive(Debug, Clone, Default)]
pub struct ManifestDigestIndex {
    referenced: HashSet<String>,
}

impl ManifestDigestIndex {
    pub fn build(tags: &TagSet) -> Self {
        let referenced = tags.iter().map(|tag| tag.manifest_digest.clone()).collect();
        Self { referenced }
    }

    /// Whether some tag in the snapshot still references `digest`
    pub fn is_referenced(&self, digest: &str) -> bool {
        self.referenced.contains(digest)
    }
}

/// Inclusive creation-time window `[to, from]`, where `from` is "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from_timestamp: DateTime<Utc>,
    pub to_timestamp: DateTime<Utc>,
}

impl TimeWindow {
    /// Window covering the last `days` days ending at `now`
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            from_timestamp: now,
            to_timestamp: now - Duration::days(i64::from(days)),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.to_timestamp <= at && at <= self.from_timestamp
    }

    /// Tags without a creation time are never in scope.
    pub fn includes(&self, tag: &Tag) -> bool {
        tag.created_at.is_some_and(|at| self.contains(at))
    }

    /// Whether `tag` was created before the window's lower bound
    pub fn is_older(&self, tag: &Tag) -> bool {
        tag.created_at.is_some_and(|at| at < self.to_timestamp)
    }
}
