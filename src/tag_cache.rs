//! Tag name → tag id cache.

use crate::ast::{MetaTag, Tag};
use crate::trie::Trie;
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, warn};

/// Raised when a tag has no id in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tag not found: {key}")]
pub struct TagNotFound {
    /// The canonical key that was looked up.
    pub key: String,
}

/// The string a tag is cached under: `key` for a plain tag,
/// `key:value` for a meta tag.
pub trait CanonicalKey {
    fn canonical_key(&self) -> Cow<'_, str>;
}

impl CanonicalKey for Tag {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.key)
    }
}

impl CanonicalKey for MetaTag {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}:{}", self.key, self.value))
    }
}

/// Already-canonical keys, e.g. rows read back from the tag table.
impl CanonicalKey for str {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl CanonicalKey for String {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl<T: CanonicalKey + ?Sized> CanonicalKey for &T {
    fn canonical_key(&self) -> Cow<'_, str> {
        (**self).canonical_key()
    }
}

/// Maps tags to the ids of their rows in the backing store.
///
/// Only ids stored here ever reach generated SQL; a filter naming an
/// unknown tag fails with [`TagNotFound`] instead.
#[derive(Debug, Clone, Default)]
pub struct TagIdCache {
    tags: Trie<String>,
}

impl TagIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads `(tag, id)` pairs. A later pair for the same canonical
    /// key overwrites an earlier one.
    pub fn init<K, I, V>(&mut self, pairs: I)
    where
        K: CanonicalKey,
        I: IntoIterator<Item = (K, V)>,
        V: Into<String>,
    {
        for (tag, id) in pairs {
            self.on_tag_added(&tag, id);
        }
        debug!(cached = self.tags.len(), "tag id cache initialized");
    }

    pub fn on_tag_added<K>(&mut self, tag: &K, id: impl Into<String>)
    where
        K: CanonicalKey + ?Sized,
    {
        let key = tag.canonical_key();
        if key.is_empty() {
            warn!("ignoring tag with an empty name");
            return;
        }
        let id = id.into();
        debug!(tag = %key, id = %id, "caching tag id");
        self.tags.insert(&key, id);
    }

    pub fn tag_to_tag_id<K>(&self, tag: &K) -> Result<&str, TagNotFound>
    where
        K: CanonicalKey + ?Sized,
    {
        let key = tag.canonical_key();
        self.tags
            .get(&key)
            .map(String::as_str)
            .ok_or_else(|| TagNotFound {
                key: key.into_owned(),
            })
    }

    pub fn contains<K>(&self, tag: &K) -> bool
    where
        K: CanonicalKey + ?Sized,
    {
        self.tags.contains_key(&tag.canonical_key())
    }

    /// Number of cached tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        let cache = TagIdCache::new();
        let err = cache.tag_to_tag_id(&Tag::new("tag1")).unwrap_err();
        assert_eq!(err.key, "tag1");
        assert_eq!(err.to_string(), "Tag not found: tag1");
    }

    #[test]
    fn test_finds_tags() {
        let mut cache = TagIdCache::new();
        cache.on_tag_added(&Tag::new("tag1"), "1");
        cache.on_tag_added(&Tag::new("tag2"), "2");
        cache.on_tag_added(&Tag::new("tag3"), "3");
        cache.on_tag_added(&Tag::new("tag1tag"), "4");

        assert_eq!(cache.tag_to_tag_id(&Tag::new("tag1")), Ok("1"));
        assert_eq!(cache.tag_to_tag_id(&Tag::new("tag2")), Ok("2"));
        assert_eq!(cache.tag_to_tag_id(&Tag::new("tag3")), Ok("3"));
        assert_eq!(cache.tag_to_tag_id(&Tag::new("tag1tag")), Ok("4"));
        assert_eq!(
            cache.tag_to_tag_id(&Tag::new("tag1t")),
            Err(TagNotFound {
                key: "tag1t".to_string()
            })
        );
    }

    #[test]
    fn test_meta_tags_use_combined_key() {
        let mut cache = TagIdCache::new();
        cache.init([(MetaTag::new("color", "red"), "10")]);

        assert_eq!(cache.tag_to_tag_id(&MetaTag::new("color", "red")), Ok("10"));
        assert_eq!(cache.tag_to_tag_id("color:red"), Ok("10"));
        assert!(!cache.contains(&Tag::new("color")));

        let err = cache
            .tag_to_tag_id(&MetaTag::new("color", "blue"))
            .unwrap_err();
        assert_eq!(err.key, "color:blue");
    }

    #[test]
    fn test_init_later_pairs_overwrite() {
        let mut cache = TagIdCache::new();
        cache.init([("tag1", "1"), ("tag2", "2"), ("tag1", "7")]);
        assert_eq!(cache.tag_to_tag_id("tag1"), Ok("7"));
        assert_eq!(cache.len(), 2);

        cache.on_tag_added("tag2", "8");
        assert_eq!(cache.tag_to_tag_id(&Tag::new("tag2")), Ok("8"));
    }

    #[test]
    fn test_empty_key_is_ignored() {
        let mut cache = TagIdCache::new();
        cache.on_tag_added("", "1");
        assert!(cache.is_empty());
        assert!(cache.tag_to_tag_id("").is_err());
    }
}
