use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PrepError;
use crate::fs_util;

/// Remote file resolved for one local slide identifier. Both fields empty
/// means the catalog was queried and had no matching file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub file_name: String,
}

impl CacheEntry {
    pub fn resolved(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
        }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Durable slide id -> remote file mapping, stored as a single JSON object
/// that keeps insertion order and is rewritten whole on every flush.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    path: PathBuf,
    entries: IndexMap<String, CacheEntry>,
}

impl ResolutionCache {
    /// Loads the cache at `path`, or starts an empty one if the file does not
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrepError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|err| PrepError::Filesystem(format!("read {}: {err}", path.display())))?;
            serde_json::from_str(&content)
                .map_err(|err| PrepError::CacheParse(format!("{}: {err}", path.display())))?
        } else {
            IndexMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, slide: &str) -> Option<&CacheEntry> {
        self.entries.get(slide)
    }

    /// Inserts or replaces an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, slide: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(slide.into(), entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries
            .iter()
            .map(|(slide, entry)| (slide.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_resolved()).count()
    }

    pub fn flush(&self) -> Result<(), PrepError> {
        let content = serde_json::to_vec_pretty(&self.entries)
            .map_err(|err| PrepError::Filesystem(err.to_string()))?;
        fs_util::write_atomic(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_opens_empty() {
        let temp = tempfile::tempdir().unwrap();
        let cache = ResolutionCache::open(temp.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn replaced_entry_keeps_position() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = ResolutionCache::open(temp.path().join("cache.json")).unwrap();
        cache.insert("b", CacheEntry::unresolved());
        cache.insert("a", CacheEntry::unresolved());
        cache.insert("b", CacheEntry::resolved("uuid-b", "b.svs"));
        let order: Vec<_> = cache.entries().map(|(slide, _)| slide).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(cache.resolved_count(), 1);
    }
}
