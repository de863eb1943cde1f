//! Per-epoch set of already emitted plugin names.

use std::collections::HashSet;

/// Names emitted since the last [`PluginNameCache::clear`]; first writer wins.
#[derive(Debug, Default)]
pub struct PluginNameCache {
    names: HashSet<String>,
}

impl PluginNameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every name. Called once per export pass.
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Insert `name` if absent. Returns `false` when it was already emitted
    /// in this epoch and the caller must skip emission.
    pub fn try_reserve(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_string())
    }

    /// Check whether `name` was emitted in this epoch.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of names reserved in this epoch.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if nothing was reserved yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_writer_wins() {
        let mut cache = PluginNameCache::new();
        assert!(cache.try_reserve("OBCube"));
        assert!(!cache.try_reserve("OBCube"));
        assert!(cache.try_reserve("MECube"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_starts_new_epoch() {
        let mut cache = PluginNameCache::new();
        cache.try_reserve("OBCube");
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.try_reserve("OBCube"));
    }
}
