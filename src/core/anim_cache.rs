//! Per-plugin, per-attribute record of the last exported value.
//!
//! Drives keyframe decisions in [`crate::exporter::PluginWriter`]: an entry
//! holds the frame of the last emitted keyframe together with the current
//! value and its hash.

use std::collections::HashMap;

use super::hash::ValueHash;
use super::value::AttrValue;

/// Last known state of one plugin attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    /// Frame of the keyframe the renderer last received for this attribute.
    pub frame: f64,
    /// Value at that keyframe.
    pub value: AttrValue,
    /// Hash of `value`.
    pub hash: ValueHash,
}

/// Map of `(plugin, attribute) -> CacheEntry`.
#[derive(Debug, Default)]
pub struct AnimationCache {
    plugins: HashMap<String, HashMap<String, CacheEntry>>,
}

impl AnimationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A plugin is known once at least one of its attributes was recorded.
    pub fn is_known(&self, plugin: &str) -> bool {
        self.plugins.get(plugin).is_some_and(|attrs| !attrs.is_empty())
    }

    /// Get the entry for `plugin.attr`, if it was ever recorded.
    pub fn get(&self, plugin: &str, attr: &str) -> Option<&CacheEntry> {
        self.plugins.get(plugin)?.get(attr)
    }

    /// Record (overwriting) the entry for `plugin.attr`.
    pub fn put(&mut self, plugin: &str, attr: &str, frame: f64, value: AttrValue, hash: ValueHash) {
        let entry = CacheEntry { frame, value, hash };
        if let Some(attrs) = self.plugins.get_mut(plugin) {
            attrs.insert(attr.to_string(), entry);
            return;
        }
        self.plugins
            .entry(plugin.to_string())
            .or_default()
            .insert(attr.to_string(), entry);
    }

    /// Drop every entry (new render job / frame-range reset).
    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// Number of plugins with recorded attributes.
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_str;

    #[test]
    fn test_known_after_first_put() {
        let mut cache = AnimationCache::new();
        assert!(!cache.is_known("LAlamp"));
        let value = AttrValue::float(2.0);
        let hash = hash_str(value.text());
        cache.put("LAlamp", "intensity", 1.0, value.clone(), hash);
        assert!(cache.is_known("LAlamp"));

        let entry = cache.get("LAlamp", "intensity").unwrap();
        assert_eq!(entry.frame, 1.0);
        assert_eq!(entry.value, value);
        assert!(cache.get("LAlamp", "color").is_none());
    }

    #[test]
    fn test_put_overwrites_and_clear_resets() {
        let mut cache = AnimationCache::new();
        cache.put("OBCube", "visible", 1.0, AttrValue::bool(true), 1);
        cache.put("OBCube", "visible", 2.0, AttrValue::bool(false), 2);
        assert_eq!(cache.get("OBCube", "visible").unwrap().hash, 2);
        assert_eq!(cache.plugin_count(), 1);

        cache.clear();
        assert!(!cache.is_known("OBCube"));
    }
}
