//! Plugin schema table: plugin id to ordered attribute descriptors.
//!
//! A built-in table covering the plugins this exporter writes ships with the
//! crate (`plugins.json`); hosts can merge their own descriptions on top.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::AttrType;
use crate::output::PluginType;
use crate::util::{Error, Result};

const BUILTIN_SCHEMA: &str = include_str!("plugins.json");

/// One attribute of a plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttrDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttrType,
    /// Attribute is described but never exported.
    #[serde(default)]
    pub skip: bool,
}

impl AttrDesc {
    pub fn new(name: &str, ty: AttrType) -> Self {
        Self { name: name.to_string(), ty, skip: false }
    }
}

/// A plugin description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginDesc {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub attributes: Vec<AttrDesc>,
}

impl PluginDesc {
    /// Find an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttrDesc> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes that are not marked `skip`, in declaration order.
    pub fn exported(&self) -> impl Iterator<Item = &AttrDesc> {
        self.attributes.iter().filter(|a| !a.skip)
    }
}

/// Lookup table of plugin descriptions.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    plugins: HashMap<String, PluginDesc>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugin table.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SCHEMA)
    }

    /// Parse a JSON array of plugin descriptions.
    pub fn from_json(text: &str) -> Result<Self> {
        let descs: Vec<PluginDesc> = serde_json::from_str(text)?;
        let mut registry = Self::new();
        for desc in descs {
            if registry.plugins.contains_key(&desc.id) {
                return Err(Error::Schema(format!("duplicate plugin {}", desc.id)));
            }
            registry.insert(desc);
        }
        Ok(registry)
    }

    /// Load a JSON schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Add or replace a description.
    pub fn insert(&mut self, desc: PluginDesc) {
        self.plugins.insert(desc.id.clone(), desc);
    }

    /// Overlay every description of `other` onto this registry.
    pub fn merge(&mut self, other: SchemaRegistry) {
        self.plugins.extend(other.plugins);
    }

    /// Look up a plugin by id.
    #[inline]
    pub fn lookup(&self, id: &str) -> Option<&PluginDesc> {
        self.plugins.get(id)
    }

    /// Plugin type of `id`, falling back to [`PluginType::Other`].
    pub fn plugin_type(&self, id: &str) -> PluginType {
        self.lookup(id).map_or(PluginType::Other, |d| d.plugin_type)
    }

    /// Sorted plugin ids.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
