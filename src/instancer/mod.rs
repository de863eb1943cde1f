//! Instancing and duplication.
//!
//! Duplis, particles and array-modifier copies all collapse into
//! [`InstanceRecord`]s that the [`InstanceAggregator`] accumulates over one
//! traversal pass and writes as a single `Instancer` plugin.

use tracing::debug;

use crate::core::{encoding::transform_hex, AttrType, AttrValue, AttributeMap};
use crate::exporter::{ExportOutcome, PluginWriter};
use crate::output::PluginType;
use crate::util::{Mat4, Result};

/// Instance flag bits.
pub mod flags {
    /// No special handling.
    pub const NONE: u32 = 0;
    /// The `object_id` field overrides the base node's id.
    pub const OBJECT_ID: u32 = 1 << 0;
    /// Instance is present but hidden.
    pub const HIDDEN: u32 = 1 << 1;
}

/// Persistent id components mixed into a particle id.
pub const MAX_PERSISTENT_IDS: usize = 16;

/// Plugin id of the aggregate instancer.
pub const INSTANCER_ID: &str = "Instancer";

/// Stable per-instance id.
///
/// `index ^ instanced ^ generator ^ persistent[0] ^ ... ^ persistent[15]`.
/// Stable across frames for the same generator, index and persistent id
/// chain; ids from unrelated generators may collide.
pub fn particle_id(index: u32, instanced_object: u32, generator: u32, persistent: &[i32]) -> u32 {
    persistent
        .iter()
        .take(MAX_PERSISTENT_IDS)
        .fold(index ^ instanced_object ^ generator, |acc, &p| acc ^ p as u32)
}

/// Instance transform relative to the base object's own placement.
///
/// The base world matrix must be invertible.
pub fn relative_transform(instance_world: &Mat4, base_world: &Mat4) -> Mat4 {
    *instance_world * base_world.inverse()
}

/// One instance in the aggregate list.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceRecord {
    pub particle_id: u32,
    /// Name of the exported base `Node` plugin.
    pub node_name: String,
    pub object_id: i32,
    pub flags: u32,
    /// Transform relative to the base node.
    pub transform: Mat4,
}

impl InstanceRecord {
    fn render(&self) -> String {
        format!(
            "List({}, {}, {}, {}, {}, {})",
            self.particle_id,
            transform_hex(&self.transform),
            transform_hex(&Mat4::ZERO),
            self.flags,
            self.object_id,
            self.node_name
        )
    }
}

/// Instance list for one traversal pass.
#[derive(Debug, Default)]
pub struct InstanceAggregator {
    records: Vec<InstanceRecord>,
}

impl InstanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous pass.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn add(&mut self, record: InstanceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[InstanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Attribute map of the aggregate plugin for `frame`.
    pub fn attributes(&self, frame: f64) -> AttributeMap {
        let mut items = Vec::with_capacity(self.records.len() + 1);
        items.push(frame.to_string());
        items.extend(self.records.iter().map(InstanceRecord::render));

        let mut attrs = AttributeMap::new();
        attrs.insert("instances".into(), AttrValue::list(AttrType::List, items));
        attrs
    }

    /// Write the accumulated list as one `Instancer` plugin named `name`.
    /// Nothing is written for an empty list.
    pub fn emit(&self, writer: &mut PluginWriter, name: &str) -> Result<Option<ExportOutcome>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        debug!(instancer = name, count = self.records.len(), "emitting instances");
        let attrs = self.attributes(writer.frame());
        writer
            .export_plugin(PluginType::Geometry, INSTANCER_ID, name, &attrs)
            .map(Some)
    }
}
