//! Per-geometry buffer hashes from the previous exported frame.

use std::collections::HashMap;

use tracing::trace;

use super::encoder::{EncodedBuffer, EncodedMapChannel, EncodedMesh};
use crate::core::{AttrType, AttrValue, AttributeMap, ContentHash};

/// Attribute names of a `GeomStaticMesh` block.
pub mod attr {
    pub const VERTICES: &str = "vertices";
    pub const FACES: &str = "faces";
    pub const NORMALS: &str = "normals";
    pub const FACE_NORMALS: &str = "faceNormals";
    pub const FACE_MTL_IDS: &str = "face_mtlIDs";
    pub const EDGE_VISIBILITY: &str = "edge_visibility";
    pub const MAP_CHANNELS: &str = "map_channels";
    pub const MAP_CHANNELS_NAMES: &str = "map_channels_names";
}

#[derive(Clone, Debug, Default, PartialEq)]
struct MeshHashes {
    vertices: ContentHash,
    faces: ContentHash,
    normals: ContentHash,
    face_normals: ContentHash,
    face_mtl_ids: ContentHash,
    edge_visibility: ContentHash,
    map_channels: Vec<(i32, ContentHash, ContentHash)>,
}

impl MeshHashes {
    fn of(mesh: &EncodedMesh) -> Self {
        Self {
            vertices: mesh.vertices.hash,
            faces: mesh.faces.hash,
            normals: mesh.normals.hash,
            face_normals: mesh.face_normals.hash,
            face_mtl_ids: mesh.face_mtl_ids.hash,
            edge_visibility: mesh.edge_visibility.hash,
            map_channels: mesh
                .map_channels
                .iter()
                .map(|ch| (ch.index, ch.vertices.hash, ch.faces.hash))
                .collect(),
        }
    }
}

/// Render every map channel as one nested list attribute.
pub fn map_channels_value(channels: &[EncodedMapChannel]) -> AttrValue {
    AttrValue::list(
        AttrType::List,
        channels
            .iter()
            .map(|ch| format!("List({}, {}, {})", ch.index, ch.vertices.text, ch.faces.text)),
    )
}

fn map_channel_names(channels: &[EncodedMapChannel]) -> AttrValue {
    let names: Vec<&str> = channels.iter().map(|ch| ch.name.as_str()).collect();
    AttrValue::list_string(&names)
}

fn buffer_value(ty: AttrType, buffer: &EncodedBuffer) -> AttrValue {
    AttrValue::raw(ty, buffer.text.clone())
}

/// Tracks which encoded buffers changed since the previous frame.
#[derive(Debug, Default)]
pub struct GeometryCache {
    meshes: HashMap<String, MeshHashes>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Attributes to emit for geometry `name` this frame.
    ///
    /// With `full` set (still export or first frame) or for a mesh never seen
    /// before, every buffer is returned. Otherwise only buffers whose hash
    /// differs from the previous frame are included. Map channels go out
    /// together when any of them changed.
    pub fn changed_attributes(&mut self, name: &str, mesh: &EncodedMesh, full: bool) -> AttributeMap {
        let current = MeshHashes::of(mesh);
        let previous = if full { None } else { self.meshes.get(name) };

        let mut attrs = AttributeMap::new();
        let mut put = |changed: bool, key: &str, value: AttrValue| {
            if changed {
                attrs.insert(key.to_string(), value);
            }
        };

        let differs = |pick: fn(&MeshHashes) -> ContentHash| previous.is_none_or(|p| pick(p) != pick(&current));

        put(differs(|h| h.vertices), attr::VERTICES, buffer_value(AttrType::ListVector, &mesh.vertices));
        put(differs(|h| h.faces), attr::FACES, buffer_value(AttrType::ListInt, &mesh.faces));
        put(differs(|h| h.normals), attr::NORMALS, buffer_value(AttrType::ListVector, &mesh.normals));
        put(differs(|h| h.face_normals), attr::FACE_NORMALS, buffer_value(AttrType::ListInt, &mesh.face_normals));
        put(differs(|h| h.face_mtl_ids), attr::FACE_MTL_IDS, buffer_value(AttrType::ListInt, &mesh.face_mtl_ids));
        put(
            differs(|h| h.edge_visibility),
            attr::EDGE_VISIBILITY,
            buffer_value(AttrType::ListInt, &mesh.edge_visibility),
        );

        let channels_changed = previous.is_none_or(|p| p.map_channels != current.map_channels);
        if channels_changed && !mesh.map_channels.is_empty() {
            put(true, attr::MAP_CHANNELS, map_channels_value(&mesh.map_channels));
            put(true, attr::MAP_CHANNELS_NAMES, map_channel_names(&mesh.map_channels));
        }

        trace!(geometry = name, changed = attrs.len(), full, "geometry diff");
        self.meshes.insert(name.to_string(), current);
        attrs
    }
}
