//! Mesh snapshot to encoded `GeomStaticMesh` buffers.
//!
//! [`GeometryEncoder::triangulate`] flattens a [`MeshSnapshot`] into raw
//! arrays; [`GeometryEncoder::encode`] turns those into hashed list
//! literals and drops the raw arrays.

use std::collections::HashMap;

use tracing::trace;

use super::mesh::MeshSnapshot;
use crate::core::encoding::{encode_ints, encode_vectors};
use crate::core::{BufferFormat, ContentHash};
use crate::util::{Result, Vec3};

/// Edge visibility of an untouched triangle: all three edges.
pub const EDGES_TRIANGLE: i32 = 0b111;
/// First half of a split quad; the diagonal (edge 2) is hidden.
pub const EDGES_QUAD_FIRST: i32 = 0b011;
/// Second half of a split quad; the diagonal (edge 0) is hidden.
pub const EDGES_QUAD_SECOND: i32 = 0b110;
/// Triangles packed per edge-visibility word.
pub const TRIANGLES_PER_WORD: usize = 10;

/// Corner order of the triangles a face splits into.
const TRI_CORNERS: [[usize; 3]; 1] = [[0, 1, 2]];
const QUAD_CORNERS: [[usize; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

fn face_triangles(count: i32) -> &'static [[usize; 3]] {
    if count == 4 {
        &QUAD_CORNERS
    } else {
        &TRI_CORNERS
    }
}

/// Raw arrays of one map channel.
#[derive(Clone, Debug, PartialEq)]
pub struct MapChannelArrays {
    pub name: String,
    pub index: i32,
    /// Deduplicated values (UVs padded with a 0 third component).
    pub vertices: Vec<Vec3>,
    /// Per triangle corner index into `vertices`.
    pub faces: Vec<i32>,
}

/// Raw triangulated arrays of one mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshArrays {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<i32>,
    pub normals: Vec<Vec3>,
    pub face_normals: Vec<i32>,
    pub face_mtl_ids: Vec<i32>,
    pub edge_visibility: Vec<i32>,
    pub map_channels: Vec<MapChannelArrays>,
}

impl MeshArrays {
    pub fn num_triangles(&self) -> usize {
        self.faces.len() / 3
    }
}

/// One encoded list and its content hash.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedBuffer {
    pub text: String,
    pub hash: ContentHash,
    /// Element count before encoding.
    pub count: usize,
}

impl EncodedBuffer {
    /// Explicitly empty buffer.
    pub fn empty(text: String) -> Self {
        Self { text, hash: ContentHash::NONE, count: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Encoded map channel.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedMapChannel {
    pub name: String,
    pub index: i32,
    pub vertices: EncodedBuffer,
    pub faces: EncodedBuffer,
}

/// Encoded mesh: only text buffers and hashes survive encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedMesh {
    pub vertices: EncodedBuffer,
    pub faces: EncodedBuffer,
    pub normals: EncodedBuffer,
    pub face_normals: EncodedBuffer,
    pub face_mtl_ids: EncodedBuffer,
    pub edge_visibility: EncodedBuffer,
    pub map_channels: Vec<EncodedMapChannel>,
}

impl EncodedMesh {
    /// Mesh with no renderable geometry.
    pub fn empty(format: BufferFormat) -> Result<Self> {
        let ints = || encode_ints(&[], format).map(EncodedBuffer::empty);
        let vectors = || encode_vectors(&[], format).map(EncodedBuffer::empty);
        Ok(Self {
            vertices: vectors()?,
            faces: ints()?,
            normals: vectors()?,
            face_normals: ints()?,
            face_mtl_ids: ints()?,
            edge_visibility: ints()?,
            map_channels: Vec::new(),
        })
    }

    /// No triangles were encoded.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Parse a numeric channel name as its index.
fn numeric_channel_index(name: &str) -> Option<i32> {
    name.trim().parse::<i32>().ok().filter(|i| *i >= 0)
}

/// Insertion-ordered exact-value dedup of per-corner values.
#[derive(Default)]
struct ValueDedup {
    slots: HashMap<[u32; 3], i32>,
    values: Vec<Vec3>,
}

impl ValueDedup {
    fn slot(&mut self, v: Vec3) -> i32 {
        // +0.0 and -0.0 compare equal and share a slot
        let key = v.to_array().map(|c| if c == 0.0 { 0 } else { c.to_bits() });
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        let slot = self.values.len() as i32;
        self.values.push(v);
        self.slots.insert(key, slot);
        slot
    }
}

/// Converts mesh snapshots to encoded buffers.
#[derive(Clone, Copy, Debug)]
pub struct GeometryEncoder {
    pub format: BufferFormat,
    /// Hash buffers for change detection (only useful for animations).
    pub hash: bool,
}

impl GeometryEncoder {
    pub fn new(format: BufferFormat, hash: bool) -> Self {
        Self { format, hash }
    }

    /// Flatten a snapshot into triangulated raw arrays.
    ///
    /// The snapshot must satisfy [`MeshSnapshot::is_valid`]; an invalid one
    /// yields empty arrays.
    pub fn triangulate(mesh: &MeshSnapshot) -> MeshArrays {
        if !mesh.is_valid() {
            return MeshArrays::default();
        }

        let tri_count = mesh.num_triangles();
        let face_normals = mesh.compute_face_normals();
        let needs_vertex_normals = mesh.custom_normals.is_none() && mesh.face_smooth.iter().any(|s| *s);
        let vertex_normals = if needs_vertex_normals {
            mesh.compute_vertex_normals(&face_normals)
        } else {
            Vec::new()
        };

        let mut arrays = MeshArrays {
            vertices: mesh.positions.clone(),
            faces: Vec::with_capacity(tri_count * 3),
            normals: Vec::with_capacity(tri_count * 3),
            face_normals: Vec::with_capacity(tri_count * 3),
            face_mtl_ids: Vec::with_capacity(tri_count),
            edge_visibility: vec![0; tri_count.div_ceil(TRIANGLES_PER_WORD)],
            map_channels: Vec::new(),
        };

        let mut corner_base = 0usize;
        let mut tri = 0usize;
        for (face, &count) in mesh.face_counts.iter().enumerate() {
            let mtl_id = mesh.material(face) as i32 + 1;
            let smooth = mesh.is_smooth(face);
            let is_quad = count == 4;

            for (half, corners) in face_triangles(count).iter().enumerate() {
                for &k in corners {
                    let corner = corner_base + k;
                    let vertex = mesh.face_indices[corner];
                    arrays.faces.push(vertex);

                    let normal = match &mesh.custom_normals {
                        Some(custom) => custom[corner],
                        None if smooth => vertex_normals[vertex as usize],
                        None => face_normals[face],
                    };
                    arrays.face_normals.push(arrays.normals.len() as i32);
                    arrays.normals.push(normal);
                }

                arrays.face_mtl_ids.push(mtl_id);

                let edges = match (is_quad, half) {
                    (false, _) => EDGES_TRIANGLE,
                    (true, 0) => EDGES_QUAD_FIRST,
                    (true, _) => EDGES_QUAD_SECOND,
                };
                arrays.edge_visibility[tri / TRIANGLES_PER_WORD] |= edges << ((tri % TRIANGLES_PER_WORD) * 3);
                tri += 1;
            }
            corner_base += count as usize;
        }

        arrays.map_channels = Self::map_channels(mesh);
        arrays
    }

    /// Dedup every UV and color layer; UV layers come first and share the
    /// sequential index counter with color layers.
    fn map_channels(mesh: &MeshSnapshot) -> Vec<MapChannelArrays> {
        let mut next_index = 0i32;
        let mut channel_index = |name: &str| {
            numeric_channel_index(name).unwrap_or_else(|| {
                let idx = next_index;
                next_index += 1;
                idx
            })
        };

        let uv_layers = mesh
            .uv_layers
            .iter()
            .map(|l| (l.name.as_str(), l.uvs.iter().map(|uv| uv.extend(0.0)).collect::<Vec<_>>()));
        let color_layers = mesh
            .color_layers
            .iter()
            .map(|l| (l.name.as_str(), l.colors.clone()));

        let mut channels = Vec::with_capacity(mesh.uv_layers.len() + mesh.color_layers.len());
        for (name, values) in uv_layers.chain(color_layers) {
            let index = channel_index(name);
            let mut dedup = ValueDedup::default();
            let mut faces = Vec::with_capacity(mesh.num_triangles() * 3);

            let mut corner_base = 0usize;
            for &count in &mesh.face_counts {
                for corners in face_triangles(count) {
                    for &k in corners {
                        faces.push(dedup.slot(values[corner_base + k]));
                    }
                }
                corner_base += count as usize;
            }

            trace!(channel = name, index, unique = dedup.values.len(), "map channel");
            channels.push(MapChannelArrays {
                name: name.to_string(),
                index,
                vertices: dedup.values,
                faces,
            });
        }
        channels
    }

    fn ints(&self, data: &[i32]) -> Result<EncodedBuffer> {
        Ok(EncodedBuffer {
            text: encode_ints(data, self.format)?,
            hash: ContentHash::of_pod_if(self.hash, data),
            count: data.len(),
        })
    }

    fn vectors(&self, data: &[Vec3]) -> Result<EncodedBuffer> {
        Ok(EncodedBuffer {
            text: encode_vectors(data, self.format)?,
            hash: ContentHash::of_pod_if(self.hash, data),
            count: data.len(),
        })
    }

    /// Encode raw arrays, consuming them.
    pub fn encode_arrays(&self, arrays: MeshArrays) -> Result<EncodedMesh> {
        if arrays.faces.is_empty() {
            return EncodedMesh::empty(self.format);
        }
        let map_channels = arrays
            .map_channels
            .iter()
            .map(|ch| {
                Ok(EncodedMapChannel {
                    name: ch.name.clone(),
                    index: ch.index,
                    vertices: self.vectors(&ch.vertices)?,
                    faces: self.ints(&ch.faces)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedMesh {
            vertices: self.vectors(&arrays.vertices)?,
            faces: self.ints(&arrays.faces)?,
            normals: self.vectors(&arrays.normals)?,
            face_normals: self.ints(&arrays.face_normals)?,
            face_mtl_ids: self.ints(&arrays.face_mtl_ids)?,
            edge_visibility: self.ints(&arrays.edge_visibility)?,
            map_channels,
        })
    }

    /// Triangulate and encode a snapshot.
    pub fn encode(&self, mesh: &MeshSnapshot) -> Result<EncodedMesh> {
        self.encode_arrays(Self::triangulate(mesh))
    }
}
