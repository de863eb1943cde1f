//! Geometry export.
//!
//! This module provides:
//! - [`MeshSnapshot`] - Read-only copy of a mesh at one frame
//! - [`GeometryEncoder`] - Triangulation, normals, map channels and encoding
//! - [`GeometryCache`] - Frame-to-frame buffer change detection

mod cache;
mod encoder;
mod mesh;

pub use cache::{attr, map_channels_value, GeometryCache};
pub use encoder::{
    EncodedBuffer, EncodedMapChannel, EncodedMesh, GeometryEncoder, MapChannelArrays, MeshArrays,
    EDGES_QUAD_FIRST, EDGES_QUAD_SECOND, EDGES_TRIANGLE, TRIANGLES_PER_WORD,
};
pub use mesh::{ColorLayer, MeshSnapshot, UvLayer};
