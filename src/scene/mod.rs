//! Host scene collaborator.
//!
//! The exporter only reads the scene through [`SceneSource`] and
//! [`SceneObject`]. [`JsonScene`] is an in-memory implementation backed by a
//! JSON scene description with keyed animation.

mod json;
mod props;

use serde::{Deserialize, Serialize};

use crate::geom::MeshSnapshot;
use crate::nodes::NodeLibrary;
use crate::util::{Mat4, Result, Vec3};

pub use json::{JsonScene, Key, Track};
pub use props::{PropValue, PropertyBag};

/// Object type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Mesh,
    Light,
    Empty,
}

/// One expanded duplicate of a dupli generator.
#[derive(Clone, Debug, PartialEq)]
pub struct DupliInstance {
    /// Name of the instanced object.
    pub object: String,
    /// World transform of this copy.
    pub world: Mat4,
    /// Persistent id chain of the copy.
    pub persistent_id: Vec<i32>,
    pub index: u32,
    pub hide: bool,
}

/// Array modifier: `count` copies, each offset by `offset` from the previous.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayModifier {
    pub count: u32,
    pub offset: Mat4,
}

/// A modifier on an object's stack.
#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    Array(ArrayModifier),
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub kind: ModifierKind,
    /// Modifier affects renders.
    pub render: bool,
}

/// Particle draw mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleDraw {
    #[default]
    None,
    Point,
    Path,
    Object,
}

/// Settings blob of a particle system.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleSettings {
    #[serde(default)]
    pub draw_as: ParticleDraw,
    /// Object drawn at every particle when `draw_as` is `Object`.
    #[serde(default)]
    pub instance_object: Option<String>,
    #[serde(default = "default_true")]
    pub render_emitter: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub location: Vec3,
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default = "default_true")]
    pub alive: bool,
}

fn default_size() -> f32 {
    1.0
}

impl Particle {
    pub fn world(&self) -> Mat4 {
        Mat4::from_translation(self.location) * Mat4::from_scale(Vec3::splat(self.size))
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub name: String,
    #[serde(flatten)]
    pub settings: ParticleSettings,
    #[serde(default)]
    pub particles: Vec<Particle>,
}

/// Read-only view of one renderable object at the current frame.
pub trait SceneObject {
    fn name(&self) -> &str;
    /// Stable identity used for instance ids.
    fn id(&self) -> u32;
    fn kind(&self) -> ObjectKind;
    fn world_transform(&self) -> Mat4;
    fn is_render_hidden(&self) -> bool;
    /// Layer membership bitmask.
    fn layers(&self) -> u32;
    fn modifiers(&self) -> &[Modifier];
    fn particle_systems(&self) -> &[ParticleSystem];
    /// Dupli expansion of this object.
    fn duplis(&self) -> &[DupliInstance];
    fn properties(&self) -> &PropertyBag;
    /// Evaluated mesh, when the object has one.
    fn mesh(&self) -> Option<&MeshSnapshot>;
    /// Name of the mesh data block (shared between objects).
    fn data_name(&self) -> &str;
    /// Material node-tree name per material slot.
    fn materials(&self) -> &[String];
}

/// Read-only scene at the current frame.
pub trait SceneSource {
    /// Evaluate the scene at `frame`.
    fn set_frame(&mut self, frame: f64) -> Result<()>;
    fn frame(&self) -> f64;
    fn objects(&self) -> Box<dyn Iterator<Item = &dyn SceneObject> + '_>;
    fn object(&self, name: &str) -> Option<&dyn SceneObject>;
    fn node_library(&self) -> &NodeLibrary;
    /// Node tree of the world/environment.
    fn world_tree(&self) -> Option<&str>;
}
