//! JSON-described scene with keyed animation.
//!
//! Matrices are written row-major as 16 numbers. Any animatable field is
//! either a static value or a list of `{"frame": f, "value": v}` keys,
//! sampled with linear interpolation and clamped outside the key range.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{
    ArrayModifier, DupliInstance, Modifier, ModifierKind, ObjectKind, ParticleSystem, PropValue, PropertyBag,
    SceneObject, SceneSource,
};
use crate::core::hash_str;
use crate::geom::MeshSnapshot;
use crate::nodes::NodeLibrary;
use crate::util::{from_row_major, Error, Mat4, Result, Vec3};

/// Values that can be sampled between keys.
pub trait Lerp: Clone {
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for [f32; 16] {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        let mut out = *self;
        for (o, (a, b)) in out.iter_mut().zip(self.iter().zip(other)) {
            *o = a + (b - a) * t as f32;
        }
        out
    }
}

impl Lerp for Vec<Vec3> {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        if self.len() != other.len() {
            return if t < 1.0 { self.clone() } else { other.clone() };
        }
        self.iter().zip(other).map(|(a, b)| a.lerp(*b, t as f32)).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Key<T> {
    pub frame: f64,
    pub value: T,
}

/// A static value or a keyed animation track.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Track<T> {
    Keys(Vec<Key<T>>),
    Static(T),
}

impl<T: Lerp> Track<T> {
    /// Value at `frame`; `None` only for an empty key list.
    pub fn sample(&self, frame: f64) -> Option<T> {
        let keys = match self {
            Track::Static(v) => return Some(v.clone()),
            Track::Keys(keys) => keys,
        };
        let first = keys.first()?;
        if frame <= first.frame {
            return Some(first.value.clone());
        }
        for pair in keys.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if frame <= b.frame {
                let span = b.frame - a.frame;
                let t = if span > 0.0 { (frame - a.frame) / span } else { 1.0 };
                return Some(a.value.lerp(&b.value, t));
            }
        }
        keys.last().map(|k| k.value.clone())
    }
}

const IDENTITY_ROWS: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

fn identity_track() -> Track<[f32; 16]> {
    Track::Static(IDENTITY_ROWS)
}

fn identity_rows() -> [f32; 16] {
    IDENTITY_ROWS
}

fn all_layers() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModifierDef {
    Array {
        count: u32,
        #[serde(default = "identity_rows")]
        offset: [f32; 16],
        #[serde(default = "default_true")]
        render: bool,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Deserialize)]
struct DupliDef {
    object: String,
    /// Relative to the generator.
    #[serde(default = "identity_rows")]
    transform: [f32; 16],
    #[serde(default)]
    persistent_id: Vec<i32>,
    #[serde(default)]
    hide: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct ObjectDef {
    name: String,
    #[serde(default)]
    id: Option<u32>,
    #[serde(rename = "type", default)]
    kind: ObjectKind,
    /// Mesh data name; defaults to the object name.
    #[serde(default)]
    data: Option<String>,
    #[serde(default = "identity_track")]
    transform: Track<[f32; 16]>,
    #[serde(default)]
    mesh: Option<MeshSnapshot>,
    /// Keyed vertex positions overriding `mesh.positions`.
    #[serde(default)]
    deform: Option<Track<Vec<Vec3>>>,
    #[serde(default)]
    materials: Vec<String>,
    #[serde(default)]
    properties: PropertyBag,
    #[serde(default)]
    animated_properties: BTreeMap<String, Track<f64>>,
    #[serde(default)]
    hide_render: bool,
    #[serde(default = "all_layers")]
    layers: u32,
    #[serde(default)]
    modifiers: Vec<ModifierDef>,
    #[serde(default)]
    particle_systems: Vec<ParticleSystem>,
    #[serde(default)]
    duplis: Vec<DupliDef>,
}

#[derive(Clone, Debug, Deserialize)]
struct SceneDef {
    #[serde(default)]
    objects: Vec<ObjectDef>,
    #[serde(default)]
    node_trees: NodeLibrary,
    #[serde(default)]
    world: Option<String>,
}

/// One object evaluated at the scene's current frame.
#[derive(Clone, Debug)]
struct EvaluatedObject {
    name: String,
    id: u32,
    kind: ObjectKind,
    data_name: String,
    world: Mat4,
    mesh: Option<MeshSnapshot>,
    materials: Vec<String>,
    properties: PropertyBag,
    hide_render: bool,
    layers: u32,
    modifiers: Vec<Modifier>,
    particle_systems: Vec<ParticleSystem>,
    duplis: Vec<DupliInstance>,
}

impl EvaluatedObject {
    fn evaluate(def: &ObjectDef, frame: f64) -> Self {
        let world = from_row_major(&def.transform.sample(frame).unwrap_or(IDENTITY_ROWS));

        let mesh = def.mesh.as_ref().map(|m| {
            let mut mesh = m.clone();
            if let Some(positions) = def.deform.as_ref().and_then(|d| d.sample(frame)) {
                mesh.positions = positions;
            }
            mesh
        });

        let mut properties = def.properties.clone();
        for (name, track) in &def.animated_properties {
            if let Some(v) = track.sample(frame) {
                properties.insert(name.clone(), PropValue::Float(v));
            }
        }

        let modifiers = def
            .modifiers
            .iter()
            .map(|m| match m {
                ModifierDef::Array { count, offset, render } => Modifier {
                    kind: ModifierKind::Array(ArrayModifier { count: *count, offset: from_row_major(offset) }),
                    render: *render,
                },
                ModifierDef::Unsupported => Modifier { kind: ModifierKind::Other("unsupported".into()), render: false },
            })
            .collect();

        let duplis = def
            .duplis
            .iter()
            .enumerate()
            .map(|(i, d)| DupliInstance {
                object: d.object.clone(),
                world: world * from_row_major(&d.transform),
                persistent_id: d.persistent_id.clone(),
                index: i as u32,
                hide: d.hide,
            })
            .collect();

        Self {
            name: def.name.clone(),
            id: def.id.unwrap_or_else(|| hash_str(&def.name)),
            kind: def.kind,
            data_name: def.data.clone().unwrap_or_else(|| def.name.clone()),
            world,
            mesh,
            materials: def.materials.clone(),
            properties,
            hide_render: def.hide_render,
            layers: def.layers,
            modifiers,
            particle_systems: def.particle_systems.clone(),
            duplis,
        }
    }
}

impl SceneObject for EvaluatedObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn world_transform(&self) -> Mat4 {
        self.world
    }

    fn is_render_hidden(&self) -> bool {
        self.hide_render
    }

    fn layers(&self) -> u32 {
        self.layers
    }

    fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    fn particle_systems(&self) -> &[ParticleSystem] {
        &self.particle_systems
    }

    fn duplis(&self) -> &[DupliInstance] {
        &self.duplis
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn mesh(&self) -> Option<&MeshSnapshot> {
        self.mesh.as_ref()
    }

    fn data_name(&self) -> &str {
        &self.data_name
    }

    fn materials(&self) -> &[String] {
        &self.materials
    }
}

fn check_unique_names(objects: &[ObjectDef]) -> Result<()> {
    let mut names = HashSet::with_capacity(objects.len());
    match objects.iter().find(|o| !names.insert(o.name.as_str())) {
        Some(dup) => Err(Error::scene(format!("duplicate object {}", dup.name))),
        None => Ok(()),
    }
}

/// In-memory scene loaded from JSON.
#[derive(Clone, Debug)]
pub struct JsonScene {
    def: SceneDef,
    evaluated: Vec<EvaluatedObject>,
    frame: f64,
}

impl JsonScene {
    /// Parse a scene description and evaluate it at frame 0.
    pub fn from_json(text: &str) -> Result<Self> {
        let def: SceneDef = serde_json::from_str(text)?;
        check_unique_names(&def.objects)?;
        let mut scene = Self { def, evaluated: Vec::new(), frame: 0.0 };
        scene.evaluate();
        Ok(scene)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn evaluate(&mut self) {
        self.evaluated = self
            .def
            .objects
            .iter()
            .map(|o| EvaluatedObject::evaluate(o, self.frame))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.evaluated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluated.is_empty()
    }
}

impl SceneSource for JsonScene {
    fn set_frame(&mut self, frame: f64) -> Result<()> {
        self.frame = frame;
        self.evaluate();
        debug!(frame, objects = self.evaluated.len(), "scene evaluated");
        Ok(())
    }

    fn frame(&self) -> f64 {
        self.frame
    }

    fn objects(&self) -> Box<dyn Iterator<Item = &dyn SceneObject> + '_> {
        Box::new(self.evaluated.iter().map(|o| o as &dyn SceneObject))
    }

    fn object(&self, name: &str) -> Option<&dyn SceneObject> {
        self.evaluated
            .iter()
            .find(|o| o.name == name)
            .map(|o| o as &dyn SceneObject)
    }

    fn node_library(&self) -> &NodeLibrary {
        &self.def.node_trees
    }

    fn world_tree(&self) -> Option<&str> {
        self.def.world.as_deref()
    }
}
