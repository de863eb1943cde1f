//! Export session: owns every cache and drives the per-frame traversal.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::core::{hash_str, AttrType, AttrValue, AttributeMap};
use crate::exporter::{PluginWriter, Timeline};
use crate::geom::{GeometryCache, GeometryEncoder};
use crate::instancer::{flags, particle_id, relative_transform, InstanceAggregator, InstanceRecord};
use crate::nodes::{GraphEnv, NodeGraphResolver};
use crate::output::{Outputs, PluginType};
use crate::scene::{ModifierKind, ObjectKind, ParticleDraw, SceneObject, SceneSource};
use crate::schema::SchemaRegistry;
use crate::settings::ExportSettings;
use crate::util::{is_invertible, mat4_pow, sanitize, Mat4, Result};

/// Output socket of material trees.
pub const MATERIAL_SOCKET: &str = "Material";
/// Output socket of the world tree.
pub const ENVIRONMENT_SOCKET: &str = "Environment";
/// Plugin name of the per-frame instancer.
pub const INSTANCER_NAME: &str = "INSTANCER";

/// How an export run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStatus {
    Completed,
    /// Cancelled between objects; output written so far is kept.
    Interrupted,
}

/// Plugin name of an object's `Node`.
pub fn node_name(object: &str) -> String {
    sanitize(&format!("OB{}", object))
}

/// Plugin name of the hidden base `Node` instances refer to.
pub fn base_node_name(object: &str) -> String {
    sanitize(&format!("OB{}@base", object))
}

/// Plugin name of a mesh data block.
pub fn geometry_name(data: &str) -> String {
    sanitize(&format!("ME{}", data))
}

/// Plugin name of a copy of `base` exported as its own `Node`.
pub fn instance_node_name(generator: &str, base: &str, key: &str) -> String {
    sanitize(&format!("OB{}@{}@{}", generator, base, key))
}

pub fn light_name(object: &str) -> String {
    sanitize(&format!("LA{}", object))
}

/// One export job.
pub struct ExportSession {
    settings: ExportSettings,
    schema: SchemaRegistry,
    writer: PluginWriter,
    encoder: GeometryEncoder,
    geometry: GeometryCache,
    resolver: NodeGraphResolver,
    instances: InstanceAggregator,
    cancel: Arc<AtomicBool>,
}

impl ExportSession {
    pub fn new(settings: ExportSettings, schema: SchemaRegistry, outputs: Outputs) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            writer: PluginWriter::new(outputs, settings.timeline()),
            encoder: GeometryEncoder::new(settings.buffer_format, settings.animation),
            geometry: GeometryCache::new(),
            resolver: NodeGraphResolver::new(),
            instances: InstanceAggregator::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            settings,
            schema,
        })
    }

    /// Session writing to `path` (and per-channel siblings when configured).
    pub fn create(settings: ExportSettings, schema: SchemaRegistry, path: &Path) -> Result<Self> {
        let outputs = Outputs::create_files(path, settings.separate_files)?;
        Self::new(settings, schema, outputs)
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn writer(&self) -> &PluginWriter {
        &self.writer
    }

    pub fn resolver_mut(&mut self) -> &mut NodeGraphResolver {
        &mut self.resolver
    }

    /// Flag checked between objects and instances; set it to stop the export.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Flush and return the output channels.
    pub fn finish(mut self) -> Result<Outputs> {
        self.writer.flush()?;
        Ok(self.writer.into_outputs())
    }

    /// Still or animated export, per the settings.
    pub fn export(&mut self, scene: &mut dyn SceneSource) -> Result<ExportStatus> {
        if self.settings.animation {
            self.export_animation(scene)
        } else {
            self.export_still(scene)
        }
    }

    /// Export one frame with literal values.
    pub fn export_still(&mut self, scene: &mut dyn SceneSource) -> Result<ExportStatus> {
        self.start_job(Timeline::still());
        scene.set_frame(self.settings.frame_start)?;
        self.export_frame(scene)
    }

    /// Export the frame range with keyframes.
    pub fn export_animation(&mut self, scene: &mut dyn SceneSource) -> Result<ExportStatus> {
        self.start_job(Timeline::animated(self.settings.frame_start, self.settings.frame_step));
        for frame in self.settings.frames() {
            if self.is_cancelled() {
                warn!(frame, "export interrupted");
                return Ok(ExportStatus::Interrupted);
            }
            scene.set_frame(frame)?;
            if self.export_frame(scene)? == ExportStatus::Interrupted {
                return Ok(ExportStatus::Interrupted);
            }
        }
        Ok(ExportStatus::Completed)
    }

    /// New job: every cache is dropped.
    fn start_job(&mut self, timeline: Timeline) {
        self.writer.reset(timeline);
        self.encoder.hash = timeline.animated;
        self.geometry.clear();
        self.resolver.clear();
        self.instances.clear();
    }

    /// Export the scene at its current frame.
    #[instrument(skip_all, fields(frame = scene.frame()))]
    pub fn export_frame(&mut self, scene: &dyn SceneSource) -> Result<ExportStatus> {
        let frame = scene.frame();
        info!(frame, "exporting frame");
        self.writer.begin_frame(frame);
        self.resolver.clear();
        self.instances.clear();

        if self.writer.is_first_frame() {
            self.export_settings_output()?;
        }
        if let Some(world) = scene.world_tree() {
            self.export_environment(scene, world)?;
        }

        for object in scene.objects() {
            if self.is_cancelled() {
                warn!(frame, object = object.name(), "export interrupted");
                self.writer.flush()?;
                return Ok(ExportStatus::Interrupted);
            }
            if object.is_render_hidden() || !self.settings.layer_visible(object.layers()) {
                trace!(object = object.name(), "not renderable");
                continue;
            }
            if self.export_object(scene, object)? == ExportStatus::Interrupted {
                self.writer.flush()?;
                return Ok(ExportStatus::Interrupted);
            }
        }

        if self.settings.use_instancer {
            self.instances.emit(&mut self.writer, INSTANCER_NAME)?;
        }
        self.writer.flush()?;
        Ok(ExportStatus::Completed)
    }

    fn export_settings_output(&mut self) -> Result<()> {
        let s = &self.settings;
        let mut attrs = AttributeMap::new();
        attrs.insert("anim_start".into(), AttrValue::int(s.frame_start as i64));
        attrs.insert("anim_end".into(), AttrValue::int(s.frame_end as i64));
        attrs.insert("frame_start".into(), AttrValue::int(s.frame_start as i64));
        attrs.insert("frames_per_second".into(), AttrValue::float(s.fps as f32));
        self.writer
            .export_plugin(PluginType::Settings, "SettingsOutput", "settingsOutput", &attrs)?;
        Ok(())
    }

    fn export_environment(&mut self, scene: &dyn SceneSource, world: &str) -> Result<()> {
        let mut env = GraphEnv { library: scene.node_library(), schema: &self.schema, writer: &mut self.writer };
        let value = self.resolver.resolve_output(&mut env, world, ENVIRONMENT_SOCKET)?;
        if value.is_null() {
            warn!(world, "environment did not resolve");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(object = object.name()))]
    fn export_object(&mut self, scene: &dyn SceneSource, object: &dyn SceneObject) -> Result<ExportStatus> {
        match object.kind() {
            ObjectKind::Light => self.export_light(object)?,
            ObjectKind::Empty => {}
            ObjectKind::Mesh => {
                let hides_emitter = object
                    .particle_systems()
                    .iter()
                    .any(|ps| ps.settings.draw_as == ParticleDraw::Object && !ps.settings.render_emitter);
                if hides_emitter {
                    debug!("emitter not rendered");
                } else {
                    self.export_node(scene, object, &node_name(object.name()), object.world_transform(), true)?;
                }
                if self.export_array_copies(scene, object)? == ExportStatus::Interrupted {
                    return Ok(ExportStatus::Interrupted);
                }
                if self.export_particles(scene, object)? == ExportStatus::Interrupted {
                    return Ok(ExportStatus::Interrupted);
                }
            }
        }
        self.export_duplis(scene, object)
    }

    /// Export a `Node` for `object` with its geometry and material.
    /// Returns `false` when the object has no renderable geometry.
    fn export_node(
        &mut self,
        scene: &dyn SceneSource,
        object: &dyn SceneObject,
        name: &str,
        world: Mat4,
        visible: bool,
    ) -> Result<bool> {
        if self.writer.is_emitted(name) {
            return Ok(true);
        }
        let Some(geometry) = self.export_geometry(object)? else {
            warn!(object = object.name(), "no renderable geometry, object skipped");
            return Ok(false);
        };
        let material = self.export_material(scene, object)?;

        let mut attrs = AttributeMap::new();
        attrs.insert("transform".into(), AttrValue::transform(&world));
        attrs.insert("geometry".into(), AttrValue::plugin(&geometry));
        if let Some(material) = material {
            attrs.insert("material".into(), material);
        }
        attrs.insert("objectID".into(), AttrValue::int(object.properties().get_int("object_id", 0)));
        attrs.insert("visible".into(), AttrValue::bool(visible));
        self.writer.export_plugin(PluginType::Object, "Node", name, &attrs)?;
        Ok(true)
    }

    /// Export the object's mesh data; `None` when there is nothing to render.
    fn export_geometry(&mut self, object: &dyn SceneObject) -> Result<Option<String>> {
        let Some(mesh) = object.mesh() else {
            return Ok(None);
        };
        if !mesh.is_valid() {
            debug!(object = object.name(), "invalid mesh");
            return Ok(None);
        }

        let name = geometry_name(object.data_name());
        if self.writer.is_emitted(&name) {
            return Ok(Some(name));
        }

        let encoded = self.encoder.encode(mesh)?;
        if encoded.is_empty() {
            return Ok(None);
        }
        let full = self.writer.is_first_frame();
        let attrs = self.geometry.changed_attributes(&name, &encoded, full);
        self.writer
            .export_plugin(PluginType::Geometry, "GeomStaticMesh", &name, &attrs)?;
        Ok(Some(name))
    }

    /// Resolve every material slot; several slots become one `MtlMulti`
    /// whose ids match the 1-based face material ids.
    fn export_material(&mut self, scene: &dyn SceneSource, object: &dyn SceneObject) -> Result<Option<AttrValue>> {
        let slots = object.materials();
        if slots.is_empty() {
            return Ok(None);
        }

        let mut env = GraphEnv { library: scene.node_library(), schema: &self.schema, writer: &mut self.writer };
        let mut resolved = Vec::with_capacity(slots.len());
        for (slot, tree) in slots.iter().enumerate() {
            let value = self.resolver.resolve_output(&mut env, tree, MATERIAL_SOCKET)?;
            if value.is_null() {
                warn!(object = object.name(), material = tree.as_str(), "material did not resolve");
                continue;
            }
            resolved.push((slot as i32 + 1, value));
        }

        if slots.len() == 1 {
            return Ok(resolved.pop().map(|(_, v)| v));
        }
        if resolved.is_empty() {
            return Ok(None);
        }

        let name = sanitize(&format!("MM{}", object.name()));
        let ids: Vec<i32> = resolved.iter().map(|(id, _)| *id).collect();
        let mut attrs = AttributeMap::new();
        attrs.insert(
            "mtls_list".into(),
            AttrValue::list(AttrType::ListPlugin, resolved.iter().map(|(_, v)| v.text())),
        );
        attrs.insert("ids_list".into(), AttrValue::list_int(&ids));
        attrs.insert("wrap_id".into(), AttrValue::bool(false));
        self.writer.export_plugin(PluginType::Material, "MtlMulti", &name, &attrs)?;
        Ok(Some(AttrValue::plugin(&name)))
    }

    fn export_light(&mut self, object: &dyn SceneObject) -> Result<()> {
        let props = object.properties();
        let id = props.get_str("light_type", "LightOmni");
        let Some(desc) = self.schema.lookup(id) else {
            warn!(object = object.name(), plugin = id, "unknown light type");
            return Ok(());
        };

        let mut attrs = props.attributes_for(desc);
        if desc.attribute("transform").is_some() {
            attrs.insert("transform".into(), AttrValue::transform(&object.world_transform()));
        }
        self.writer
            .export_plugin(desc.plugin_type, id, &light_name(object.name()), &attrs)?;
        Ok(())
    }

    /// Place one copy of `base` at `world`.
    ///
    /// With the instancer, the copy becomes an instance record relative to a
    /// hidden base node; otherwise it gets its own `Node` named by `key`,
    /// which is unique per generator (source slot and index).
    fn place_instance(
        &mut self,
        scene: &dyn SceneSource,
        generator: &dyn SceneObject,
        base: &dyn SceneObject,
        world: Mat4,
        id: u32,
        key: &str,
    ) -> Result<()> {
        if !self.settings.use_instancer {
            let name = instance_node_name(generator.name(), base.name(), key);
            self.export_node(scene, base, &name, world, true)?;
            return Ok(());
        }

        let base_world = base.world_transform();
        if !is_invertible(&base_world) {
            warn!(object = base.name(), "singular base transform, instance skipped");
            return Ok(());
        }
        let node = base_node_name(base.name());
        if !self.export_node(scene, base, &node, base_world, false)? {
            return Ok(());
        }

        let object_id = base.properties().get_int("object_id", 0) as i32;
        self.instances.add(InstanceRecord {
            particle_id: id,
            node_name: node,
            object_id,
            flags: if object_id != 0 { flags::OBJECT_ID } else { flags::NONE },
            transform: relative_transform(&world, &base_world),
        });
        Ok(())
    }

    fn export_duplis(&mut self, scene: &dyn SceneSource, object: &dyn SceneObject) -> Result<ExportStatus> {
        for dupli in object.duplis() {
            if self.is_cancelled() {
                return Ok(ExportStatus::Interrupted);
            }
            if dupli.hide {
                continue;
            }
            let Some(base) = scene.object(&dupli.object) else {
                warn!(generator = object.name(), object = dupli.object.as_str(), "dupli object not found");
                continue;
            };
            if base.kind() != ObjectKind::Mesh {
                debug!(object = base.name(), "only mesh duplis are instanced");
                continue;
            }
            let id = particle_id(dupli.index, base.id(), object.id(), &dupli.persistent_id);
            let key = format!("dupli{}", dupli.index);
            self.place_instance(scene, object, base, dupli.world, id, &key)?;
        }
        Ok(ExportStatus::Completed)
    }

    fn export_particles(&mut self, scene: &dyn SceneSource, object: &dyn SceneObject) -> Result<ExportStatus> {
        for (slot, system) in object.particle_systems().iter().enumerate() {
            if system.settings.draw_as != ParticleDraw::Object {
                continue;
            }
            let Some(base_name) = system.settings.instance_object.as_deref() else {
                warn!(system = system.name.as_str(), "particle system has no instance object");
                continue;
            };
            let Some(base) = scene.object(base_name) else {
                warn!(system = system.name.as_str(), object = base_name, "instance object not found");
                continue;
            };
            let generator = object.id() ^ hash_str(&system.name);
            for (index, particle) in system.particles.iter().enumerate() {
                if self.is_cancelled() {
                    return Ok(ExportStatus::Interrupted);
                }
                if !particle.alive {
                    continue;
                }
                let id = particle_id(index as u32, base.id(), generator, &[]);
                let key = format!("particles{}_{}", slot, index);
                self.place_instance(scene, object, base, particle.world(), id, &key)?;
            }
        }
        Ok(ExportStatus::Completed)
    }

    /// Array modifier copies `1..count`; copy 0 is the object itself.
    fn export_array_copies(&mut self, scene: &dyn SceneSource, object: &dyn SceneObject) -> Result<ExportStatus> {
        let world = object.world_transform();
        for (slot, modifier) in object.modifiers().iter().enumerate() {
            let ModifierKind::Array(array) = &modifier.kind else {
                continue;
            };
            if !modifier.render {
                continue;
            }
            let generator = hash_str(&format!("{}#array{}", object.name(), slot));
            for copy in 1..array.count {
                if self.is_cancelled() {
                    return Ok(ExportStatus::Interrupted);
                }
                let copy_world = world * mat4_pow(&array.offset, copy);
                let id = particle_id(copy, object.id(), generator, &[]);
                let key = format!("array{}_{}", slot, copy);
                self.place_instance(scene, object, object, copy_world, id, &key)?;
            }
        }
        Ok(ExportStatus::Completed)
    }
}
