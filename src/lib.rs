//! # vrscene-export
//!
//! Incremental exporter that turns a scene graph into `.vrscene` plugin
//! descriptions, once per frame, writing only what changed.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math helpers, name sanitization
//! - [`core`] - Hashing, attribute values, buffer encodings, export caches
//! - [`schema`] - Plugin descriptions (id to typed attributes)
//! - [`output`] - Output channels and plugin routing
//! - [`exporter`] - Plugin write path with keyframe decisions
//! - [`geom`] - Mesh snapshots, encoding and change detection
//! - [`instancer`] - Instance identity and aggregation
//! - [`nodes`] - Node graphs and their resolution
//! - [`scene`] - Host scene interfaces and a JSON-backed scene
//! - [`session`] - Per-frame traversal driving everything above
//!
//! ## Example
//!
//! ```ignore
//! use vrscene_export::prelude::*;
//!
//! let mut scene = JsonScene::load("shot.json")?;
//! let settings = ExportSettings { animation: true, frame_end: 24.0, ..Default::default() };
//! let mut session = ExportSession::create(settings, SchemaRegistry::builtin()?, "shot.vrscene".as_ref())?;
//! session.export(&mut scene)?;
//! session.finish()?;
//! ```

pub mod util;
pub mod core;
pub mod schema;
pub mod output;
pub mod exporter;
pub mod geom;
pub mod instancer;
pub mod nodes;
pub mod scene;
pub mod session;
pub mod settings;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{AttrType, AttrValue, AttributeMap, BufferFormat};
    pub use crate::exporter::{ExportOutcome, PluginWriter, Timeline};
    pub use crate::output::{Channel, MemorySink, Outputs, PluginType};
    pub use crate::scene::{JsonScene, SceneObject, SceneSource};
    pub use crate::schema::SchemaRegistry;
    pub use crate::session::{ExportSession, ExportStatus};
    pub use crate::settings::ExportSettings;
    pub use crate::util::{Error, Result};
}
