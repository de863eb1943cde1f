//! Output channels and plugin routing.
//!
//! Plugins are appended to one of several independent channels chosen by
//! their [`PluginType`]. Channels either share one sink or get a file each,
//! in which case the main file `#include`s the others.

mod stream;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::Result;
pub use stream::{FileSink, MemorySink, OutputSink};

/// Plugin category as declared by the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Object,
    Geometry,
    Texture,
    UvwGen,
    Material,
    Brdf,
    Light,
    Effect,
    Environment,
    RenderChannel,
    Camera,
    Settings,
    Other,
}

/// Output channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Main,
    Nodes,
    Geometry,
    Lights,
    Materials,
    Textures,
    Environment,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Main,
        Channel::Nodes,
        Channel::Geometry,
        Channel::Lights,
        Channel::Materials,
        Channel::Textures,
        Channel::Environment,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    /// File-name suffix used in per-channel mode.
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::Main => "main",
            Channel::Nodes => "nodes",
            Channel::Geometry => "geometry",
            Channel::Lights => "lights",
            Channel::Materials => "materials",
            Channel::Textures => "textures",
            Channel::Environment => "environment",
        }
    }
}

/// Geometry plugins regenerated per frame; they live with the nodes.
pub const DYNAMIC_GEOMETRY: &[&str] = &[
    "GeomDisplacedMesh",
    "GeomStaticSmoothedMesh",
    "GeomPlane",
    "GeomMayaHair",
    "GeomParticleSystem",
    "Instancer",
];

/// Channel a plugin of `ty` / `id` is written to.
pub fn route(ty: PluginType, id: &str) -> Channel {
    match ty {
        PluginType::Geometry if DYNAMIC_GEOMETRY.contains(&id) => Channel::Nodes,
        PluginType::Geometry => Channel::Geometry,
        PluginType::Texture | PluginType::UvwGen => Channel::Textures,
        PluginType::Material | PluginType::Brdf => Channel::Materials,
        PluginType::Light => Channel::Lights,
        PluginType::Effect | PluginType::Environment => Channel::Environment,
        PluginType::RenderChannel | PluginType::Camera | PluginType::Settings => Channel::Main,
        PluginType::Object | PluginType::Other => Channel::Nodes,
    }
}

/// Header comment placed at the top of every scene file.
pub fn header_comment() -> String {
    format!(
        "// Exported by vrscene-export {} (built {})\n\n",
        env!("CARGO_PKG_VERSION"),
        option_env!("VRSCENE_BUILD_STAMP").unwrap_or("unknown")
    )
}

/// The set of channel sinks of one export.
pub struct Outputs {
    sinks: Vec<Box<dyn OutputSink>>,
    /// Channel index -> sink index.
    map: [usize; 7],
}

impl Outputs {
    /// Route every channel to one sink.
    pub fn single(sink: impl OutputSink + 'static) -> Self {
        Self { sinks: vec![Box::new(sink)], map: [0; 7] }
    }

    /// One sink per channel, produced by `make`.
    pub fn per_channel<F>(mut make: F) -> Result<Self>
    where
        F: FnMut(Channel) -> Result<Box<dyn OutputSink>>,
    {
        let mut sinks = Vec::with_capacity(Channel::ALL.len());
        let mut map = [0; 7];
        for channel in Channel::ALL {
            map[channel.index()] = sinks.len();
            sinks.push(make(channel)?);
        }
        Ok(Self { sinks, map })
    }

    /// Create file sinks for `path`.
    ///
    /// With `separate`, each non-main channel goes to `<stem>_<suffix>.vrscene`
    /// next to `path` and the main file includes them.
    pub fn create_files(path: &Path, separate: bool) -> Result<Self> {
        if !separate {
            let mut sink = FileSink::create(path)?;
            sink.write_str(&header_comment())?;
            return Ok(Self::single(sink));
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "scene".to_string());
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let channel_path = |channel: Channel| -> PathBuf {
            if channel == Channel::Main {
                path.to_path_buf()
            } else {
                dir.join(format!("{}_{}.vrscene", stem, channel.suffix()))
            }
        };

        let mut outputs = Self::per_channel(|channel| {
            let mut sink = FileSink::create(channel_path(channel))?;
            sink.write_str(&header_comment())?;
            Ok(Box::new(sink) as Box<dyn OutputSink>)
        })?;

        let mut includes = String::new();
        for channel in Channel::ALL.into_iter().filter(|c| *c != Channel::Main) {
            let file_name = channel_path(channel)
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            includes.push_str(&format!("#include \"{}\"\n", file_name));
        }
        includes.push('\n');
        outputs.write(Channel::Main, &includes)?;
        Ok(outputs)
    }

    /// Append text to a channel.
    pub fn write(&mut self, channel: Channel, text: &str) -> Result<()> {
        let idx = self.map[channel.index()];
        self.sinks[idx].write_str(text)
    }

    /// Flush every sink.
    pub fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }

    /// Number of distinct sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table() {
        assert_eq!(route(PluginType::Geometry, "GeomStaticMesh"), Channel::Geometry);
        assert_eq!(route(PluginType::Geometry, "GeomDisplacedMesh"), Channel::Nodes);
        assert_eq!(route(PluginType::Geometry, "Instancer"), Channel::Nodes);
        assert_eq!(route(PluginType::UvwGen, "UVWGenChannel"), Channel::Textures);
        assert_eq!(route(PluginType::Brdf, "BRDFDiffuse"), Channel::Materials);
        assert_eq!(route(PluginType::Light, "LightOmni"), Channel::Lights);
        assert_eq!(route(PluginType::Effect, "EnvironmentFog"), Channel::Environment);
        assert_eq!(route(PluginType::RenderChannel, "RenderChannelColor"), Channel::Main);
        assert_eq!(route(PluginType::Object, "Node"), Channel::Nodes);
    }

    #[test]
    fn test_single_sink_gets_everything() -> crate::util::Result<()> {
        let sink = MemorySink::new();
        let mut outputs = Outputs::single(sink.clone());
        outputs.write(Channel::Geometry, "a")?;
        outputs.write(Channel::Lights, "b")?;
        assert_eq!(sink.contents(), "ab");
        assert_eq!(outputs.sink_count(), 1);
        Ok(())
    }

    #[test]
    fn test_separate_files_are_included() -> crate::util::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shot.vrscene");
        let mut outputs = Outputs::create_files(&path, true)?;
        outputs.write(Channel::Geometry, "GeomStaticMesh MEx {\n}\n")?;
        outputs.flush()?;

        let main = std::fs::read_to_string(&path)?;
        assert!(main.contains("#include \"shot_geometry.vrscene\""));
        let geometry = std::fs::read_to_string(dir.path().join("shot_geometry.vrscene"))?;
        assert!(geometry.starts_with("// Exported by vrscene-export"));
        assert!(geometry.contains("GeomStaticMesh MEx"));
        Ok(())
    }
}
