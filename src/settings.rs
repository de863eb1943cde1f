//! Export settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::BufferFormat;
use crate::exporter::Timeline;
use crate::util::{Error, Result};

/// User-facing export configuration. Every field has a default, so a
/// partial JSON file is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Export `frame_start..=frame_end` with keyframes instead of one frame.
    pub animation: bool,
    pub frame_start: f64,
    pub frame_end: f64,
    pub frame_step: f64,
    /// Frame rate written to `SettingsOutput`.
    pub fps: f64,
    pub buffer_format: BufferFormat,
    /// One file per output channel.
    pub separate_files: bool,
    /// Collapse duplis, particles and array copies into one `Instancer`.
    pub use_instancer: bool,
    /// Exported layer mask; 0 exports every layer.
    pub active_layers: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            animation: false,
            frame_start: 1.0,
            frame_end: 1.0,
            frame_step: 1.0,
            fps: 24.0,
            buffer_format: BufferFormat::Hex,
            separate_files: false,
            use_instancer: true,
            active_layers: 0,
        }
    }
}

impl ExportSettings {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let settings: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_step.is_nan() || self.frame_step <= 0.0 {
            return Err(Error::InvalidSettings(format!("frame_step must be positive, got {}", self.frame_step)));
        }
        if self.frame_end < self.frame_start {
            return Err(Error::InvalidSettings(format!(
                "frame_end {} is before frame_start {}",
                self.frame_end, self.frame_start
            )));
        }
        if self.fps.is_nan() || self.fps <= 0.0 {
            return Err(Error::InvalidSettings(format!("fps must be positive, got {}", self.fps)));
        }
        Ok(())
    }

    pub fn timeline(&self) -> Timeline {
        if self.animation {
            Timeline::animated(self.frame_start, self.frame_step)
        } else {
            Timeline::still()
        }
    }

    /// Frames exported by an animation, in order.
    pub fn frames(&self) -> Vec<f64> {
        let mut frames = Vec::new();
        if self.frame_step.is_nan() || self.frame_step <= 0.0 {
            return frames;
        }
        let mut i = 0u32;
        loop {
            let frame = self.frame_start + self.frame_step * i as f64;
            if frame > self.frame_end + 1e-9 {
                break;
            }
            frames.push(frame);
            i += 1;
        }
        frames
    }

    /// Whether an object on `layers` is exported.
    pub fn layer_visible(&self, layers: u32) -> bool {
        self.active_layers == 0 || self.active_layers & layers != 0
    }
}
