//! Plugin write path.
//!
//! [`PluginWriter::export_plugin`] takes a typed, named attribute map and
//! decides, through the [`PluginNameCache`] and [`AnimationCache`], what
//! actually reaches the output channels:
//!
//! - still export: every attribute as a literal `name=value;`
//! - first sight of a plugin in an animation: every attribute, animatable
//!   ones as a one-point `interpolate((F, v))` span
//! - later frames: unchanged animatable attributes are dropped; changed ones
//!   get `interpolate((F, v))`, or `interpolate((F-S, old), (F, v))` when the
//!   last emitted key is older than the previous frame

use std::fmt::Write as _;

use tracing::{debug, trace, warn};

use crate::core::{hash_str, AnimationCache, AttrValue, AttributeMap, PluginNameCache};
use crate::output::{route, Channel, Outputs, PluginType};
use crate::util::Result;

/// Frames closer than this compare equal.
const FRAME_EPSILON: f64 = 1e-6;

/// Result of one `export_plugin` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A plugin block was written.
    Emitted,
    /// The name was already emitted in this pass.
    Skipped,
    /// Nothing changed on this frame; no block written.
    Deferred,
}

/// Animation timeline as seen by the writer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timeline {
    pub animated: bool,
    pub frame_start: f64,
    pub frame_step: f64,
}

impl Timeline {
    /// A single-frame export.
    pub fn still() -> Self {
        Self { animated: false, frame_start: 0.0, frame_step: 1.0 }
    }

    /// An animated export starting at `frame_start`.
    pub fn animated(frame_start: f64, frame_step: f64) -> Self {
        Self { animated: true, frame_start, frame_step }
    }
}

/// Owns the export caches and the output channels.
pub struct PluginWriter {
    outputs: Outputs,
    names: PluginNameCache,
    anim: AnimationCache,
    timeline: Timeline,
    frame: f64,
}

impl PluginWriter {
    pub fn new(outputs: Outputs, timeline: Timeline) -> Self {
        Self {
            outputs,
            names: PluginNameCache::new(),
            anim: AnimationCache::new(),
            frame: timeline.frame_start,
            timeline,
        }
    }

    /// Start a new export pass at `frame`: the name epoch is reset.
    pub fn begin_frame(&mut self, frame: f64) {
        self.frame = frame;
        self.names.clear();
    }

    /// Forget all per-job state (new render job or frame-range change).
    pub fn reset(&mut self, timeline: Timeline) {
        self.timeline = timeline;
        self.frame = timeline.frame_start;
        self.names.clear();
        self.anim.clear();
    }

    #[inline]
    pub fn frame(&self) -> f64 {
        self.frame
    }

    #[inline]
    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    #[inline]
    pub fn is_animated(&self) -> bool {
        self.timeline.animated
    }

    /// Still exports and the first frame of an animation write full definitions.
    pub fn is_first_frame(&self) -> bool {
        !self.timeline.animated || (self.frame - self.timeline.frame_start).abs() < FRAME_EPSILON
    }

    pub fn name_cache(&self) -> &PluginNameCache {
        &self.names
    }

    pub fn animation_cache(&self) -> &AnimationCache {
        &self.anim
    }

    /// Whether `name` was already emitted in the current pass.
    pub fn is_emitted(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Export one plugin instance.
    pub fn export_plugin(
        &mut self,
        plugin_type: PluginType,
        id: &str,
        name: &str,
        attrs: &AttributeMap,
    ) -> Result<ExportOutcome> {
        if !self.names.try_reserve(name) {
            trace!(plugin = name, "already emitted in this pass");
            return Ok(ExportOutcome::Skipped);
        }

        let known = self.anim.is_known(name);
        let mut body = String::new();
        for (attr, value) in attrs {
            if value.is_null() {
                warn!(plugin = name, attr = attr.as_str(), "unresolved attribute omitted");
                continue;
            }
            if let Some(line) = self.render_attribute(name, attr, value, known) {
                let _ = writeln!(body, "\t{}={};", attr, line);
            }
        }

        if body.is_empty() && !self.is_first_frame() {
            trace!(plugin = name, frame = self.frame, "no changes");
            return Ok(ExportOutcome::Deferred);
        }

        let channel = route(plugin_type, id);
        let block = format!("{} {} {{\n{}}}\n\n", id, name, body);
        self.outputs.write(channel, &block)?;
        debug!(plugin = name, id, ?channel, "emitted");
        Ok(ExportOutcome::Emitted)
    }

    /// Render the right-hand side for one attribute, or `None` to skip it.
    fn render_attribute(&mut self, plugin: &str, attr: &str, value: &AttrValue, known: bool) -> Option<String> {
        if !self.timeline.animated {
            return Some(value.text().to_string());
        }

        let frame = self.frame;
        let hash = hash_str(value.text());

        if !value.is_animatable() {
            self.anim.put(plugin, attr, frame, value.clone(), hash);
            return Some(value.text().to_string());
        }

        let previous = if known { self.anim.get(plugin, attr) } else { None };
        let line = match previous {
            Some(entry) if entry.hash == hash => {
                // Entry unchanged: it keeps the frame of the last emitted key.
                return None;
            }
            Some(entry) => {
                let prev_frame = frame - self.timeline.frame_step;
                if entry.frame < prev_frame - FRAME_EPSILON {
                    format!(
                        "interpolate(({}, {}), ({}, {}))",
                        prev_frame,
                        entry.value.text(),
                        frame,
                        value.text()
                    )
                } else {
                    format!("interpolate(({}, {}))", frame, value.text())
                }
            }
            None => format!("interpolate(({}, {}))", frame, value.text()),
        };

        self.anim.put(plugin, attr, frame, value.clone(), hash);
        Some(line)
    }

    /// Append pre-rendered text to a channel.
    pub fn write_raw(&mut self, channel: Channel, text: &str) -> Result<()> {
        self.outputs.write(channel, text)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.outputs.flush()
    }

    /// Consume the writer, returning the output channels.
    pub fn into_outputs(self) -> Outputs {
        self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;

    fn writer(timeline: Timeline) -> (PluginWriter, MemorySink) {
        let sink = MemorySink::new();
        (PluginWriter::new(Outputs::single(sink.clone()), timeline), sink)
    }

    fn light(intensity: f32) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("intensity".into(), AttrValue::float(intensity));
        attrs.insert("ids".into(), AttrValue::list_int(&[1, 2]));
        attrs
    }

    /// Parse every `intensity=interpolate(...)` span from the output.
    fn intensity_keys(text: &str) -> Vec<(f64, f64)> {
        let mut keys = Vec::new();
        for line in text.lines().filter(|l| l.trim_start().starts_with("intensity=")) {
            let inner = line
                .trim()
                .trim_start_matches("intensity=interpolate(")
                .trim_end_matches(");");
            for pair in inner.split("), (") {
                let pair = pair.trim_matches(|c| c == '(' || c == ')');
                let mut it = pair.split(", ");
                let f: f64 = it.next().unwrap().parse().unwrap();
                let v: f64 = it.next().unwrap().parse().unwrap();
                keys.push((f, v));
            }
        }
        keys
    }

    fn sample(keys: &[(f64, f64)], frame: f64) -> f64 {
        let mut last = keys[0];
        for &(f, v) in keys {
            if f == frame {
                return v;
            }
            if f > frame {
                let t = (frame - last.0) / (f - last.0);
                return last.1 + (v - last.1) * t;
            }
            last = (f, v);
        }
        last.1
    }

    #[test]
    fn test_still_export_is_literal_and_idempotent() {
        let run = || {
            let (mut w, sink) = writer(Timeline::still());
            w.begin_frame(0.0);
            w.export_plugin(PluginType::Light, "LightOmni", "LAlamp", &light(2.0)).unwrap();
            sink.contents()
        };
        let out = run();
        assert_eq!(out, "LightOmni LAlamp {\n\tids=List(1, 2);\n\tintensity=2;\n}\n\n");
        assert_eq!(out, run());
    }

    #[test]
    fn test_duplicate_name_skipped_until_next_pass() {
        let (mut w, sink) = writer(Timeline::still());
        w.begin_frame(0.0);
        let attrs = light(1.0);
        assert_eq!(w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap(), ExportOutcome::Emitted);
        assert_eq!(w.export_plugin(PluginType::Light, "LightOmni", "LA", &light(5.0)).unwrap(), ExportOutcome::Skipped);
        assert_eq!(sink.contents().matches("LightOmni LA {").count(), 1);
        assert!(sink.contents().contains("intensity=1;"));

        w.begin_frame(0.0);
        assert_eq!(w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap(), ExportOutcome::Emitted);
    }

    #[test]
    fn test_first_frame_spans_and_structural_literals() {
        let (mut w, sink) = writer(Timeline::animated(1.0, 1.0));
        w.begin_frame(1.0);
        w.export_plugin(PluginType::Light, "LightOmni", "LA", &light(2.0)).unwrap();
        let out = sink.contents();
        assert!(out.contains("\tintensity=interpolate((1, 2));"));
        assert!(out.contains("\tids=List(1, 2);"));
    }

    #[test]
    fn test_unchanged_frame_is_deferred_without_structural_attrs() {
        let (mut w, sink) = writer(Timeline::animated(1.0, 1.0));
        let mut attrs = AttributeMap::new();
        attrs.insert("intensity".into(), AttrValue::float(2.0));

        w.begin_frame(1.0);
        assert_eq!(w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap(), ExportOutcome::Emitted);
        sink.take();

        w.begin_frame(2.0);
        assert_eq!(w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap(), ExportOutcome::Deferred);
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_backfill_after_static_gap() {
        let (mut w, sink) = writer(Timeline::animated(1.0, 1.0));
        let mut attrs = AttributeMap::new();
        for (frame, value) in [(1.0, 0.0f32), (2.0, 0.0), (3.0, 4.0)] {
            attrs.insert("intensity".into(), AttrValue::float(value));
            w.begin_frame(frame);
            w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap();
        }
        let out = sink.contents();
        assert!(out.contains("intensity=interpolate((1, 0));"));
        assert!(out.contains("intensity=interpolate((2, 0), (3, 4));"));
    }

    #[test]
    fn test_consecutive_changes_need_no_backfill() {
        let (mut w, sink) = writer(Timeline::animated(1.0, 1.0));
        let mut attrs = AttributeMap::new();
        for (frame, value) in [(1.0, 1.0f32), (2.0, 2.0)] {
            attrs.insert("intensity".into(), AttrValue::float(value));
            w.begin_frame(frame);
            w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap();
        }
        assert!(sink.contents().contains("intensity=interpolate((2, 2));"));
    }

    #[test]
    fn test_spans_reconstruct_every_frame() {
        let (mut w, sink) = writer(Timeline::animated(0.0, 1.0));
        let values = [1.0f32, 1.0, 1.0, 3.0, 5.0, 5.0, 2.0, 2.0, 2.0, 2.0, 7.0];
        let mut attrs = AttributeMap::new();
        for (i, v) in values.iter().enumerate() {
            attrs.insert("intensity".into(), AttrValue::float(*v));
            w.begin_frame(i as f64);
            w.export_plugin(PluginType::Light, "LightOmni", "LA", &attrs).unwrap();
        }
        let keys = intensity_keys(&sink.contents());
        for (i, v) in values.iter().enumerate() {
            assert_eq!(sample(&keys, i as f64), *v as f64, "frame {}", i);
        }
    }

    #[test]
    fn test_null_values_omitted() {
        let (mut w, sink) = writer(Timeline::still());
        let mut attrs = AttributeMap::new();
        attrs.insert("brdf".into(), AttrValue::null());
        attrs.insert("double_sided".into(), AttrValue::bool(true));
        w.export_plugin(PluginType::Material, "MtlSingleBRDF", "MA", &attrs).unwrap();
        let out = sink.contents();
        assert!(!out.contains("brdf="));
        assert!(out.contains("double_sided=1;"));
    }
}
