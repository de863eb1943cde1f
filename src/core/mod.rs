//! Core layer - hashing, values, encodings and the export caches.
//!
//! This module provides:
//! - [`ContentHash`] / [`hash_str`] - Change-detection hashing
//! - [`AttrValue`] / [`AttrType`] / [`AttributeMap`] - Rendered attribute values
//! - [`BufferFormat`] and list/transform encoders
//! - [`PluginNameCache`] - Per-pass name dedup
//! - [`AnimationCache`] - Per-attribute keyframe state

mod anim_cache;
pub mod encoding;
mod hash;
mod name_cache;
mod value;

pub use anim_cache::{AnimationCache, CacheEntry};
pub use encoding::BufferFormat;
pub use hash::{hash_str, ContentHash, ValueHash};
pub use name_cache::PluginNameCache;
pub use value::{format_float, AttrType, AttrValue, AttributeMap, NULL_TEXT};
