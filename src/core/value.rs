//! Attribute values rendered to scene-file text.
//!
//! An [`AttrValue`] is immutable once built: its text is exactly what lands
//! on the right-hand side of `name=value;` in a plugin block.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::encoding;
use crate::util::{Mat3, Mat4, Vec3, Vec4};

/// Text of the sentinel produced by failed resolutions.
pub const NULL_TEXT: &str = "NULL";

/// Attribute type tags as used by the plugin schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttrType {
    Bool,
    Int,
    Float,
    Color,
    #[serde(rename = "ACOLOR")]
    AColor,
    Vector,
    String,
    Plugin,
    Texture,
    FloatTexture,
    IntTexture,
    VectorTexture,
    Transform,
    Matrix,
    List,
    ListInt,
    ListFloat,
    ListVector,
    ListColor,
    ListString,
    ListPlugin,
}

impl AttrType {
    /// Structural types (matrices and lists) are always written literally.
    pub fn is_animatable(self) -> bool {
        !matches!(
            self,
            AttrType::Matrix
                | AttrType::List
                | AttrType::ListInt
                | AttrType::ListFloat
                | AttrType::ListVector
                | AttrType::ListColor
                | AttrType::ListString
                | AttrType::ListPlugin
        )
    }

    /// Mappable attributes may be driven by a node-graph link.
    pub fn is_mappable(self) -> bool {
        matches!(
            self,
            AttrType::Plugin
                | AttrType::Texture
                | AttrType::FloatTexture
                | AttrType::IntTexture
                | AttrType::VectorTexture
        )
    }
}

/// A value already rendered to the target text encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrValue {
    ty: AttrType,
    text: String,
}

/// Attribute name to value. Ordered so that output is deterministic.
pub type AttributeMap = BTreeMap<String, AttrValue>;

/// Format a float the way the scene parser reads it back exactly.
pub fn format_float(v: f32) -> String {
    if v.is_finite() {
        format!("{}", v)
    } else {
        "0".to_string()
    }
}

fn format_vec3(v: Vec3) -> String {
    format!("{}, {}, {}", format_float(v.x), format_float(v.y), format_float(v.z))
}

impl AttrValue {
    /// Wrap pre-rendered text.
    pub fn raw(ty: AttrType, text: impl Into<String>) -> Self {
        Self { ty, text: text.into() }
    }

    /// The failed-resolution sentinel.
    pub fn null() -> Self {
        Self::raw(AttrType::Plugin, NULL_TEXT)
    }

    pub fn bool(v: bool) -> Self {
        Self::raw(AttrType::Bool, if v { "1" } else { "0" })
    }

    pub fn int(v: i64) -> Self {
        Self::raw(AttrType::Int, v.to_string())
    }

    pub fn float(v: f32) -> Self {
        Self::raw(AttrType::Float, format_float(v))
    }

    pub fn color(c: Vec3) -> Self {
        Self::raw(AttrType::Color, format!("Color({})", format_vec3(c)))
    }

    pub fn acolor(c: Vec4) -> Self {
        Self::raw(
            AttrType::AColor,
            format!("AColor({}, {})", format_vec3(c.truncate()), format_float(c.w)),
        )
    }

    pub fn vector(v: Vec3) -> Self {
        Self::raw(AttrType::Vector, format!("Vector({})", format_vec3(v)))
    }

    /// Quoted string literal with `"` and `\` escaped.
    pub fn string(s: &str) -> Self {
        let mut text = String::with_capacity(s.len() + 2);
        text.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                text.push('\\');
            }
            text.push(c);
        }
        text.push('"');
        Self::raw(AttrType::String, text)
    }

    /// Reference to another plugin instance.
    pub fn plugin(name: &str) -> Self {
        Self::raw(AttrType::Plugin, name)
    }

    /// Reference to a named output of another plugin (`name::output`).
    pub fn plugin_output(name: &str, output: &str) -> Self {
        Self::raw(AttrType::Plugin, format!("{}::{}", name, output))
    }

    pub fn transform(m: &Mat4) -> Self {
        Self::raw(AttrType::Transform, encoding::transform_hex(m))
    }

    pub fn matrix(m: &Mat3) -> Self {
        let t = m.transpose();
        Self::raw(
            AttrType::Matrix,
            format!(
                "Matrix(Vector({}), Vector({}), Vector({}))",
                format_vec3(t.x_axis),
                format_vec3(t.y_axis),
                format_vec3(t.z_axis)
            ),
        )
    }

    /// `List(a, b, ...)` of already rendered items.
    pub fn list<I, S>(ty: AttrType, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::raw(ty, format!("List({})", joined))
    }

    pub fn list_int(values: &[i32]) -> Self {
        Self::list(AttrType::ListInt, values.iter().map(|v| v.to_string()))
    }

    pub fn list_string<S: AsRef<str>>(values: &[S]) -> Self {
        Self::list(
            AttrType::ListString,
            values.iter().map(|s| AttrValue::string(s.as_ref()).text),
        )
    }

    #[inline]
    pub fn ty(&self) -> AttrType {
        self.ty
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.text == NULL_TEXT
    }

    #[inline]
    pub fn is_animatable(&self) -> bool {
        self.ty.is_animatable()
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literals() {
        assert_eq!(AttrValue::bool(true).text(), "1");
        assert_eq!(AttrValue::int(-4).text(), "-4");
        assert_eq!(AttrValue::float(0.5).text(), "0.5");
        assert_eq!(AttrValue::float(2.0).text(), "2");
        assert_eq!(AttrValue::float(f32::NAN).text(), "0");
    }

    #[test]
    fn test_compound_literals() {
        assert_eq!(AttrValue::color(Vec3::new(1.0, 0.5, 0.0)).text(), "Color(1, 0.5, 0)");
        assert_eq!(
            AttrValue::acolor(Vec4::new(1.0, 1.0, 1.0, 0.25)).text(),
            "AColor(1, 1, 1, 0.25)"
        );
        assert_eq!(AttrValue::vector(Vec3::Z).text(), "Vector(0, 0, 1)");
        assert_eq!(
            AttrValue::matrix(&Mat3::IDENTITY).text(),
            "Matrix(Vector(1, 0, 0), Vector(0, 1, 0), Vector(0, 0, 1))"
        );
    }

    #[test]
    fn test_string_escape() {
        assert_eq!(AttrValue::string(r#"a"b\c"#).text(), r#""a\"b\\c""#);
    }

    #[test]
    fn test_lists_and_refs() {
        assert_eq!(AttrValue::list_int(&[1, 2]).text(), "List(1, 2)");
        assert_eq!(AttrValue::list_string(&["uv"]).text(), r#"List("uv")"#);
        assert_eq!(AttrValue::plugin_output("TEbitmap", "out_alpha").text(), "TEbitmap::out_alpha");
        assert!(AttrValue::null().is_null());
    }

    #[test]
    fn test_type_classes() {
        assert!(AttrType::Transform.is_animatable());
        assert!(!AttrType::ListVector.is_animatable());
        assert!(!AttrType::Matrix.is_animatable());
        assert!(AttrType::Texture.is_mappable());
        assert!(!AttrType::Float.is_mappable());
    }

    #[test]
    fn test_schema_tags() {
        let ty: AttrType = serde_json::from_str("\"FLOAT_TEXTURE\"").unwrap();
        assert_eq!(ty, AttrType::FloatTexture);
        let ty: AttrType = serde_json::from_str("\"ACOLOR\"").unwrap();
        assert_eq!(ty, AttrType::AColor);
    }
}
