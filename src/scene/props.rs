//! Typed property bag shared by scene objects and graph nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{AttrType, AttrValue, AttributeMap};
use crate::schema::PluginDesc;
use crate::util::{from_row_major, Mat3, Vec3, Vec4};

/// A host property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Floats(Vec<f64>),
    /// Strings and enum identifiers.
    String(String),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            PropValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            PropValue::Bool(b) => Some(*b as i64),
            PropValue::Float(f) => Some(f.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(f) => Some(*f),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn floats<const N: usize>(&self) -> Option<[f32; N]> {
        let PropValue::Floats(v) = self else {
            return None;
        };
        if v.len() < N {
            return None;
        }
        let mut out = [0f32; N];
        for (o, f) in out.iter_mut().zip(v) {
            *o = *f as f32;
        }
        Some(out)
    }

    /// Render as an attribute of type `ty`; `None` when the value does not fit.
    pub fn to_attr(&self, ty: AttrType) -> Option<AttrValue> {
        let value = match ty {
            AttrType::Bool => AttrValue::bool(self.as_bool()?),
            AttrType::Int | AttrType::IntTexture => AttrValue::int(self.as_int()?),
            AttrType::Float | AttrType::FloatTexture => AttrValue::float(self.as_float()? as f32),
            AttrType::Color | AttrType::Texture => match self {
                PropValue::Float(f) => AttrValue::color(Vec3::splat(*f as f32)),
                _ => AttrValue::color(Vec3::from_array(self.floats::<3>()?)),
            },
            AttrType::AColor => match self.floats::<4>() {
                Some(c) => AttrValue::acolor(Vec4::from_array(c)),
                None => AttrValue::acolor(Vec3::from_array(self.floats::<3>()?).extend(1.0)),
            },
            AttrType::Vector | AttrType::VectorTexture => AttrValue::vector(Vec3::from_array(self.floats::<3>()?)),
            AttrType::String => AttrValue::string(self.as_str()?),
            AttrType::Plugin => AttrValue::plugin(self.as_str()?),
            AttrType::Transform => AttrValue::transform(&from_row_major(&self.floats::<16>()?)),
            AttrType::Matrix => {
                let m = self.floats::<9>()?;
                AttrValue::matrix(&Mat3::from_cols_array(&m).transpose())
            }
            AttrType::ListInt => match self {
                PropValue::Floats(v) => {
                    let ints: Vec<i32> = v.iter().map(|f| *f as i32).collect();
                    AttrValue::list_int(&ints)
                }
                _ => return None,
            },
            AttrType::ListFloat => match self {
                PropValue::Floats(v) => AttrValue::list(
                    AttrType::ListFloat,
                    v.iter().map(|f| crate::core::format_float(*f as f32)),
                ),
                _ => return None,
            },
            _ => return None,
        };
        Some(value)
    }
}

/// String-keyed property bag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, PropValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(PropValue::as_bool).unwrap_or(default)
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(PropValue::as_int).unwrap_or(default)
    }

    pub fn get_float(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(PropValue::as_float).unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).and_then(PropValue::as_str).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Source every exported attribute of `desc` that the bag holds and that
    /// converts to the declared type. Missing or mistyped ones are left out.
    pub fn attributes_for(&self, desc: &PluginDesc) -> AttributeMap {
        desc.exported()
            .filter_map(|a| {
                let value = self.get(&a.name)?.to_attr(a.ty)?;
                Some((a.name.clone(), value))
            })
            .collect()
    }
}

impl FromIterator<(String, PropValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_untagged_json() {
        let bag: PropertyBag =
            serde_json::from_str(r#"{"a": true, "b": 3, "c": 0.5, "d": [1, 0, 0], "e": "LightOmni"}"#).unwrap();
        assert_eq!(bag.get("a"), Some(&PropValue::Bool(true)));
        assert_eq!(bag.get("b"), Some(&PropValue::Int(3)));
        assert_eq!(bag.get("c"), Some(&PropValue::Float(0.5)));
        assert_eq!(bag.get("d"), Some(&PropValue::Floats(vec![1.0, 0.0, 0.0])));
        assert_eq!(bag.get_str("e", ""), "LightOmni");
        assert_eq!(bag.get_float("b", 0.0), 3.0);
    }

    #[test]
    fn test_conversions() {
        let c = PropValue::Floats(vec![1.0, 0.5, 0.0]);
        assert_eq!(c.to_attr(AttrType::Color).unwrap().text(), "Color(1, 0.5, 0)");
        assert_eq!(c.to_attr(AttrType::AColor).unwrap().text(), "AColor(1, 0.5, 0, 1)");
        assert_eq!(PropValue::Int(2).to_attr(AttrType::FloatTexture).unwrap().text(), "2");
        assert!(PropValue::String("x".into()).to_attr(AttrType::Float).is_none());
        assert!(PropValue::Floats(vec![1.0]).to_attr(AttrType::Vector).is_none());
    }

    #[test]
    fn test_schema_sourcing() {
        let schema = SchemaRegistry::builtin().unwrap();
        let desc = schema.lookup("LightOmni").unwrap();
        let bag: PropertyBag = serde_json::from_str(r#"{"intensity": 30.0, "shadows": false, "bogus": 1}"#).unwrap();
        let attrs = bag.attributes_for(desc);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["intensity"].text(), "30");
        assert_eq!(attrs["shadows"].text(), "0");
    }
}
