//! Per node-type resolution strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::graph::{Node, NodeTree};
use super::resolver::{GraphEnv, NodeGraphResolver};
use crate::core::{AttrType, AttrValue, AttributeMap};
use crate::util::Result;

/// Tag of the selector node.
pub const SWITCH: &str = "Switch";
/// Tag of the constant node.
pub const VALUE: &str = "Value";

/// Resolves one node into a value or a plugin reference.
pub trait NodeHandler: Send + Sync {
    /// Resolve `node` of `tree` for a consumer expecting `ty`.
    fn resolve<'a>(
        &self,
        resolver: &mut NodeGraphResolver,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        node: &'a Node,
        ty: AttrType,
    ) -> Result<AttrValue>;

    /// Results are named plugins and are memoized by graph position.
    fn exports_plugin(&self) -> bool {
        true
    }
}

/// Schema-driven plugin node: every exported attribute comes from a socket
/// or the node's property bag.
#[derive(Debug, Default)]
pub struct PluginHandler;

impl NodeHandler for PluginHandler {
    fn resolve<'a>(
        &self,
        resolver: &mut NodeGraphResolver,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        node: &'a Node,
        _ty: AttrType,
    ) -> Result<AttrValue> {
        let schema = env.schema;
        let id = node.node_type.as_str();
        let Some(desc) = schema.lookup(id) else {
            warn!(node = node.name.as_str(), plugin = id, "no schema for plugin");
            return Ok(AttrValue::null());
        };

        let name = resolver.node_name(tree, node);
        let mut attrs = AttributeMap::new();
        for attr in desc.exported() {
            let from_bag = node.properties.get(&attr.name).and_then(|p| p.to_attr(attr.ty));
            let socket = node.inputs.iter().find(|s| s.attr_name() == attr.name);

            // Mappable attributes prefer the graph; the rest prefer the bag.
            let value = match socket {
                Some(s) if attr.ty.is_mappable() || from_bag.is_none() => {
                    if s.value.is_none() && !tree.is_linked(&node.name, &s.name) {
                        from_bag
                    } else {
                        Some(resolver.resolve_input(env, tree, node, &s.name, attr.ty)?)
                    }
                }
                _ => from_bag,
            };

            match value {
                Some(v) if v.is_null() => {
                    debug!(plugin = name.as_str(), attr = attr.name.as_str(), "attribute unresolved");
                }
                Some(v) => {
                    attrs.insert(attr.name.clone(), v);
                }
                None => {}
            }
        }

        env.writer.export_plugin(desc.plugin_type, id, &name, &attrs)?;
        Ok(AttrValue::plugin(&name))
    }
}

/// Follows only the input picked by the integer `selector` property
/// (`Input 0`, `Input 1`, ...).
#[derive(Debug, Default)]
pub struct SwitchHandler;

impl NodeHandler for SwitchHandler {
    fn resolve<'a>(
        &self,
        resolver: &mut NodeGraphResolver,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        node: &'a Node,
        ty: AttrType,
    ) -> Result<AttrValue> {
        let selector = node.properties.get_int("selector", 0);
        let socket = format!("Input {}", selector);
        resolver.resolve_input(env, tree, node, &socket, ty)
    }

    fn exports_plugin(&self) -> bool {
        false
    }
}

/// Constant node; its `value` property is rendered as a literal.
#[derive(Debug, Default)]
pub struct ValueHandler;

impl NodeHandler for ValueHandler {
    fn resolve<'a>(
        &self,
        _resolver: &mut NodeGraphResolver,
        _env: &mut GraphEnv<'a>,
        _tree: &'a NodeTree,
        node: &'a Node,
        ty: AttrType,
    ) -> Result<AttrValue> {
        match node.properties.get("value").and_then(|v| v.to_attr(ty)) {
            Some(v) => Ok(v),
            None => {
                warn!(node = node.name.as_str(), ?ty, "value node does not fit the consumer");
                Ok(AttrValue::null())
            }
        }
    }

    fn exports_plugin(&self) -> bool {
        false
    }
}

/// Node-type tag to handler.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
    fallback: Arc<dyn NodeHandler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Registry with the built-in handlers; unknown tags use [`PluginHandler`].
    pub fn new() -> Self {
        let mut registry = Self { handlers: HashMap::new(), fallback: Arc::new(PluginHandler) };
        registry.register(SWITCH, Arc::new(SwitchHandler));
        registry.register(VALUE, Arc::new(ValueHandler));
        registry
    }

    pub fn register(&mut self, tag: &str, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(tag.to_string(), handler);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Handler for `tag`.
    pub fn get(&self, tag: &str) -> Arc<dyn NodeHandler> {
        self.handlers
            .get(tag)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}
