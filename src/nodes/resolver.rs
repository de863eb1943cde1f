//! Socket resolution across groups, relays and plugin nodes.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use super::context::{ContextFrame, ContextScope, ContextStack, GraphContext};
use super::graph::{Link, Node, NodeKind, NodeLibrary, NodeTree, Socket};
use super::handlers::HandlerRegistry;
use crate::core::{AttrType, AttrValue};
use crate::exporter::PluginWriter;
use crate::schema::SchemaRegistry;
use crate::util::{sanitize, Result};

/// Collaborators a resolution reads from and writes to.
pub struct GraphEnv<'a> {
    pub library: &'a NodeLibrary,
    pub schema: &'a SchemaRegistry,
    pub writer: &'a mut PluginWriter,
}

/// Deepest group nesting followed before giving up on a recursive group.
pub const MAX_GROUP_DEPTH: usize = 64;

/// Reference through `output`, suffixed with its role when it has one.
fn with_role(value: AttrValue, output: Option<&Socket>) -> AttrValue {
    match output.and_then(|s| s.role.as_deref()) {
        Some(role) if value.ty() == AttrType::Plugin && !value.is_null() => {
            AttrValue::plugin_output(value.text(), role)
        }
        _ => value,
    }
}

/// Resolves graph sockets to values, exporting plugin nodes on the way.
///
/// Plugin names are derived from the node's tree, its name and every group
/// currently entered, so one tree instantiated by two group nodes yields two
/// distinct plugins. The memo lives for one export pass.
#[derive(Clone, Default)]
pub struct NodeGraphResolver {
    context: GraphContext,
    memo: HashMap<String, AttrValue>,
    in_progress: HashSet<String>,
    /// Relay hops (reroutes, group boundaries) on the current path.
    relays: HashSet<String>,
    handlers: HandlerRegistry,
}

impl ContextStack for NodeGraphResolver {
    fn push_frame(&mut self, frame: ContextFrame) {
        self.context.push_frame(frame);
    }

    fn pop_frame(&mut self) -> Option<ContextFrame> {
        self.context.pop_frame()
    }

    fn depth(&self) -> usize {
        self.context.depth()
    }
}

impl NodeGraphResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handlers(handlers: HandlerRegistry) -> Self {
        Self { handlers, ..Default::default() }
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    /// Forget memoized plugins (start of an export pass).
    pub fn clear(&mut self) {
        self.memo.clear();
        self.in_progress.clear();
        self.relays.clear();
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Plugin name of `node` at the current context.
    pub fn node_name(&self, tree: &NodeTree, node: &Node) -> String {
        let raw = format!("{}{}@{}", self.context.prefix(), tree.name, node.name);
        sanitize(&raw)
    }

    /// Resolve input `socket` of the output collector of tree `tree_name`.
    pub fn resolve_output(&mut self, env: &mut GraphEnv<'_>, tree_name: &str, socket: &str) -> Result<AttrValue> {
        let library = env.library;
        let Some(tree) = library.tree(tree_name) else {
            warn!(tree = tree_name, "node tree not found");
            return Ok(AttrValue::null());
        };
        let Some(output) = tree.find_kind(NodeKind::Output) else {
            warn!(tree = tree_name, "node tree has no output node");
            return Ok(AttrValue::null());
        };
        self.resolve_input(env, tree, output, socket, AttrType::Plugin)
    }

    /// Resolve input `socket` of `node`: follow its link, or use the
    /// socket's literal when unlinked.
    pub fn resolve_input<'a>(
        &mut self,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        node: &'a Node,
        socket: &str,
        ty: AttrType,
    ) -> Result<AttrValue> {
        let Some(input) = node.input(socket) else {
            warn!(tree = tree.name.as_str(), node = node.name.as_str(), socket, "input socket not found");
            return Ok(AttrValue::null());
        };
        if let Some(link) = tree.link_into(&node.name, &input.name) {
            return self.resolve_link(env, tree, link, ty);
        }
        match input.value.as_ref().and_then(|v| v.to_attr(ty)) {
            Some(value) => Ok(value),
            None => {
                warn!(node = node.name.as_str(), socket, ?ty, "unlinked socket has no usable value");
                Ok(AttrValue::null())
            }
        }
    }

    fn resolve_link<'a>(
        &mut self,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        link: &'a Link,
        ty: AttrType,
    ) -> Result<AttrValue> {
        let Some(from) = tree.node(&link.from_node) else {
            warn!(tree = tree.name.as_str(), node = link.from_node.as_str(), "linked node not found");
            return Ok(AttrValue::null());
        };
        if from.muted {
            warn!(node = from.name.as_str(), "linked node is muted");
            return Ok(AttrValue::null());
        }

        match from.kind {
            NodeKind::Reroute | NodeKind::Group | NodeKind::GroupInput => {
                let key = format!("{}{}@{}:{}", self.context.prefix(), tree.name, from.name, link.from_socket);
                if !self.relays.insert(key.clone()) {
                    warn!(node = from.name.as_str(), socket = link.from_socket.as_str(), "node graph relay cycle");
                    return Ok(AttrValue::null());
                }
                let result = self.resolve_relay(env, tree, from, &link.from_socket, ty);
                self.relays.remove(&key);
                result
            }
            NodeKind::GroupOutput | NodeKind::Output => {
                warn!(node = from.name.as_str(), "output collector used as a producer");
                Ok(AttrValue::null())
            }
            NodeKind::Plugin => {
                let value = self.resolve_node(env, tree, from, ty)?;
                Ok(with_role(value, from.output(&link.from_socket)))
            }
        }
    }

    fn resolve_relay<'a>(
        &mut self,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        from: &'a Node,
        socket: &str,
        ty: AttrType,
    ) -> Result<AttrValue> {
        match from.kind {
            NodeKind::Reroute => {
                let Some(input) = from.inputs.first() else {
                    warn!(node = from.name.as_str(), "reroute without input");
                    return Ok(AttrValue::null());
                };
                self.resolve_input(env, tree, from, &input.name, ty)
            }
            NodeKind::Group => self.enter_group(env, tree, from, socket, ty),
            _ => self.leave_group(env, socket, ty),
        }
    }

    /// Group node: descend into its tree and resolve the matching input of
    /// the tree's output collector.
    fn enter_group<'a>(
        &mut self,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        group: &'a Node,
        socket: &str,
        ty: AttrType,
    ) -> Result<AttrValue> {
        if self.depth() >= MAX_GROUP_DEPTH {
            warn!(group = group.name.as_str(), depth = self.depth(), "group nesting too deep, recursive group?");
            return Ok(AttrValue::null());
        }
        let library = env.library;
        let mut scope = ContextScope::enter(self, ContextFrame::new(&tree.name, &group.name));

        let Some(sub) = group.tree.as_deref().and_then(|t| library.tree(t)) else {
            warn!(group = group.name.as_str(), "group tree not found");
            return Ok(AttrValue::null());
        };
        let Some(output) = sub.find_kind(NodeKind::GroupOutput) else {
            warn!(group = group.name.as_str(), tree = sub.name.as_str(), "group has no output node");
            return Ok(AttrValue::null());
        };
        if output.input(socket).is_none() {
            warn!(group = group.name.as_str(), socket, "group output has no matching socket");
            return Ok(AttrValue::null());
        }
        scope.resolve_input(env, sub, output, socket, ty)
    }

    /// Group input collector: step out to the enclosing group node and
    /// resolve its matching input in the parent tree.
    fn leave_group<'a>(&mut self, env: &mut GraphEnv<'a>, socket: &str, ty: AttrType) -> Result<AttrValue> {
        let library = env.library;
        let Some((mut scope, frame)) = ContextScope::leave(self) else {
            warn!(socket, "group input reached outside of a group");
            return Ok(AttrValue::null());
        };

        let Some(parent) = library.tree(&frame.tree) else {
            warn!(tree = frame.tree.as_str(), "enclosing tree not found");
            return Ok(AttrValue::null());
        };
        let Some(group) = parent.node(&frame.group_node) else {
            warn!(node = frame.group_node.as_str(), "enclosing group node not found");
            return Ok(AttrValue::null());
        };
        if group.input(socket).is_none() {
            warn!(group = group.name.as_str(), socket, "group node has no matching input");
            return Ok(AttrValue::null());
        }
        scope.resolve_input(env, parent, group, socket, ty)
    }

    /// Dispatch a plugin-kind node to its handler, memoizing named plugins.
    fn resolve_node<'a>(
        &mut self,
        env: &mut GraphEnv<'a>,
        tree: &'a NodeTree,
        node: &'a Node,
        ty: AttrType,
    ) -> Result<AttrValue> {
        let handler = self.handlers.get(&node.node_type);
        if !handler.exports_plugin() {
            return handler.resolve(self, env, tree, node, ty);
        }

        let name = self.node_name(tree, node);
        if let Some(value) = self.memo.get(&name) {
            trace!(plugin = name.as_str(), "memoized");
            return Ok(value.clone());
        }
        if !self.in_progress.insert(name.clone()) {
            warn!(plugin = name.as_str(), "node graph cycle");
            return Ok(AttrValue::null());
        }

        let result = handler.resolve(self, env, tree, node, ty);
        self.in_progress.remove(&name);
        let value = result?;
        if !value.is_null() {
            self.memo.insert(name, value.clone());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::Timeline;
    use crate::output::{MemorySink, Outputs};
    use crate::scene::PropValue;

    struct Fixture {
        schema: SchemaRegistry,
        writer: PluginWriter,
        sink: MemorySink,
    }

    impl Fixture {
        fn new() -> Self {
            let sink = MemorySink::new();
            let mut writer = PluginWriter::new(Outputs::single(sink.clone()), Timeline::still());
            writer.begin_frame(0.0);
            Self { schema: SchemaRegistry::builtin().unwrap(), writer, sink }
        }

        fn env<'a>(&'a mut self, library: &'a NodeLibrary) -> GraphEnv<'a> {
            GraphEnv { library, schema: &self.schema, writer: &mut self.writer }
        }
    }

    fn red() -> PropValue {
        PropValue::Floats(vec![1.0, 0.0, 0.0])
    }

    fn output_tree(name: &str, from: &str, from_socket: &str) -> NodeTree {
        NodeTree::new(name)
            .with_node(Node::new("Output", NodeKind::Output, "Output").with_input(Socket::new("Material")))
            .with_link(from, from_socket, "Output", "Material")
    }

    fn diffuse(name: &str) -> Node {
        Node::plugin(name, "BRDFDiffuse")
            .with_input(Socket::new("Color").with_attr("color_tex").with_value(red()))
            .with_output(Socket::new("BRDF"))
    }

    #[test]
    fn test_unlinked_default_and_plugin_export() {
        let library = NodeLibrary::new().with_tree(output_tree("Mat", "Diffuse", "BRDF").with_node(diffuse("Diffuse")));
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        let value = resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        assert_eq!(value.text(), "Mat@Diffuse");
        assert_eq!(fx.sink.contents(), "BRDFDiffuse Mat@Diffuse {\n\tcolor_tex=Color(1, 0, 0);\n}\n\n");

        // memoized: second resolution exports nothing new
        let again = resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        assert_eq!(again, value);
        assert_eq!(resolver.memo_len(), 1);
        assert_eq!(fx.sink.contents().matches("BRDFDiffuse").count(), 1);
    }

    #[test]
    fn test_role_suffix_and_reroute() {
        let tree = NodeTree::new("Mat")
            .with_node(Node::new("Output", NodeKind::Output, "Output").with_input(Socket::new("Material")))
            .with_node(
                Node::plugin("Diffuse", "BRDFDiffuse")
                    .with_input(Socket::new("Color").with_attr("color_tex"))
                    .with_output(Socket::new("BRDF")),
            )
            .with_node(Node::new("Relay", NodeKind::Reroute, "Reroute").with_input(Socket::new("Input")))
            .with_node(
                Node::plugin("Checker", "TexChecker")
                    .with_output(Socket::new("Color"))
                    .with_output(Socket::new("Alpha").with_role("out_alpha")),
            )
            .with_link("Diffuse", "BRDF", "Output", "Material")
            .with_link("Relay", "Output", "Diffuse", "Color")
            .with_link("Checker", "Alpha", "Relay", "Input");
        let library = NodeLibrary::new().with_tree(tree);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        let out = fx.sink.contents();
        assert!(out.contains("TexChecker Mat@Checker {\n}\n"));
        assert!(out.contains("\tcolor_tex=Mat@Checker::out_alpha;"));
        // producer exported before consumer
        assert!(out.find("TexChecker").unwrap() < out.find("BRDFDiffuse").unwrap());
    }

    /// Root -> G1 (L1) -> G2 (L2) -> G3 (L3, no output collector).
    fn three_level_library() -> NodeLibrary {
        let group_level = |name: &str, inner: &str| {
            NodeTree::new(name)
                .with_node(Node::new("GroupOut", NodeKind::GroupOutput, "GroupOutput").with_input(Socket::new("Shader")))
                .with_node(Node::group("Inner", inner).with_output(Socket::new("Shader")))
                .with_link("Inner", "Shader", "GroupOut", "Shader")
        };
        NodeLibrary::new()
            .with_tree(
                output_tree("Root", "G1", "Shader").with_node(Node::group("G1", "L1").with_output(Socket::new("Shader"))),
            )
            .with_tree(group_level("L1", "L2"))
            .with_tree(group_level("L2", "L3"))
            .with_tree(NodeTree::new("L3").with_node(diffuse("Orphan")))
    }

    #[test]
    fn test_context_balanced_three_levels_deep() {
        let library = three_level_library();
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        assert_eq!(resolver.depth(), 0);
        let value = resolver.resolve_output(&mut fx.env(&library), "Root", "Material").unwrap();
        assert!(value.is_null());
        assert_eq!(resolver.depth(), 0);
        assert!(fx.sink.contents().is_empty());
    }

    /// `Shared` passes its group input through a diffuse node; Root uses it twice.
    fn shared_group_library() -> NodeLibrary {
        let shared = NodeTree::new("Shared")
            .with_node(Node::new("GroupIn", NodeKind::GroupInput, "GroupInput").with_output(Socket::new("Tint")))
            .with_node(Node::new("GroupOut", NodeKind::GroupOutput, "GroupOutput").with_input(Socket::new("Shader")))
            .with_node(diffuse("Diffuse"))
            .with_link("GroupIn", "Tint", "Diffuse", "Color")
            .with_link("Diffuse", "BRDF", "GroupOut", "Shader");
        let root = NodeTree::new("Root")
            .with_node(
                Node::new("Output", NodeKind::Output, "Output")
                    .with_input(Socket::new("Material"))
                    .with_input(Socket::new("Second")),
            )
            .with_node(
                Node::group("GA", "Shared")
                    .with_input(Socket::new("Tint").with_value(red()))
                    .with_output(Socket::new("Shader")),
            )
            .with_node(
                Node::group("GB", "Shared")
                    .with_input(Socket::new("Tint").with_value(PropValue::Floats(vec![0.0, 0.0, 1.0])))
                    .with_output(Socket::new("Shader")),
            )
            .with_link("GA", "Shader", "Output", "Material")
            .with_link("GB", "Shader", "Output", "Second");
        NodeLibrary::new().with_tree(root).with_tree(shared)
    }

    #[test]
    fn test_group_instances_get_distinct_names() {
        let library = shared_group_library();
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        let a = resolver.resolve_output(&mut fx.env(&library), "Root", "Material").unwrap();
        let b = resolver.resolve_output(&mut fx.env(&library), "Root", "Second").unwrap();
        assert_eq!(a.text(), "Root@GA|Shared@Diffuse");
        assert_eq!(b.text(), "Root@GB|Shared@Diffuse");
        assert_eq!(resolver.depth(), 0);

        let out = fx.sink.contents();
        assert!(out.contains("BRDFDiffuse Root@GA|Shared@Diffuse {\n\tcolor_tex=Color(1, 0, 0);\n}"));
        assert!(out.contains("BRDFDiffuse Root@GB|Shared@Diffuse {\n\tcolor_tex=Color(0, 0, 1);\n}"));
    }

    #[test]
    fn test_switch_follows_selected_input_only() {
        let tree = output_tree("Mat", "Switch", "Output")
            .with_node(
                Node::new("Switch", NodeKind::Plugin, "Switch")
                    .with_input(Socket::new("Input 0"))
                    .with_input(Socket::new("Input 1"))
                    .with_output(Socket::new("Output"))
                    .with_property("selector", PropValue::Int(1)),
            )
            .with_node(diffuse("Unused"))
            .with_node(diffuse("Picked"))
            .with_link("Unused", "BRDF", "Switch", "Input 0")
            .with_link("Picked", "BRDF", "Switch", "Input 1");
        let library = NodeLibrary::new().with_tree(tree);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        let value = resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        assert_eq!(value.text(), "Mat@Picked");
        let out = fx.sink.contents();
        assert!(out.contains("Mat@Picked"));
        assert!(!out.contains("Unused"));
    }

    #[test]
    fn test_value_node_and_muted_producer() {
        let tree = output_tree("Mat", "Diffuse", "BRDF")
            .with_node(
                Node::plugin("Diffuse", "BRDFDiffuse")
                    .with_input(Socket::new("Roughness").with_attr("roughness"))
                    .with_input(Socket::new("Color").with_attr("color_tex"))
                    .with_output(Socket::new("BRDF")),
            )
            .with_node(Node::new("Rough", NodeKind::Plugin, "Value").with_property("value", PropValue::Float(0.25)))
            .with_node(Node { muted: true, ..diffuse("Muted") })
            .with_link("Rough", "Value", "Diffuse", "Roughness")
            .with_link("Muted", "BRDF", "Diffuse", "Color");
        let library = NodeLibrary::new().with_tree(tree);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        assert_eq!(fx.sink.contents(), "BRDFDiffuse Mat@Diffuse {\n\troughness=0.25;\n}\n\n");
    }

    #[test]
    fn test_missing_tree_and_cycle() {
        let tree = output_tree("Loop", "A", "BRDF")
            .with_node(
                Node::plugin("A", "BRDFDiffuse")
                    .with_input(Socket::new("Color").with_attr("color_tex"))
                    .with_output(Socket::new("BRDF")),
            )
            .with_link("A", "BRDF", "A", "Color");
        let library = NodeLibrary::new().with_tree(tree);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        assert!(resolver.resolve_output(&mut fx.env(&library), "Nope", "Material").unwrap().is_null());
        let value = resolver.resolve_output(&mut fx.env(&library), "Loop", "Material").unwrap();
        assert_eq!(value.text(), "Loop@A");
        assert_eq!(fx.sink.contents(), "BRDFDiffuse Loop@A {\n}\n\n");
    }

    #[test]
    fn test_reroute_loop_resolves_to_null() {
        let tree = output_tree("Mat", "R1", "Output")
            .with_node(Node::new("R1", NodeKind::Reroute, "Reroute").with_input(Socket::new("Input")))
            .with_node(Node::new("R2", NodeKind::Reroute, "Reroute").with_input(Socket::new("Input")))
            .with_link("R2", "Output", "R1", "Input")
            .with_link("R1", "Output", "R2", "Input");
        let library = NodeLibrary::new().with_tree(tree);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        let value = resolver.resolve_output(&mut fx.env(&library), "Mat", "Material").unwrap();
        assert!(value.is_null());
        assert_eq!(resolver.depth(), 0);
        assert!(fx.sink.contents().is_empty());
    }

    #[test]
    fn test_self_containing_group_resolves_to_null() {
        // Direct: `Self` instantiates itself.
        let direct = NodeTree::new("Self")
            .with_node(Node::new("GroupOut", NodeKind::GroupOutput, "GroupOutput").with_input(Socket::new("Shader")))
            .with_node(Node::group("Again", "Self").with_output(Socket::new("Shader")))
            .with_link("Again", "Shader", "GroupOut", "Shader");
        // Indirect: A -> B -> A.
        let hop = |name: &str, inner: &str| {
            NodeTree::new(name)
                .with_node(Node::new("GroupOut", NodeKind::GroupOutput, "GroupOutput").with_input(Socket::new("Shader")))
                .with_node(Node::group("Inner", inner).with_output(Socket::new("Shader")))
                .with_link("Inner", "Shader", "GroupOut", "Shader")
        };
        let library = NodeLibrary::new()
            .with_tree(output_tree("Direct", "G", "Shader").with_node(Node::group("G", "Self").with_output(Socket::new("Shader"))))
            .with_tree(output_tree("Indirect", "G", "Shader").with_node(Node::group("G", "A").with_output(Socket::new("Shader"))))
            .with_tree(direct)
            .with_tree(hop("A", "B"))
            .with_tree(hop("B", "A"));
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        for root in ["Direct", "Indirect"] {
            let value = resolver.resolve_output(&mut fx.env(&library), root, "Material").unwrap();
            assert!(value.is_null(), "{root}");
            assert_eq!(resolver.depth(), 0);
        }
        assert!(fx.sink.contents().is_empty());
    }

    #[test]
    fn test_group_input_loop_resolves_to_null() {
        // The group's input is fed by its own output.
        let pass = NodeTree::new("Pass")
            .with_node(Node::new("GroupIn", NodeKind::GroupInput, "GroupInput").with_output(Socket::new("Shader")))
            .with_node(Node::new("GroupOut", NodeKind::GroupOutput, "GroupOutput").with_input(Socket::new("Shader")))
            .with_link("GroupIn", "Shader", "GroupOut", "Shader");
        let root = output_tree("Root", "G", "Shader")
            .with_node(
                Node::group("G", "Pass")
                    .with_input(Socket::new("Shader"))
                    .with_output(Socket::new("Shader")),
            )
            .with_link("G", "Shader", "G", "Shader");
        let library = NodeLibrary::new().with_tree(root).with_tree(pass);
        let mut fx = Fixture::new();
        let mut resolver = NodeGraphResolver::new();

        let value = resolver.resolve_output(&mut fx.env(&library), "Root", "Material").unwrap();
        assert!(value.is_null());
        assert_eq!(resolver.depth(), 0);
    }
}
