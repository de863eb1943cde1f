//! Node graph model: trees of typed nodes joined by socket links.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scene::{PropValue, PropertyBag};

/// Structural role of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Produces a plugin or a value through its handler.
    #[default]
    Plugin,
    /// Instantiates another tree.
    Group,
    /// Input collector inside a group tree.
    GroupInput,
    /// Output collector inside a group tree.
    GroupOutput,
    /// Pass-through relay.
    Reroute,
    /// Output collector of a top-level tree (material, world).
    Output,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    pub name: String,
    /// Plugin attribute fed by this socket; the socket name when unset.
    #[serde(default)]
    pub attr: Option<String>,
    /// Literal used when the socket is not linked.
    #[serde(default)]
    pub value: Option<PropValue>,
    /// Output role: references through this socket become `plugin::role`.
    #[serde(default)]
    pub role: Option<String>,
}

impl Socket {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_value(mut self, value: PropValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_attr(mut self, attr: &str) -> Self {
        self.attr = Some(attr.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    #[inline]
    pub fn attr_name(&self) -> &str {
        self.attr.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub kind: NodeKind,
    /// Handler tag; the plugin id for plugin nodes.
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Tree instantiated by a group node.
    #[serde(default)]
    pub tree: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Socket>,
    #[serde(default)]
    pub outputs: Vec<Socket>,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub muted: bool,
}

impl Node {
    pub fn new(name: &str, kind: NodeKind, node_type: &str) -> Self {
        Self { name: name.to_string(), kind, node_type: node_type.to_string(), ..Default::default() }
    }

    /// Plugin node of the given plugin id.
    pub fn plugin(name: &str, plugin_id: &str) -> Self {
        Self::new(name, NodeKind::Plugin, plugin_id)
    }

    /// Group node instantiating `tree`.
    pub fn group(name: &str, tree: &str) -> Self {
        let mut node = Self::new(name, NodeKind::Group, "Group");
        node.tree = Some(tree.to_string());
        node
    }

    pub fn with_input(mut self, socket: Socket) -> Self {
        self.inputs.push(socket);
        self
    }

    pub fn with_output(mut self, socket: Socket) -> Self {
        self.outputs.push(socket);
        self
    }

    pub fn with_property(mut self, name: &str, value: PropValue) -> Self {
        self.properties.insert(name, value);
        self
    }

    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from_node: String,
    pub from_socket: String,
    pub to_node: String,
    pub to_socket: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    /// Filled from the library key when loaded from JSON.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl NodeTree {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Link `from.from_socket` into `to.to_socket`.
    pub fn with_link(mut self, from: &str, from_socket: &str, to: &str, to_socket: &str) -> Self {
        self.links.push(Link {
            from_node: from.to_string(),
            from_socket: from_socket.to_string(),
            to_node: to.to_string(),
            to_socket: to_socket.to_string(),
        });
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// The link feeding input `socket` of `node`.
    pub fn link_into(&self, node: &str, socket: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.to_node == node && l.to_socket == socket)
    }

    pub fn is_linked(&self, node: &str, socket: &str) -> bool {
        self.link_into(node, socket).is_some()
    }

    /// First node of `kind`.
    pub fn find_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == kind)
    }
}

/// All node trees of a scene, by name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, NodeTree>")]
pub struct NodeLibrary {
    trees: BTreeMap<String, NodeTree>,
}

impl From<BTreeMap<String, NodeTree>> for NodeLibrary {
    fn from(trees: BTreeMap<String, NodeTree>) -> Self {
        let mut library = Self::default();
        for (name, mut tree) in trees {
            tree.name = name;
            library.insert(tree);
        }
        library
    }
}

impl NodeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tree: NodeTree) {
        self.trees.insert(tree.name.clone(), tree);
    }

    pub fn with_tree(mut self, tree: NodeTree) -> Self {
        self.insert(tree);
        self
    }

    pub fn tree(&self, name: &str) -> Option<&NodeTree> {
        self.trees.get(name)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_from_json() {
        let library: NodeLibrary = serde_json::from_str(
            r#"{
                "Mat": {
                    "nodes": [
                        {"name": "Out", "kind": "output", "inputs": [{"name": "Material"}]},
                        {"name": "Brdf", "type": "BRDFDiffuse",
                         "inputs": [{"name": "Color", "attr": "color_tex", "value": [1, 0, 0]}],
                         "outputs": [{"name": "BRDF"}]}
                    ],
                    "links": [{"from_node": "Brdf", "from_socket": "BRDF", "to_node": "Out", "to_socket": "Material"}]
                }
            }"#,
        )
        .unwrap();
        let tree = library.tree("Mat").unwrap();
        assert_eq!(tree.name, "Mat");
        assert_eq!(tree.find_kind(NodeKind::Output).unwrap().name, "Out");
        assert!(tree.is_linked("Out", "Material"));
        let brdf = tree.node("Brdf").unwrap();
        assert_eq!(brdf.kind, NodeKind::Plugin);
        assert_eq!(brdf.input("Color").unwrap().attr_name(), "color_tex");
    }
}
