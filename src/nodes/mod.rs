//! Node graphs and their resolution into plugins.
//!
//! This module provides:
//! - [`NodeTree`] / [`NodeLibrary`] - Graph model
//! - [`GraphContext`] / [`ContextScope`] - Group nesting and its guards
//! - [`HandlerRegistry`] / [`NodeHandler`] - Per node-type strategies
//! - [`NodeGraphResolver`] - Socket resolution with memoized plugin names

mod context;
mod graph;
mod handlers;
mod resolver;

pub use context::{ContextFrame, ContextScope, ContextStack, GraphContext};
pub use graph::{Link, Node, NodeKind, NodeLibrary, NodeTree, Socket};
pub use handlers::{HandlerRegistry, NodeHandler, PluginHandler, SwitchHandler, ValueHandler, SWITCH, VALUE};
pub use resolver::{GraphEnv, NodeGraphResolver};
