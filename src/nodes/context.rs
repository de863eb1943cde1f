//! Group nesting context and its scoped guards.
//!
//! Crossing a group boundary changes the context stack. [`ContextScope`]
//! makes the change for the lifetime of the guard and undoes it on drop, so
//! every exit path (including early returns and `?`) leaves the stack as it
//! was found.

use std::ops::{Deref, DerefMut};

/// One level of group nesting: the tree holding the group node, and the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextFrame {
    pub tree: String,
    pub group_node: String,
}

impl ContextFrame {
    pub fn new(tree: &str, group_node: &str) -> Self {
        Self { tree: tree.to_string(), group_node: group_node.to_string() }
    }
}

/// Anything that carries a group context stack.
pub trait ContextStack {
    fn push_frame(&mut self, frame: ContextFrame);
    fn pop_frame(&mut self) -> Option<ContextFrame>;
    fn depth(&self) -> usize;
}

/// Stack of entered groups, outermost first.
#[derive(Clone, Debug, Default)]
pub struct GraphContext {
    frames: Vec<ContextFrame>,
}

impl GraphContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[ContextFrame] {
        &self.frames
    }

    /// `tree@group|` for every entered group, outermost first.
    pub fn prefix(&self) -> String {
        self.frames
            .iter()
            .map(|f| format!("{}@{}|", f.tree, f.group_node))
            .collect()
    }
}

impl ContextStack for GraphContext {
    fn push_frame(&mut self, frame: ContextFrame) {
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) -> Option<ContextFrame> {
        self.frames.pop()
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

enum Restore {
    Pop,
    PushBack(ContextFrame),
    Done,
}

/// Guard over a context change; derefs to the guarded stack.
pub struct ContextScope<'s, S: ContextStack> {
    stack: &'s mut S,
    restore: Restore,
}

impl<'s, S: ContextStack> ContextScope<'s, S> {
    /// Enter a group: push `frame` now, pop it on drop.
    pub fn enter(stack: &'s mut S, frame: ContextFrame) -> Self {
        stack.push_frame(frame);
        Self { stack, restore: Restore::Pop }
    }

    /// Leave the innermost group: pop now, push the same frame back on drop.
    /// `None` when the stack is empty.
    pub fn leave(stack: &'s mut S) -> Option<(Self, ContextFrame)> {
        let frame = stack.pop_frame()?;
        let scope = Self { stack, restore: Restore::PushBack(frame.clone()) };
        Some((scope, frame))
    }
}

impl<S: ContextStack> Deref for ContextScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stack
    }
}

impl<S: ContextStack> DerefMut for ContextScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stack
    }
}

impl<S: ContextStack> Drop for ContextScope<'_, S> {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.restore, Restore::Done) {
            Restore::Pop => {
                self.stack.pop_frame();
            }
            Restore::PushBack(frame) => self.stack.push_frame(frame),
            Restore::Done => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(ctx: &mut GraphContext, levels: usize, fail_at: usize) -> Result<usize, String> {
        if levels == 0 {
            return Ok(ctx.depth());
        }
        let mut scope = ContextScope::enter(ctx, ContextFrame::new("T", &format!("G{}", levels)));
        if scope.depth() == fail_at {
            return Err("missing output".into());
        }
        nested(&mut scope, levels - 1, fail_at)
    }

    #[test]
    fn test_enter_balanced_on_error() {
        let mut ctx = GraphContext::new();
        assert_eq!(nested(&mut ctx, 3, 99), Ok(3));
        assert_eq!(ctx.depth(), 0);
        assert!(nested(&mut ctx, 3, 3).is_err());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_leave_restores_frame() {
        let mut ctx = GraphContext::new();
        ctx.push_frame(ContextFrame::new("Root", "G1"));
        ctx.push_frame(ContextFrame::new("Inner", "G2"));
        {
            let (scope, frame) = ContextScope::leave(&mut ctx).unwrap();
            assert_eq!(frame, ContextFrame::new("Inner", "G2"));
            assert_eq!(scope.depth(), 1);
            assert_eq!(scope.prefix(), "Root@G1|");
        }
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.frames()[1].group_node, "G2");
        assert_eq!(ctx.prefix(), "Root@G1|Inner@G2|");
    }

    #[test]
    fn test_leave_empty() {
        let mut ctx = GraphContext::new();
        assert!(ContextScope::leave(&mut ctx).is_none());
        assert_eq!(ctx.depth(), 0);
    }
}
