//! Focus detection — pre-order walk of the window forest.
//!
//! Resolves which view, if any, has input focus in a view snapshot.
//! Traversal is in document order: window index ascending, then depth
//! first with children in index order.

use crate::view::{FillContext, ViewNode, WindowNode};

/// Pre-order iterator over a window forest.
///
/// Walks with an explicit stack, so tree depth is bounded by heap, not by
/// the call stack.
pub struct PreOrder<'a> {
    stack: Vec<&'a ViewNode>,
}

impl<'a> PreOrder<'a> {
    pub fn new(windows: &'a [WindowNode]) -> Self {
        Self {
            stack: windows.iter().rev().map(|w| &w.root).collect(),
        }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a ViewNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Flatten the forest into document order.
pub fn collect_nodes(windows: &[WindowNode]) -> Vec<&ViewNode> {
    PreOrder::new(windows).collect()
}

/// Return the first focused node in document order.
///
/// If several nodes are marked focused (malformed snapshot) the earliest
/// one wins. Returns `None` for an empty forest or when nothing is focused.
pub fn resolve(windows: &[WindowNode]) -> Option<&ViewNode> {
    PreOrder::new(windows).find(|node| node.focused)
}

/// Resolve focus in the most recent fill context only.
pub fn resolve_latest(contexts: &[FillContext]) -> Option<&ViewNode> {
    contexts.last().and_then(|ctx| resolve(&ctx.windows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(root: ViewNode) -> WindowNode {
        WindowNode { root }
    }

    #[test]
    fn empty_forest_has_no_focus() {
        assert!(resolve(&[]).is_none());
    }

    #[test]
    fn unfocused_forest_has_no_focus() {
        let forest = vec![
            window(ViewNode::new("r0").with_child(ViewNode::new("a"))),
            window(ViewNode::new("r1")),
        ];
        assert!(resolve(&forest).is_none());
    }

    #[test]
    fn single_focused_deep_node() {
        let deep = ViewNode::new("c").focused(true);
        let forest = vec![
            window(ViewNode::new("r0")),
            window(
                ViewNode::new("r1")
                    .with_child(ViewNode::new("a"))
                    .with_child(ViewNode::new("b").with_child(deep)),
            ),
        ];
        assert_eq!(resolve(&forest).map(|n| n.id.as_str()), Some("c"));
    }

    #[test]
    fn earlier_window_wins_over_later_root() {
        // window0 root has a focused child; window1 root is itself focused.
        let forest = vec![
            window(ViewNode::new("r0").with_child(ViewNode::new("A").focused(true))),
            window(ViewNode::new("r1").focused(true)),
        ];
        assert_eq!(resolve(&forest).map(|n| n.id.as_str()), Some("A"));
    }

    #[test]
    fn preorder_parent_before_child() {
        let forest = vec![window(
            ViewNode::new("p")
                .focused(true)
                .with_child(ViewNode::new("c").focused(true)),
        )];
        assert_eq!(resolve(&forest).map(|n| n.id.as_str()), Some("p"));
    }

    #[test]
    fn preorder_subtree_before_next_sibling() {
        let forest = vec![window(
            ViewNode::new("r")
                .with_child(ViewNode::new("a").with_child(ViewNode::new("a1").focused(true)))
                .with_child(ViewNode::new("b").focused(true)),
        )];
        assert_eq!(resolve(&forest).map(|n| n.id.as_str()), Some("a1"));
    }

    #[test]
    fn resolve_agrees_with_collected_order() {
        let forest = vec![
            window(
                ViewNode::new("r0")
                    .with_child(ViewNode::new("x").with_child(ViewNode::new("y").focused(true))),
            ),
            window(ViewNode::new("r1").with_child(ViewNode::new("z").focused(true))),
        ];
        let ids: Vec<_> = collect_nodes(&forest).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["r0", "x", "y", "r1", "z"]);

        let first = collect_nodes(&forest).into_iter().find(|n| n.focused);
        assert_eq!(resolve(&forest), first);
    }

    #[test]
    fn latest_context_is_used() {
        let contexts = vec![
            FillContext::new([ViewNode::new("old").focused(true)]),
            FillContext::new([ViewNode::new("root").with_child(ViewNode::new("new").focused(true))]),
        ];
        assert_eq!(resolve_latest(&contexts).map(|n| n.id.as_str()), Some("new"));
    }

    #[test]
    fn latest_context_without_focus_ignores_history() {
        let contexts = vec![
            FillContext::new([ViewNode::new("old").focused(true)]),
            FillContext::new([ViewNode::new("root")]),
        ];
        assert!(resolve_latest(&contexts).is_none());
    }

    #[test]
    fn very_deep_tree() {
        let depth = 200_000;
        let mut node = ViewNode::new("leaf").focused(true);
        for i in 0..depth {
            node = ViewNode::new(format!("n{i}")).with_child(node);
        }
        let forest = vec![window(node)];

        assert_eq!(resolve(&forest).map(|n| n.id.as_str()), Some("leaf"));
        assert_eq!(collect_nodes(&forest).len(), depth + 1);
    }

    #[test]
    fn no_contexts() {
        assert!(resolve_latest(&[]).is_none());
    }
}
