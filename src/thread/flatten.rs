//! Pre-order flattening of a sorted forest into rows.

use std::collections::HashSet;

use super::tree::TreeNode;
use super::{FlatItem, MAX_VISUAL_DEPTH};

/// Flatten the forest, skipping the subtrees of collapsed comments
pub fn flatten(nodes: &[TreeNode<'_>], collapsed: &HashSet<String>) -> Vec<FlatItem> {
    let mut items = Vec::new();
    let mut has_next = Vec::new();
    flatten_recursive(nodes, 0, collapsed, &mut has_next, &mut items);
    items
}

fn flatten_recursive(
    nodes: &[TreeNode<'_>],
    depth: usize,
    collapsed: &HashSet<String>,
    has_next: &mut Vec<bool>,
    items: &mut Vec<FlatItem>,
) {
    let len = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        has_next.truncate(depth);
        has_next.push(i + 1 < len);

        let visual_depth = depth.min(MAX_VISUAL_DEPTH);
        let is_collapsed = collapsed.contains(&node.comment.id);

        items.push(FlatItem {
            id: node.comment.id.clone(),
            depth,
            visual_depth,
            is_collapsed,
            collapsed_count: if is_collapsed {
                node.descendant_count()
            } else {
                0
            },
            child_count: node.children.len(),
            active_lines: active_lines(has_next, depth, visual_depth),
            line_states: Vec::new(),
        });

        if !is_collapsed {
            flatten_recursive(&node.children, depth + 1, collapsed, has_next, items);
        }
    }
    has_next.truncate(depth);
}

/// Column `p` stays lit while any depth in `p+1..=depth` has a pending sibling
fn active_lines(has_next: &[bool], depth: usize, visual_depth: usize) -> Vec<bool> {
    let columns = visual_depth.saturating_sub(1);
    let mut lines = vec![false; columns];
    let mut pending = false;
    for d in (1..=depth).rev() {
        pending |= has_next[d];
        if d - 1 < columns {
            lines[d - 1] = pending;
        }
    }
    lines
}
