//! Forest construction from parent references.

use std::collections::HashMap;

use crate::types::Comment;

/// A comment and the replies nested under it
#[derive(Debug, Clone)]
pub struct TreeNode<'a> {
    pub comment: &'a Comment,
    pub children: Vec<TreeNode<'a>>,
}

impl<'a> TreeNode<'a> {
    /// Number of nodes below this one, at any depth
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Build the reply forest from a flat comment list.
///
/// Comments whose parent is not in `comments` become roots. Siblings keep
/// their input order. Comments caught in a parent cycle are unreachable from
/// any root and are left out.
pub fn build_forest(comments: &[Comment]) -> Vec<TreeNode<'_>> {
    let by_id: HashMap<&str, usize> = comments
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.id.as_str(), idx))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();

    for (idx, comment) in comments.iter().enumerate() {
        match comment
            .parent_comment_id
            .as_deref()
            .and_then(|parent| by_id.get(parent))
        {
            Some(&parent_idx) => children[parent_idx].push(idx),
            None => roots.push(idx),
        }
    }

    roots
        .into_iter()
        .map(|idx| materialize(comments, &children, idx))
        .collect()
}

fn materialize<'a>(comments: &'a [Comment], children: &[Vec<usize>], idx: usize) -> TreeNode<'a> {
    TreeNode {
        comment: &comments[idx],
        children: children[idx]
            .iter()
            .map(|&child| materialize(comments, children, child))
            .collect(),
    }
}
