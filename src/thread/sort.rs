//! Per-level ordering of the reply forest.

use std::cmp::Ordering;

use super::tree::TreeNode;
use crate::types::{Comment, SortMode};

/// Rewards many votes split evenly between up and down
pub fn controversy(up: i64, down: i64) -> f64 {
    if up <= 0 || down <= 0 {
        return 0.0;
    }
    let (low, high) = if up < down { (up, down) } else { (down, up) };
    (up + down) as f64 * (low as f64 / high as f64)
}

/// Descending order for `mode`; equal keys compare equal so sorting stays stable
fn compare(mode: SortMode, a: &Comment, b: &Comment) -> Ordering {
    match mode {
        SortMode::Best => b.score.cmp(&a.score),
        SortMode::New => b.created_time.cmp(&a.created_time),
        SortMode::Top => b.net_votes().cmp(&a.net_votes()),
        SortMode::Controversial => {
            let a_key = controversy(a.upvote_count, a.downvote_count);
            let b_key = controversy(b.upvote_count, b.downvote_count);
            b_key.total_cmp(&a_key)
        }
    }
}

/// Sort every sibling list in the forest, at every depth
pub fn sort_forest(nodes: &mut [TreeNode<'_>], mode: SortMode) {
    nodes.sort_by(|a, b| compare(mode, a.comment, b.comment));

    for node in nodes.iter_mut() {
        sort_forest(&mut node.children, mode);
    }
}
