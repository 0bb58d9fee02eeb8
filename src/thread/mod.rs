//! Comment-thread engine: flat comments in, render rows out.
//!
//! The pipeline is `build_forest` -> `sort_forest` -> `flatten` ->
//! `compute_line_states`. Every stage is pure; callers rebuild the whole view
//! whenever the comment set, the sort mode or the collapsed set changes.

use std::collections::HashSet;

use crate::types::{Comment, SortMode};

mod flatten;
mod lines;
mod sort;
mod tree;

pub use flatten::flatten;
pub use lines::compute_line_states;
pub use sort::sort_forest;
pub use tree::{build_forest, TreeNode};

/// Indentation stops growing past this depth
pub const MAX_VISUAL_DEPTH: usize = 5;

/// How one connector column is drawn on a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Line enters from above and continues below
    Full,
    /// Line begins on this row and continues below
    Start,
    /// Line enters from above and stops on this row
    End,
    /// Isolated tick on the row's own column
    Stub,
    /// Nothing drawn
    None,
}

impl LineState {
    /// Whether the line continues into the next row
    pub fn continues(&self) -> bool {
        matches!(self, LineState::Full | LineState::Start)
    }
}

/// A flattened row of the thread, before live comment fields are merged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub id: String,
    /// True nesting depth (roots are 0)
    pub depth: usize,
    /// `depth` capped at `MAX_VISUAL_DEPTH`
    pub visual_depth: usize,
    pub is_collapsed: bool,
    /// Total hidden descendants, only non-zero on collapsed rows
    pub collapsed_count: usize,
    /// Direct replies, hidden or not
    pub child_count: usize,
    /// Per ancestor column, whether the connector continues through this row
    pub active_lines: Vec<bool>,
    /// Filled in by `compute_line_states`, one entry per visual column
    pub line_states: Vec<LineState>,
}

impl FlatItem {
    /// Replies are rendered directly below this row
    pub fn has_visible_children(&self) -> bool {
        !self.is_collapsed && self.child_count > 0
    }
}

/// Run the full pipeline over the current comment set
pub fn build_view(
    comments: &[Comment],
    sort: SortMode,
    collapsed: &HashSet<String>,
) -> Vec<FlatItem> {
    let mut forest = build_forest(comments);
    sort_forest(&mut forest, sort);
    let mut items = flatten(&forest, collapsed);
    compute_line_states(&mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{comment, voted};

    fn ids(items: &[FlatItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    fn sample_thread() -> Vec<Comment> {
        vec![
            voted("r1", None, 1, 0),
            voted("r2", None, 5, 0),
            voted("c1", Some("r1"), 0, 2),
            voted("c2", Some("r1"), 3, 0),
            voted("c3", Some("c2"), 1, 1),
            voted("c4", Some("r2"), 2, 2),
            voted("c5", Some("missing"), 0, 0),
        ]
    }

    #[test]
    fn test_every_sort_mode_yields_one_row_per_comment() {
        let comments = sample_thread();
        for mode in SortMode::ALL {
            let items = build_view(&comments, mode, &HashSet::new());
            assert_eq!(items.len(), comments.len(), "mode {}", mode);
            let mut seen: Vec<_> = ids(&items);
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), comments.len(), "mode {}", mode);
        }
    }

    #[test]
    fn test_best_orders_roots_and_replies() {
        let items = build_view(&sample_thread(), SortMode::Best, &HashSet::new());
        assert_eq!(ids(&items), vec!["r2", "c4", "r1", "c2", "c3", "c1", "c5"]);
    }

    #[test]
    fn test_collapse_and_expand_round_trip() {
        let comments = vec![comment("r1", None, 0), comment("c1", Some("r1"), 1)];
        let expanded = build_view(&comments, SortMode::Best, &HashSet::new());
        assert_eq!(expanded.len(), 2);

        let collapsed: HashSet<String> = ["r1".to_string()].into_iter().collect();
        let folded = build_view(&comments, SortMode::Best, &collapsed);
        assert_eq!(folded.len(), 1);
        assert!(folded[0].is_collapsed);
        assert_eq!(folded[0].collapsed_count, 1);

        let again = build_view(&comments, SortMode::Best, &HashSet::new());
        assert_eq!(ids(&again), ids(&expanded));
    }

    #[test]
    fn test_line_states_are_filled() {
        let items = build_view(&sample_thread(), SortMode::Best, &HashSet::new());
        for item in &items {
            assert_eq!(item.line_states.len(), item.visual_depth);
            assert_eq!(item.active_lines.len(), item.visual_depth.saturating_sub(1));
        }
    }
}
