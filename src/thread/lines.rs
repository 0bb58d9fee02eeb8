//! Thread-connector reconstruction over already-flattened rows.

use super::{FlatItem, LineState};

/// Fill `line_states` for every row in a single forward pass.
///
/// Only the previous row's bottom flags are carried, one per column.
pub fn compute_line_states(items: &mut [FlatItem]) {
    let mut prev_bottoms: Vec<bool> = Vec::new();

    for item in items.iter_mut() {
        let columns = item.visual_depth;
        let has_children = item.has_visible_children();
        let mut states = Vec::with_capacity(columns);
        let mut bottoms = Vec::with_capacity(columns);

        for p in 0..columns {
            let own_column = p + 1 == columns;
            let top = prev_bottoms.get(p).copied().unwrap_or(false);
            let bottom = if own_column {
                has_children
            } else {
                item.active_lines.get(p).copied().unwrap_or(false) || has_children
            };

            states.push(match (top, bottom) {
                (true, true) => LineState::Full,
                (false, true) => LineState::Start,
                (true, false) => LineState::End,
                (false, false) if own_column => LineState::Stub,
                (false, false) => LineState::None,
            });
            bottoms.push(bottom);
        }

        item.line_states = states;
        prev_bottoms = bottoms;
    }
}
