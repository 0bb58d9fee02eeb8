//! Selection and scrolling over the flattened thread.
//!
//! The selection is tracked by comment id so it survives re-sorting, folding
//! and appended pages. The index is only a cache of where that id was last
//! seen, used as a fallback when the id leaves the view.

use chrono::Utc;
use ratatui::layout::Rect;

use super::render::row_lines;
use super::App;
use crate::api::CommentApi;
use crate::store::ThreadRow;

impl<A: CommentApi + 'static> App<A> {
    /// Pull the latest rows and status from the controller and re-resolve the selection
    pub(super) fn refresh_rows(&mut self) {
        self.rows = self.controller.flat_list();
        self.status = self.controller.status();
        self.notice = self.controller.notice(self.config.notice_ttl());

        if self.rows.is_empty() {
            self.selected_index = 0;
            self.selected_id = None;
            return;
        }

        let found = self
            .selected_id
            .as_deref()
            .and_then(|id| self.rows.iter().position(|r| r.item.id == id));
        self.selected_index = found.unwrap_or_else(|| self.selected_index.min(self.rows.len() - 1));
        self.selected_id = Some(self.rows[self.selected_index].item.id.clone());
    }

    pub(super) fn selected_row(&self) -> Option<&ThreadRow> {
        self.rows.get(self.selected_index)
    }

    fn select_index(&mut self, index: usize) {
        if self.rows.is_empty() {
            return;
        }
        self.selected_index = index.min(self.rows.len() - 1);
        self.selected_id = Some(self.rows[self.selected_index].item.id.clone());
        self.maybe_load_more();
    }

    pub(super) fn move_down(&mut self, n: usize) {
        self.select_index(self.selected_index.saturating_add(n));
    }

    pub(super) fn move_up(&mut self, n: usize) {
        self.select_index(self.selected_index.saturating_sub(n));
    }

    pub(super) fn go_top(&mut self) {
        self.select_index(0);
    }

    pub(super) fn go_bottom(&mut self) {
        self.select_index(self.rows.len().saturating_sub(1));
    }

    /// Fetch the next page once the last row is selected
    fn maybe_load_more(&mut self) {
        if !self.config.navigation.auto_load_more {
            return;
        }
        let at_end = self.selected_index + 1 == self.rows.len();
        if at_end && self.status.has_more && !self.status.loading_more {
            self.spawn_load_more();
        }
    }

    fn row_height(&self, row: &ThreadRow, width: usize) -> usize {
        row_lines(row, width, &self.style, false, Utc::now()).len()
    }

    /// Adjust `scroll` so the selected row is fully inside `area` when it fits
    pub(super) fn ensure_visible(&mut self, area: Rect) {
        let width = area.width as usize;
        let height = area.height as usize;

        if self.rows.is_empty() {
            self.scroll = 0;
            return;
        }
        if self.selected_index < self.scroll {
            self.scroll = self.selected_index;
            return;
        }

        let heights: Vec<usize> = self.rows[self.scroll..=self.selected_index]
            .iter()
            .map(|row| self.row_height(row, width))
            .collect();
        let mut used: usize = heights.iter().sum();
        let mut first = 0;
        while used > height && self.scroll + first < self.selected_index {
            used -= heights[first];
            first += 1;
        }
        self.scroll += first;
    }
}
