//! Per-discussion comment state and the memoized thread view.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::thread::{build_view, FlatItem};
use crate::types::{Comment, CommentPage, SortMode, VoteResponse, VoteType};
use crate::vote;

/// A render row: flattened layout plus the live comment record
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub item: FlatItem,
    pub comment: Comment,
}

/// Transient message shown to the user after a failed background action
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
}

/// Pre-mutation copy of one comment, restored when a remote call fails
#[derive(Debug, Clone)]
pub struct Snapshot(Comment);

/// A claimed page request, tied to the fetch whose cursor it continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: String,
    pub generation: u64,
}

struct CachedView {
    version: u64,
    items: Vec<FlatItem>,
    positions: HashMap<String, usize>,
}

/// Everything known about one discussion.
///
/// Field mutations (votes, role toggles) leave the cached view alone so rows do
/// not move while being read. Structural changes bump `structure_version`, and
/// the next read rebuilds the view from scratch.
pub struct CommentStore {
    comments: Vec<Comment>,
    sort: SortMode,
    collapsed: HashSet<String>,
    cursor: Option<String>,
    has_more: bool,
    total_root_count: usize,
    loading: bool,
    loading_more: bool,
    error: Option<String>,
    notice: Option<Notice>,
    fetch_generation: u64,
    structure_version: u64,
    view: Option<CachedView>,
}

impl CommentStore {
    pub fn new(sort: SortMode) -> Self {
        Self {
            comments: Vec::new(),
            sort,
            collapsed: HashSet::new(),
            cursor: None,
            has_more: false,
            total_root_count: 0,
            loading: false,
            loading_more: false,
            error: None,
            notice: None,
            fetch_generation: 0,
            structure_version: 0,
            view: None,
        }
    }

    fn mark_structural_change(&mut self) {
        self.structure_version += 1;
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        match &self.view {
            Some(view) if view.version == self.structure_version => {
                view.positions.get(id).copied()
            }
            _ => self.comments.iter().position(|c| c.id == id),
        }
    }

    fn refresh_view(&mut self) {
        let fresh = self
            .view
            .as_ref()
            .is_some_and(|view| view.version == self.structure_version);
        if fresh {
            return;
        }

        let items = build_view(&self.comments, self.sort, &self.collapsed);
        let positions = self
            .comments
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.id.clone(), idx))
            .collect();
        debug!(
            version = self.structure_version,
            rows = items.len(),
            sort = %self.sort,
            "rebuilt thread view"
        );
        self.view = Some(CachedView {
            version: self.structure_version,
            items,
            positions,
        });
    }

    /// Render rows, merging the cached layout with current comment fields
    pub fn flat_list(&mut self) -> Vec<ThreadRow> {
        self.refresh_view();
        let Some(view) = &self.view else {
            return Vec::new();
        };

        view.items
            .iter()
            .filter_map(|item| {
                let idx = view.positions.get(&item.id)?;
                Some(ThreadRow {
                    item: item.clone(),
                    comment: self.comments.get(*idx)?.clone(),
                })
            })
            .collect()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.position_of(id).and_then(|idx| self.comments.get(idx))
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        if self.sort != sort {
            self.sort = sort;
            self.mark_structural_change();
        }
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed.contains(id)
    }

    pub fn toggle_collapse(&mut self, id: &str) {
        if !self.collapsed.remove(id) {
            self.collapsed.insert(id.to_string());
        }
        self.mark_structural_change();
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn total_root_count(&self) -> usize {
        self.total_root_count
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Start a full fetch; any page request still in flight becomes stale
    pub fn begin_fetch(&mut self) {
        self.loading = true;
        self.loading_more = false;
        self.error = None;
        self.fetch_generation += 1;
    }

    /// Replace the whole collection, or keep it and record the error
    pub fn finish_fetch(&mut self, result: Result<CommentPage, String>) {
        self.loading = false;
        match result {
            Ok(page) => {
                let roots = page.comments.iter().filter(|c| c.is_root()).count();
                self.total_root_count = page.total_root_count.unwrap_or(roots);
                self.comments = page.comments;
                self.cursor = page.next_cursor;
                self.has_more = page.has_more;
                self.error = None;
                self.mark_structural_change();
            }
            Err(e) => {
                self.error = Some(e);
            }
        }
    }

    /// Claim the next page, or `None` when nothing should be requested
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if !self.has_more || self.loading_more {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.loading_more = true;
        Some(PageRequest {
            cursor,
            generation: self.fetch_generation,
        })
    }

    /// Apply a page, unless a fetch started after it was requested
    pub fn finish_load_more(&mut self, generation: u64, result: Result<CommentPage, String>) {
        if generation != self.fetch_generation {
            debug!(
                generation,
                current = self.fetch_generation,
                "dropping page from a replaced fetch"
            );
            return;
        }
        self.loading_more = false;
        match result {
            Ok(page) => {
                let known: HashSet<&str> = self.comments.iter().map(|c| c.id.as_str()).collect();
                let fresh: Vec<Comment> = page
                    .comments
                    .into_iter()
                    .filter(|c| !known.contains(c.id.as_str()))
                    .collect();
                debug!(appended = fresh.len(), "appending comment page");

                self.comments.extend(fresh);
                self.cursor = page.next_cursor;
                self.has_more = page.has_more;
                if let Some(total) = page.total_root_count {
                    self.total_root_count = total;
                }
                self.mark_structural_change();
            }
            Err(e) => {
                self.error = Some(e);
            }
        }
    }

    /// Add a comment the server just created
    pub fn append_created(&mut self, comment: Comment) {
        if comment.is_root() {
            self.total_root_count += 1;
        }
        self.comments.push(comment);
        self.mark_structural_change();
    }

    // ------------------------------------------------------------------
    // Field mutations
    // ------------------------------------------------------------------

    fn comment_mut(&mut self, id: &str) -> Option<&mut Comment> {
        let idx = self.position_of(id)?;
        self.comments.get_mut(idx)
    }

    /// Apply a vote locally, returning what to restore if the server rejects it
    pub fn apply_vote(
        &mut self,
        id: &str,
        vote_type: VoteType,
        reason: Option<String>,
    ) -> Option<Snapshot> {
        let comment = self.comment_mut(id)?;
        let snapshot = Snapshot(comment.clone());
        vote::apply_vote(comment, vote_type, reason);
        Some(snapshot)
    }

    pub fn reconcile_vote(&mut self, id: &str, response: &VoteResponse) {
        if let Some(comment) = self.comment_mut(id) {
            vote::reconcile(comment, response);
        }
    }

    /// Show or hide the author's role label locally
    pub fn set_role_visibility(&mut self, id: &str, show: bool) -> Option<Snapshot> {
        let comment = self.comment_mut(id)?;
        let snapshot = Snapshot(comment.clone());
        comment.show_creator_role = show;
        Some(snapshot)
    }

    /// Put a comment back exactly as it was before an optimistic change
    pub fn restore(&mut self, snapshot: Snapshot) {
        let Snapshot(original) = snapshot;
        if let Some(comment) = self.comment_mut(&original.id) {
            *comment = original;
        }
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    pub fn raise_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            message: message.into(),
            raised_at: Instant::now(),
        });
    }

    /// The latest notice, if it was raised less than `ttl` ago
    pub fn notice(&self, ttl: Duration) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| n.raised_at.elapsed() < ttl)
            .map(|n| n.message.as_str())
    }
}
