//! Orchestrates backend calls against the shared comment store.
//!
//! Every async operation locks the store only around its synchronous steps and
//! never across an await. After each await the liveness flag is checked, so a
//! controller that has been shut down drops late results on the floor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};

use crate::api::CommentApi;
use crate::store::{CommentStore, ThreadRow};
use crate::types::{Comment, CommentPatch, NewComment, SortMode, VoteRequest, VoteType};

/// Point-in-time status for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStatus {
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<String>,
    pub has_more: bool,
    pub total_root_count: usize,
    pub comment_count: usize,
    pub sort: SortMode,
}

/// Handle to one discussion. Clones share the same store and liveness flag.
pub struct ThreadController<A> {
    api: Arc<A>,
    thread_id: Arc<str>,
    store: Arc<Mutex<CommentStore>>,
    alive: Arc<AtomicBool>,
}

impl<A> Clone for ThreadController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            thread_id: Arc::clone(&self.thread_id),
            store: Arc::clone(&self.store),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<A: CommentApi> ThreadController<A> {
    pub fn new(api: Arc<A>, thread_id: &str, sort: SortMode) -> Self {
        Self {
            api,
            thread_id: Arc::from(thread_id),
            store: Arc::new(Mutex::new(CommentStore::new(sort))),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CommentStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down: results of requests still in flight will be discarded
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn discard_if_dead(&self, operation: &str) -> bool {
        if self.is_alive() {
            return false;
        }
        debug!(thread = %self.thread_id, operation, "controller shut down, discarding result");
        true
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn flat_list(&self) -> Vec<ThreadRow> {
        self.lock().flat_list()
    }

    pub fn status(&self) -> ThreadStatus {
        let store = self.lock();
        ThreadStatus {
            loading: store.loading(),
            loading_more: store.loading_more(),
            error: store.error().map(str::to_string),
            has_more: store.has_more(),
            total_root_count: store.total_root_count(),
            comment_count: store.comment_count(),
            sort: store.sort(),
        }
    }

    pub fn loading(&self) -> bool {
        self.lock().loading()
    }

    pub fn loading_more(&self) -> bool {
        self.lock().loading_more()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error().map(str::to_string)
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more()
    }

    pub fn total_root_count(&self) -> usize {
        self.lock().total_root_count()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comment_count()
    }

    pub fn sort(&self) -> SortMode {
        self.lock().sort()
    }

    pub fn comment(&self, id: &str) -> Option<Comment> {
        self.lock().comment(id).cloned()
    }

    /// Most recent transient notice still younger than `ttl`
    pub fn notice(&self, ttl: Duration) -> Option<String> {
        self.lock().notice(ttl).map(str::to_string)
    }

    // ------------------------------------------------------------------
    // Synchronous structural changes
    // ------------------------------------------------------------------

    pub fn set_sort(&self, sort: SortMode) {
        debug!(%sort, "sort changed");
        self.lock().set_sort(sort);
    }

    pub fn toggle_collapse(&self, id: &str) {
        self.lock().toggle_collapse(id);
    }

    // ------------------------------------------------------------------
    // Async operations
    // ------------------------------------------------------------------

    /// Initial fetch: replaces the whole collection on success
    pub async fn refetch(&self) -> Result<()> {
        self.lock().begin_fetch();
        info!(thread = %self.thread_id, "fetching comments");

        let result = self.api.fetch_comments(&self.thread_id, None).await;
        if self.discard_if_dead("fetch") {
            return Ok(());
        }

        match result {
            Ok(response) => {
                let page = response.into_page();
                info!(
                    thread = %self.thread_id,
                    comments = page.comments.len(),
                    has_more = page.has_more,
                    "comments fetched"
                );
                self.lock().finish_fetch(Ok(page));
                Ok(())
            }
            Err(e) => {
                warn!(thread = %self.thread_id, error = %e, "fetch failed");
                self.lock().finish_fetch(Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Fetch the next page. Returns `false` when no request was issued.
    pub async fn load_more(&self) -> Result<bool> {
        let Some(request) = self.lock().begin_load_more() else {
            debug!("load_more skipped");
            return Ok(false);
        };
        let cursor = request.cursor.as_str();
        debug!(cursor, generation = request.generation, "loading next page");

        let result = self.api.fetch_comments(&self.thread_id, Some(cursor)).await;
        if self.discard_if_dead("load_more") {
            return Ok(true);
        }

        match result {
            Ok(response) => {
                self.lock()
                    .finish_load_more(request.generation, Ok(response.into_page()));
                Ok(true)
            }
            Err(e) => {
                warn!(cursor, error = %e, "page fetch failed");
                self.lock()
                    .finish_load_more(request.generation, Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Optimistically vote, then reconcile with the server or roll back
    pub async fn handle_vote(
        &self,
        id: &str,
        vote_type: VoteType,
        reason: Option<String>,
    ) -> Result<()> {
        let reason = match vote_type {
            VoteType::Downvote => reason.filter(|r| !r.trim().is_empty()),
            VoteType::Upvote => None,
        };
        let snapshot = self
            .lock()
            .apply_vote(id, vote_type, reason.clone())
            .ok_or_else(|| anyhow!("Comment {} is not loaded", id))?;
        debug!(comment = id, vote = vote_type.label(), "vote applied locally");

        let request = VoteRequest {
            vote_type,
            downvote_reason: reason,
        };
        let result = self.api.vote_on_comment(id, &request).await;
        if self.discard_if_dead("vote") {
            return Ok(());
        }

        let mut store = self.lock();
        match result {
            Ok(response) => {
                store.reconcile_vote(id, &response);
                debug!(comment = id, "vote reconciled");
                Ok(())
            }
            Err(e) => {
                warn!(comment = id, error = %e, "vote failed, rolling back");
                store.restore(snapshot);
                store.raise_notice(format!("Vote failed: {}", e));
                Err(e)
            }
        }
    }

    /// Show or hide the author's role label, rolling back on failure
    pub async fn handle_toggle_role(&self, id: &str, show: bool) -> Result<()> {
        let snapshot = self
            .lock()
            .set_role_visibility(id, show)
            .ok_or_else(|| anyhow!("Comment {} is not loaded", id))?;

        let patch = CommentPatch {
            show_creator_role: show,
        };
        let result = self.api.patch_comment(id, &patch).await;
        if self.discard_if_dead("toggle_role") {
            return Ok(());
        }

        if let Err(e) = result {
            warn!(comment = id, error = %e, "role toggle failed, rolling back");
            let mut store = self.lock();
            store.restore(snapshot);
            store.raise_notice(format!("Could not update role label: {}", e));
            return Err(e);
        }
        Ok(())
    }

    /// Create a comment or reply; the store only changes once the server accepts it
    pub async fn handle_create_comment(&self, body: &str, parent_id: Option<&str>) -> Result<Comment> {
        if body.trim().is_empty() {
            bail!("Comment body is empty");
        }

        let new_comment = NewComment {
            body: body.to_string(),
            parent_comment_id: parent_id.map(str::to_string),
        };
        let created = self
            .api
            .create_comment(&self.thread_id, &new_comment)
            .await?;
        if self.discard_if_dead("create") {
            return Ok(created);
        }

        info!(comment = %created.id, parent = ?created.parent_comment_id, "comment created");
        self.lock().append_created(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{comment, voted};
    use crate::types::{CommentPage, FetchResponse, VoteResponse};
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockApi {
        pages: Mutex<VecDeque<Result<FetchResponse>>>,
        fetch_cursors: Mutex<Vec<Option<String>>>,
        votes: Mutex<Vec<(String, VoteRequest)>>,
        failing_votes: Mutex<HashSet<String>>,
        vote_response: Mutex<Option<VoteResponse>>,
        created: Mutex<Vec<NewComment>>,
        fail_create: AtomicBool,
        fail_patch: AtomicBool,
        gate: Option<Arc<Notify>>,
        page_gate: Option<Arc<Notify>>,
    }

    impl MockApi {
        fn with_pages(pages: Vec<Result<FetchResponse>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn fail_vote_on(&self, id: &str) {
            self.failing_votes.lock().unwrap().insert(id.to_string());
        }

        async fn wait_for_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl CommentApi for MockApi {
        async fn fetch_comments(
            &self,
            _thread_id: &str,
            cursor: Option<&str>,
        ) -> Result<FetchResponse> {
            self.fetch_cursors
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            if let (Some(gate), Some(_)) = (&self.page_gate, cursor) {
                gate.notified().await;
            }
            self.wait_for_gate().await;
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no page scripted")))
        }

        async fn vote_on_comment(
            &self,
            comment_id: &str,
            vote: &VoteRequest,
        ) -> Result<VoteResponse> {
            self.votes
                .lock()
                .unwrap()
                .push((comment_id.to_string(), vote.clone()));
            self.wait_for_gate().await;
            if self.failing_votes.lock().unwrap().contains(comment_id) {
                bail!("503 Service Unavailable");
            }
            Ok(self
                .vote_response
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_default())
        }

        async fn create_comment(&self, _thread_id: &str, new: &NewComment) -> Result<Comment> {
            if self.fail_create.load(Ordering::SeqCst) {
                bail!("422 Unprocessable Entity");
            }
            self.created.lock().unwrap().push(new.clone());
            let mut created = comment("new", new.parent_comment_id.as_deref(), 30);
            created.body = new.body.clone();
            Ok(created)
        }

        async fn patch_comment(&self, _comment_id: &str, _patch: &CommentPatch) -> Result<()> {
            if self.fail_patch.load(Ordering::SeqCst) {
                bail!("403 Forbidden");
            }
            Ok(())
        }
    }

    fn page(comments: Vec<Comment>, has_more: bool, cursor: Option<&str>) -> Result<FetchResponse> {
        Ok(FetchResponse::Page(CommentPage {
            comments,
            has_more,
            next_cursor: cursor.map(str::to_string),
            total_root_count: None,
        }))
    }

    fn controller(api: MockApi) -> (ThreadController<MockApi>, Arc<MockApi>) {
        let api = Arc::new(api);
        (
            ThreadController::new(Arc::clone(&api), "thread-1", SortMode::Best),
            api,
        )
    }

    fn row_ids(ctl: &ThreadController<MockApi>) -> Vec<String> {
        ctl.flat_list().into_iter().map(|r| r.item.id).collect()
    }

    #[tokio::test]
    async fn test_refetch_populates_store() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![page(
            vec![comment("r1", None, 0), comment("c1", Some("r1"), 1)],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        let status = ctl.status();
        assert!(!status.loading);
        assert_eq!(status.error, None);
        assert_eq!(status.comment_count, 2);
        assert_eq!(status.total_root_count, 1);
        assert_eq!(row_ids(&ctl), vec!["r1", "c1"]);
    }

    #[tokio::test]
    async fn test_refetch_failure_keeps_old_comments() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![
            page(vec![comment("r1", None, 0)], false, None),
            Err(anyhow!("connection reset")),
        ]));
        ctl.refetch().await.unwrap();
        assert!(ctl.refetch().await.is_err());
        assert_eq!(ctl.error().as_deref(), Some("connection reset"));
        assert!(!ctl.loading());
        assert_eq!(row_ids(&ctl), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_load_more_uses_cursor_and_stops_at_end() {
        let (ctl, api) = controller(MockApi::with_pages(vec![
            page(vec![comment("c1", None, 0)], true, Some("X")),
            page(vec![comment("c2", None, 1)], false, None),
        ]));
        ctl.refetch().await.unwrap();
        assert!(ctl.has_more());

        assert!(ctl.load_more().await.unwrap());
        assert_eq!(
            *api.fetch_cursors.lock().unwrap(),
            vec![None, Some("X".to_string())]
        );
        let ids: Vec<_> = ctl
            .lock()
            .comments()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert!(!ctl.has_more());
        assert_eq!(ctl.lock().cursor(), None);

        assert!(!ctl.load_more().await.unwrap());
        assert_eq!(api.fetch_cursors.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_more_failure_leaves_pages_alone() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![
            page(vec![comment("c1", None, 0)], true, Some("X")),
            Err(anyhow!("timeout")),
        ]));
        ctl.refetch().await.unwrap();
        assert!(ctl.load_more().await.is_err());
        assert_eq!(ctl.error().as_deref(), Some("timeout"));
        assert!(ctl.has_more());
        assert_eq!(ctl.lock().cursor(), Some("X"));
        assert_eq!(ctl.comment_count(), 1);
        assert!(!ctl.loading_more());
    }

    #[tokio::test]
    async fn test_overlapping_load_more_issues_one_request() {
        let gate = Arc::new(Notify::new());
        let api = MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::with_pages(vec![
                page(vec![comment("c1", None, 0)], true, Some("X")),
                page(vec![comment("c2", None, 1)], true, Some("Y")),
            ])
        };
        let (ctl, api) = controller(api);

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.refetch().await }
        });
        while api.fetch_cursors.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        first.await.unwrap().unwrap();

        let pending = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.load_more().await }
        });
        while !ctl.loading_more() {
            tokio::task::yield_now().await;
        }
        assert!(!ctl.load_more().await.unwrap());
        gate.notify_one();
        assert!(pending.await.unwrap().unwrap());
        assert_eq!(api.fetch_cursors.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refetch_discards_page_in_flight() {
        let page_gate = Arc::new(Notify::new());
        let api = MockApi {
            page_gate: Some(Arc::clone(&page_gate)),
            ..MockApi::with_pages(vec![
                page(vec![comment("r1", None, 0)], true, Some("X")),
                page(vec![comment("a", None, 0)], false, None),
                page(vec![comment("r2", None, 1)], true, Some("Y")),
            ])
        };
        let (ctl, api) = controller(api);
        ctl.refetch().await.unwrap();

        let pending = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.load_more().await }
        });
        while api.fetch_cursors.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }

        ctl.refetch().await.unwrap();
        assert!(!ctl.loading_more());
        page_gate.notify_one();
        assert!(pending.await.unwrap().unwrap());

        assert_eq!(row_ids(&ctl), vec!["a"]);
        assert!(!ctl.has_more());
        assert_eq!(ctl.lock().cursor(), None);
        assert_eq!(ctl.status().total_root_count, 1);
        assert_eq!(
            *api.fetch_cursors.lock().unwrap(),
            vec![None, Some("X".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_upvote_twice_restores_original() {
        let original = voted("c1", None, 3, 1);
        let (ctl, _api) = controller(MockApi::with_pages(vec![page(
            vec![original.clone()],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        ctl.handle_vote("c1", VoteType::Upvote, None).await.unwrap();
        ctl.handle_vote("c1", VoteType::Upvote, None).await.unwrap();
        assert_eq!(ctl.comment("c1").unwrap(), original);
    }

    #[tokio::test]
    async fn test_failed_vote_rolls_back_exactly() {
        let gate = Arc::new(Notify::new());
        let api = MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::with_pages(vec![page(vec![voted("c1", None, 3, 1)], false, None)])
        };
        api.fail_vote_on("c1");
        let (ctl, api) = controller(api);
        gate.notify_one();
        ctl.refetch().await.unwrap();

        let vote = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.handle_vote("c1", VoteType::Upvote, None).await }
        });
        while api.votes.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        let optimistic = ctl.comment("c1").unwrap();
        assert_eq!(optimistic.upvote_count, 4);
        assert_eq!(optimistic.downvote_count, 1);

        gate.notify_one();
        assert!(vote.await.unwrap().is_err());

        let restored = ctl.comment("c1").unwrap();
        assert_eq!(restored.upvote_count, 3);
        assert_eq!(restored.downvote_count, 1);
        assert_eq!(restored.user_vote, None);
        assert!(ctl
            .notice(Duration::from_secs(60))
            .unwrap()
            .contains("Vote failed"));
    }

    #[tokio::test]
    async fn test_vote_response_overrides_present_fields() {
        let api = MockApi::with_pages(vec![page(vec![voted("c1", None, 3, 1)], false, None)]);
        *api.vote_response.lock().unwrap() = Some(VoteResponse {
            upvote_count: Some(10),
            score: Some(7),
            ..VoteResponse::default()
        });
        let (ctl, _api) = controller(api);
        ctl.refetch().await.unwrap();
        ctl.handle_vote("c1", VoteType::Upvote, None).await.unwrap();

        let c = ctl.comment("c1").unwrap();
        assert_eq!(c.upvote_count, 10);
        assert_eq!(c.downvote_count, 1);
        assert_eq!(c.score, 7);
        assert_eq!(c.user_vote.unwrap().vote_type, VoteType::Upvote);
    }

    #[tokio::test]
    async fn test_votes_on_different_ids_are_independent() {
        let api = MockApi::with_pages(vec![page(
            vec![voted("a", None, 1, 0), voted("b", None, 1, 0)],
            false,
            None,
        )]);
        api.fail_vote_on("b");
        let (ctl, _api) = controller(api);
        ctl.refetch().await.unwrap();

        let (a, b) = tokio::join!(
            ctl.handle_vote("a", VoteType::Upvote, None),
            ctl.handle_vote("b", VoteType::Upvote, None)
        );
        assert!(a.is_ok());
        assert!(b.is_err());
        assert_eq!(ctl.comment("a").unwrap().upvote_count, 2);
        assert_eq!(ctl.comment("b").unwrap().upvote_count, 1);
    }

    #[tokio::test]
    async fn test_downvote_sends_reason() {
        let (ctl, api) = controller(MockApi::with_pages(vec![page(
            vec![voted("c1", None, 0, 0)],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        ctl.handle_vote("c1", VoteType::Downvote, Some("spam".into()))
            .await
            .unwrap();
        let votes = api.votes.lock().unwrap();
        assert_eq!(votes[0].0, "c1");
        assert_eq!(votes[0].1.downvote_reason.as_deref(), Some("spam"));
    }

    #[tokio::test]
    async fn test_blank_downvote_reason_is_not_sent() {
        let gate = Arc::new(Notify::new());
        let api = MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::with_pages(vec![page(vec![voted("c1", None, 0, 0)], false, None)])
        };
        let (ctl, api) = controller(api);
        gate.notify_one();
        ctl.refetch().await.unwrap();

        let pending = tokio::spawn({
            let ctl = ctl.clone();
            async move {
                ctl.handle_vote("c1", VoteType::Downvote, Some("   ".into()))
                    .await
            }
        });
        while api.votes.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        let local = ctl.comment("c1").unwrap().user_vote.unwrap();
        assert_eq!(local.vote_type, VoteType::Downvote);
        assert_eq!(local.downvote_reason, None);

        gate.notify_one();
        pending.await.unwrap().unwrap();
        assert_eq!(api.votes.lock().unwrap()[0].1.downvote_reason, None);
    }

    #[tokio::test]
    async fn test_vote_does_not_reorder_rows() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![page(
            vec![voted("a", None, 5, 0), voted("b", None, 4, 0)],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        assert_eq!(row_ids(&ctl), vec!["a", "b"]);
        ctl.handle_vote("b", VoteType::Upvote, None).await.unwrap();
        ctl.handle_vote("a", VoteType::Downvote, None).await.unwrap();
        assert_eq!(row_ids(&ctl), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_vote_on_unknown_comment_errors_without_request() {
        let (ctl, api) = controller(MockApi::default());
        assert!(ctl.handle_vote("ghost", VoteType::Upvote, None).await.is_err());
        assert!(api.votes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_appends_after_success() {
        let (ctl, api) = controller(MockApi::with_pages(vec![page(
            vec![comment("r1", None, 0)],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        let created = ctl
            .handle_create_comment("  a reply  ", Some("r1"))
            .await
            .unwrap();
        assert_eq!(created.body, "  a reply  ");
        assert_eq!(api.created.lock().unwrap()[0].body, "  a reply  ");
        assert_eq!(row_ids(&ctl), vec!["r1", "new"]);
        assert_eq!(ctl.flat_list()[1].item.depth, 1);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_store_alone() {
        let api = MockApi::with_pages(vec![page(vec![comment("r1", None, 0)], false, None)]);
        api.fail_create.store(true, Ordering::SeqCst);
        let (ctl, _api) = controller(api);
        ctl.refetch().await.unwrap();
        assert!(ctl.handle_create_comment("hello", None).await.is_err());
        assert_eq!(ctl.comment_count(), 1);
        assert_eq!(ctl.total_root_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected_locally() {
        let (ctl, api) = controller(MockApi::default());
        assert!(ctl.handle_create_comment("   ", None).await.is_err());
        assert!(api.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_toggle_rolls_back_on_failure() {
        let mut c = comment("c1", None, 0);
        c.creator_role = Some("Moderator".to_string());
        let api = MockApi::with_pages(vec![page(vec![c], false, None)]);
        api.fail_patch.store(true, Ordering::SeqCst);
        let (ctl, _api) = controller(api);
        ctl.refetch().await.unwrap();

        assert!(ctl.handle_toggle_role("c1", true).await.is_err());
        assert!(!ctl.comment("c1").unwrap().show_creator_role);
        assert!(ctl.notice(Duration::from_secs(60)).is_some());
    }

    #[tokio::test]
    async fn test_role_toggle_success_sticks() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![page(
            vec![comment("c1", None, 0)],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        ctl.handle_toggle_role("c1", true).await.unwrap();
        assert!(ctl.comment("c1").unwrap().show_creator_role);
    }

    #[tokio::test]
    async fn test_shutdown_discards_late_fetch() {
        let gate = Arc::new(Notify::new());
        let api = MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::with_pages(vec![page(vec![comment("r1", None, 0)], false, None)])
        };
        let (ctl, api) = controller(api);

        let fetch = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.refetch().await }
        });
        while api.fetch_cursors.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        ctl.shutdown();
        gate.notify_one();
        fetch.await.unwrap().unwrap();

        assert_eq!(ctl.comment_count(), 0);
        assert!(ctl.flat_list().is_empty());
    }

    #[tokio::test]
    async fn test_sort_and_collapse_are_structural() {
        let (ctl, _api) = controller(MockApi::with_pages(vec![page(
            vec![
                voted("r1", None, 1, 0),
                voted("r2", None, 2, 0),
                voted("c1", Some("r1"), 0, 0),
            ],
            false,
            None,
        )]));
        ctl.refetch().await.unwrap();
        assert_eq!(row_ids(&ctl), vec!["r2", "r1", "c1"]);

        ctl.set_sort(SortMode::New);
        assert_eq!(ctl.sort(), SortMode::New);

        ctl.toggle_collapse("r1");
        let rows = ctl.flat_list();
        assert_eq!(rows.len(), 2);
        let r1 = rows.iter().find(|r| r.item.id == "r1").unwrap();
        assert_eq!(r1.item.collapsed_count, 1);
    }
}
