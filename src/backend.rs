//! A `CommentApi` served from a local JSON discussion file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::CommentApi;
use crate::thread::{build_forest, TreeNode};
use crate::types::{
    Comment, CommentPage, CommentPatch, FetchResponse, NewComment, VoteRequest, VoteResponse,
};
use crate::vote;

/// On-disk discussion format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Serves pages of root comments (with their replies) and persists every change
pub struct FileBackend {
    path: PathBuf,
    page_size: usize,
    author: String,
    thread_id: String,
    title: String,
    discussion: Mutex<Discussion>,
}

impl FileBackend {
    pub async fn open(path: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read discussion file {}", path.display()))?;
        let discussion: Discussion = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse discussion file {}", path.display()))?;

        debug!(
            path = %path.display(),
            comments = discussion.comments.len(),
            "opened discussion"
        );

        Ok(Self {
            path,
            page_size,
            author: "me".to_string(),
            thread_id: discussion.id.clone(),
            title: discussion.title.clone(),
            discussion: Mutex::new(discussion),
        })
    }

    /// Name recorded on comments created through this backend
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn check_thread(&self, thread_id: &str) -> Result<()> {
        if thread_id != self.thread_id {
            bail!("Unknown discussion: {}", thread_id);
        }
        Ok(())
    }

    async fn persist(&self, discussion: &Discussion) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_string_pretty(discussion)
            .context("Failed to serialize discussion")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "discussion saved");
        Ok(())
    }
}

fn collect_ids<'a>(node: &TreeNode<'a>, ids: &mut HashSet<&'a str>) {
    ids.insert(node.comment.id.as_str());
    for child in &node.children {
        collect_ids(child, ids);
    }
}

/// Slice `comments` into a page of `page_size` roots starting at `cursor`.
///
/// A `page_size` of 0 serves everything in one page.
pub fn page_of(comments: &[Comment], cursor: Option<&str>, page_size: usize) -> Result<CommentPage> {
    let offset = match cursor {
        Some(c) => c
            .parse::<usize>()
            .with_context(|| format!("Invalid cursor: {}", c))?,
        None => 0,
    };

    let forest = build_forest(comments);
    let size = if page_size == 0 { forest.len() } else { page_size };
    let end = offset.saturating_add(size).min(forest.len());
    let start = offset.min(end);

    let mut ids = HashSet::new();
    for root in &forest[start..end] {
        collect_ids(root, &mut ids);
    }

    let has_more = end < forest.len();
    Ok(CommentPage {
        comments: comments
            .iter()
            .filter(|c| ids.contains(c.id.as_str()))
            .cloned()
            .collect(),
        has_more,
        next_cursor: has_more.then(|| end.to_string()),
        total_root_count: Some(forest.len()),
    })
}

#[async_trait]
impl CommentApi for FileBackend {
    async fn fetch_comments(&self, thread_id: &str, cursor: Option<&str>) -> Result<FetchResponse> {
        self.check_thread(thread_id)?;
        let discussion = self.discussion.lock().await;
        let page = page_of(&discussion.comments, cursor, self.page_size)?;
        Ok(FetchResponse::Page(page))
    }

    async fn vote_on_comment(&self, comment_id: &str, request: &VoteRequest) -> Result<VoteResponse> {
        let mut discussion = self.discussion.lock().await;
        let comment = discussion
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| anyhow!("Comment not found: {}", comment_id))?;

        vote::apply_vote(comment, request.vote_type, request.downvote_reason.clone());
        let response = vote::response_for(comment);
        self.persist(&discussion).await?;
        Ok(response)
    }

    async fn create_comment(&self, thread_id: &str, new: &NewComment) -> Result<Comment> {
        self.check_thread(thread_id)?;
        let mut discussion = self.discussion.lock().await;

        if let Some(parent) = &new.parent_comment_id {
            if !discussion.comments.iter().any(|c| &c.id == parent) {
                bail!("Parent comment not found: {}", parent);
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: format!("{}-{}", now.timestamp_millis(), discussion.comments.len()),
            parent_comment_id: new.parent_comment_id.clone(),
            body: new.body.clone(),
            author: self.author.clone(),
            creator_role: None,
            show_creator_role: false,
            score: 0,
            upvote_count: 0,
            downvote_count: 0,
            user_vote: None,
            created_time: now,
        };
        discussion.comments.push(comment.clone());
        self.persist(&discussion).await?;
        Ok(comment)
    }

    async fn patch_comment(&self, comment_id: &str, patch: &CommentPatch) -> Result<()> {
        let mut discussion = self.discussion.lock().await;
        let comment = discussion
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| anyhow!("Comment not found: {}", comment_id))?;
        comment.show_creator_role = patch.show_creator_role;
        self.persist(&discussion).await
    }
}
