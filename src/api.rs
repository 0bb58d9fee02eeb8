use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Comment, CommentPatch, FetchResponse, NewComment, VoteRequest, VoteResponse};

/// Transport boundary for a discussion backend.
///
/// Timeouts and retries belong to implementations; the controller calls each
/// method once and treats any error as a failed operation.
#[async_trait]
pub trait CommentApi: Send + Sync {
    /// Fetch one page of comments, starting at `cursor` when given
    async fn fetch_comments(&self, thread_id: &str, cursor: Option<&str>) -> Result<FetchResponse>;

    async fn vote_on_comment(&self, comment_id: &str, vote: &VoteRequest) -> Result<VoteResponse>;

    async fn create_comment(&self, thread_id: &str, comment: &NewComment) -> Result<Comment>;

    async fn patch_comment(&self, comment_id: &str, patch: &CommentPatch) -> Result<()>;
}
