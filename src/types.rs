use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Direction of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn label(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

/// The current user's vote on a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVote {
    pub vote_type: VoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downvote_reason: Option<String>,
}

/// A comment record as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub parent_comment_id: Option<String>,
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_role: Option<String>,
    #[serde(default)]
    pub show_creator_role: bool,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub downvote_count: i64,
    #[serde(default)]
    pub user_vote: Option<UserVote>,
    pub created_time: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }

    /// Net tally used by the `top` sort
    pub fn net_votes(&self) -> i64 {
        self.upvote_count - self.downvote_count
    }

    /// Role label, only when the author chose to show it
    pub fn visible_role(&self) -> Option<&str> {
        if self.show_creator_role {
            self.creator_role.as_deref()
        } else {
            None
        }
    }
}

/// Ordering applied to every level of the thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMode {
    #[default]
    Best,
    New,
    Top,
    Controversial,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::Best,
        SortMode::New,
        SortMode::Top,
        SortMode::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Best => "best",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Controversial => "controversial",
        }
    }

    /// Next mode in display order, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(SortMode::Best),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            "controversial" => Ok(SortMode::Controversial),
            other => Err(anyhow!(
                "Unknown sort mode '{}'. Expected one of: best, new, top, controversial",
                other
            )),
        }
    }
}

/// One page of comments from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub total_root_count: Option<usize>,
}

/// Fetch result: either a paginated envelope or a bare array (one full page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FetchResponse {
    Page(CommentPage),
    Comments(Vec<Comment>),
}

impl FetchResponse {
    pub fn into_page(self) -> CommentPage {
        match self {
            FetchResponse::Page(page) => page,
            FetchResponse::Comments(comments) => {
                let roots = comments.iter().filter(|c| c.is_root()).count();
                CommentPage {
                    comments,
                    has_more: false,
                    next_cursor: None,
                    total_root_count: Some(roots),
                }
            }
        }
    }
}

/// Body of a vote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: VoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downvote_reason: Option<String>,
}

/// Partial vote response. Absent fields leave local values untouched.
///
/// `user_vote` distinguishes an absent field (`None`) from an explicit
/// `null` (`Some(None)`), which clears the vote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvote_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downvote_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_vote: Option<Option<UserVote>>,
}

/// Maps a present field (including `null`) to `Some`, leaving `None` for absent
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A comment to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
}

/// Body of a comment patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub show_creator_role: bool,
}
