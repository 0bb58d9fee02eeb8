//! Vote tally rules shared by the optimistic reconciler and the file backend.

use crate::types::{Comment, UserVote, VoteResponse, VoteType};

fn tally_mut(comment: &mut Comment, vote_type: VoteType) -> &mut i64 {
    match vote_type {
        VoteType::Upvote => &mut comment.upvote_count,
        VoteType::Downvote => &mut comment.downvote_count,
    }
}

/// Apply a vote to `comment` in place.
///
/// Repeating the active vote retracts it, voting the other way moves one unit
/// between tallies, and a fresh vote adds one. `score` follows the change in
/// `upvote_count - downvote_count`. The reason is only kept on downvotes.
pub fn apply_vote(comment: &mut Comment, vote_type: VoteType, reason: Option<String>) {
    let before = comment.net_votes();
    let current = comment.user_vote.as_ref().map(|v| v.vote_type);

    match current {
        Some(active) if active == vote_type => {
            *tally_mut(comment, active) -= 1;
            comment.user_vote = None;
        }
        Some(active) => {
            *tally_mut(comment, active) -= 1;
            *tally_mut(comment, vote_type) += 1;
            comment.user_vote = Some(new_vote(vote_type, reason));
        }
        None => {
            *tally_mut(comment, vote_type) += 1;
            comment.user_vote = Some(new_vote(vote_type, reason));
        }
    }

    comment.score += comment.net_votes() - before;
}

fn new_vote(vote_type: VoteType, reason: Option<String>) -> UserVote {
    UserVote {
        vote_type,
        downvote_reason: match vote_type {
            VoteType::Downvote => reason.filter(|r| !r.trim().is_empty()),
            VoteType::Upvote => None,
        },
    }
}

/// Overwrite local fields with whatever the server returned
pub fn reconcile(comment: &mut Comment, response: &VoteResponse) {
    if let Some(up) = response.upvote_count {
        comment.upvote_count = up;
    }
    if let Some(down) = response.downvote_count {
        comment.downvote_count = down;
    }
    if let Some(score) = response.score {
        comment.score = score;
    }
    if let Some(user_vote) = &response.user_vote {
        comment.user_vote = user_vote.clone();
    }
}

/// Full server-side view of a comment's tally
pub fn response_for(comment: &Comment) -> VoteResponse {
    VoteResponse {
        upvote_count: Some(comment.upvote_count),
        downvote_count: Some(comment.downvote_count),
        score: Some(comment.score),
        user_vote: Some(comment.user_vote.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::voted;

    #[test]
    fn test_fresh_upvote() {
        let mut c = voted("c1", None, 3, 1);
        apply_vote(&mut c, VoteType::Upvote, None);
        assert_eq!((c.upvote_count, c.downvote_count, c.score), (4, 1, 3));
        assert_eq!(c.user_vote.unwrap().vote_type, VoteType::Upvote);
    }

    #[test]
    fn test_repeat_vote_retracts() {
        let original = voted("c1", None, 3, 1);
        let mut c = original.clone();
        apply_vote(&mut c, VoteType::Upvote, None);
        apply_vote(&mut c, VoteType::Upvote, None);
        assert_eq!(c, original);
    }

    #[test]
    fn test_repeat_downvote_retracts() {
        let original = voted("c1", None, 0, 2);
        let mut c = original.clone();
        apply_vote(&mut c, VoteType::Downvote, Some("off-topic".into()));
        assert_eq!(c.downvote_count, 3);
        apply_vote(&mut c, VoteType::Downvote, None);
        assert_eq!(c, original);
    }

    #[test]
    fn test_switching_moves_one_unit() {
        let mut c = voted("c1", None, 3, 1);
        apply_vote(&mut c, VoteType::Upvote, None);
        apply_vote(&mut c, VoteType::Downvote, Some("spam".into()));
        assert_eq!((c.upvote_count, c.downvote_count), (3, 2));
        assert_eq!(c.score, 1);
        let vote = c.user_vote.unwrap();
        assert_eq!(vote.vote_type, VoteType::Downvote);
        assert_eq!(vote.downvote_reason.as_deref(), Some("spam"));
    }

    #[test]
    fn test_upvote_drops_reason() {
        let mut c = voted("c1", None, 0, 0);
        apply_vote(&mut c, VoteType::Upvote, Some("ignored".into()));
        assert_eq!(c.user_vote.unwrap().downvote_reason, None);
    }

    #[test]
    fn test_blank_reason_is_dropped() {
        let mut c = voted("c1", None, 0, 0);
        apply_vote(&mut c, VoteType::Downvote, Some("   ".into()));
        assert_eq!(c.user_vote.unwrap().downvote_reason, None);
    }

    #[test]
    fn test_reconcile_only_touches_present_fields() {
        let mut c = voted("c1", None, 4, 1);
        apply_vote(&mut c, VoteType::Upvote, None);
        reconcile(
            &mut c,
            &VoteResponse {
                score: Some(42),
                ..VoteResponse::default()
            },
        );
        assert_eq!(c.score, 42);
        assert_eq!((c.upvote_count, c.downvote_count), (5, 1));
        assert!(c.user_vote.is_some());
    }

    #[test]
    fn test_reconcile_explicit_null_clears_vote() {
        let mut c = voted("c1", None, 0, 0);
        apply_vote(&mut c, VoteType::Upvote, None);
        reconcile(
            &mut c,
            &VoteResponse {
                user_vote: Some(None),
                ..VoteResponse::default()
            },
        );
        assert_eq!(c.user_vote, None);
    }

    #[test]
    fn test_response_for_reports_everything() {
        let c = voted("c1", None, 2, 1);
        let response = response_for(&c);
        assert_eq!(response.upvote_count, Some(2));
        assert_eq!(response.downvote_count, Some(1));
        assert_eq!(response.score, Some(1));
        assert_eq!(response.user_vote, Some(None));
    }
}
