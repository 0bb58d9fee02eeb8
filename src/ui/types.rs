//! UI type definitions for the application state machine.

/// Status of a user-initiated operation that blocks input until it settles
#[derive(Clone, PartialEq, Eq)]
pub enum LoadingState {
    Idle,
    Loading(String), // Message to display
    Error(String),
}

/// Text input currently captured by a popup
#[derive(Clone, PartialEq, Eq)]
pub enum InputMode {
    None,
    /// Writing a new comment, or a reply when `parent_id` is set
    Composing {
        parent_id: Option<String>,
        text: String,
    },
    /// Optional reason for a downvote, single line
    DownvoteReason { comment_id: String, text: String },
}

impl InputMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, InputMode::None)
    }

    /// Mutable access to the text being typed, if any
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            InputMode::None => None,
            InputMode::Composing { text, .. } | InputMode::DownvoteReason { text, .. } => Some(text),
        }
    }
}
