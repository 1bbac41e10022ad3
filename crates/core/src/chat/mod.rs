pub mod twitch;

pub use twitch::TwitchChat;

use futures::future::BoxFuture;

/// Twitch `msg-id` tag value of a message sent with "Highlight My Message".
pub const HIGHLIGHT_MSG_ID: &str = "highlighted-message";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel login, without `#`.
    pub channel: String,
    pub sender: String,
    pub text: String,
    pub msg_id: Option<String>,
}

impl ChatMessage {
    pub fn is_highlighted(&self) -> bool {
        self.msg_id.as_deref() == Some(HIGHLIGHT_MSG_ID)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    #[error("invalid chat channel '{channel}': {reason}")]
    InvalidChannel { channel: String, reason: String },

    #[error("failed to send chat message: {0}")]
    Send(String),

    #[error("chat connection closed")]
    ChannelClosed,
}

/// The chat side of the bridge: channel membership and outgoing messages.
pub trait ChatClient: Send + Sync {
    fn join(&self, channel: &str) -> Result<(), ChatError>;

    fn part(&self, channel: &str);

    fn say<'a>(&'a self, channel: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), ChatError>>;
}
