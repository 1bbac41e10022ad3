use crate::chat::{ChatClient, ChatError, ChatMessage};
use crate::config::TwitchConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::message::{PrivmsgMessage, ServerMessage};
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

const LOG_TARGET: &str = "chat::twitch";

type Client = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;

/// Twitch IRC over TLS, logged in as the bot account.
#[derive(Clone)]
pub struct TwitchChat {
    client: Client,
}

/// IRC wants the bare token; the Twitch token generator hands out `oauth:...`.
pub fn strip_oauth_prefix(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix("oauth:").unwrap_or(token)
}

impl TwitchChat {
    /// Opens the IRC connection. Messages from every joined channel arrive on the receiver.
    pub fn connect(config: &TwitchConfig) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let credentials = StaticLoginCredentials::new(
            config.nick.to_lowercase(),
            Some(strip_oauth_prefix(config.oauth_token.expose()).to_owned()),
        );
        let (incoming, client) = Client::new(ClientConfig::new_simple(credentials));
        tracing::info!(target: LOG_TARGET, nick = %config.nick, "connecting to twitch chat");
        (Self { client }, incoming)
    }

    /// Forwards chat lines to `tx` until either side closes.
    pub async fn listen(
        mut incoming: mpsc::UnboundedReceiver<ServerMessage>,
        tx: mpsc::Sender<ChatMessage>,
    ) -> Result<(), ChatError> {
        while let Some(message) = incoming.recv().await {
            match message {
                ServerMessage::Privmsg(privmsg) => {
                    let message = ChatMessage::from(privmsg);
                    tracing::debug!(
                        target: LOG_TARGET,
                        channel = %message.channel,
                        sender = %message.sender,
                        msg_id = ?message.msg_id,
                        "chat message"
                    );
                    if tx.send(message).await.is_err() {
                        return Ok(());
                    }
                }
                ServerMessage::Notice(notice) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        channel = ?notice.channel_login,
                        "twitch notice: {}",
                        notice.message_text
                    );
                }
                ServerMessage::Join(join) => {
                    tracing::debug!(target: LOG_TARGET, channel = %join.channel_login, "joined chat");
                }
                _ => {}
            }
        }
        Err(ChatError::ChannelClosed)
    }
}

impl From<PrivmsgMessage> for ChatMessage {
    fn from(m: PrivmsgMessage) -> Self {
        let msg_id = m.source.tags.0.get("msg-id").and_then(|v| v.clone());
        Self {
            channel: m.channel_login,
            sender: m.sender.login,
            text: m.message_text,
            msg_id,
        }
    }
}

impl ChatClient for TwitchChat {
    fn join(&self, channel: &str) -> Result<(), ChatError> {
        self.client
            .join(channel.to_owned())
            .map_err(|e| ChatError::InvalidChannel {
                channel: channel.to_owned(),
                reason: e.to_string(),
            })
    }

    fn part(&self, channel: &str) {
        self.client.part(channel.to_owned());
    }

    fn say<'a>(&'a self, channel: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), ChatError>> {
        async move {
            self.client
                .say(channel.to_owned(), message.to_owned())
                .await
                .map_err(|e| ChatError::Send(e.to_string()))
        }
        .boxed()
    }
}
