use crate::voice::VoiceChannelKey;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `join <twitch channel>`, also accepted as `tjoin`.
    Join { channel: String },
    /// `move <voice channel>`: a channel mention or a bare id.
    Move { channel: VoiceChannelKey },
    Stop,
    Read { text: String },
    Test,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("'{0}' is not a voice channel.")]
    InvalidChannel(String),
}

impl Command {
    /// Parses a chat line addressed to the bot.
    ///
    /// `None` means the line is not a command for us: no matching prefix, or an
    /// unknown command name.
    pub fn parse<P: AsRef<str>>(content: &str, prefixes: &[P]) -> Option<Result<Command, ParseError>> {
        let rest = prefixes
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty())
            .find_map(|p| content.strip_prefix(p))?
            .trim_start();

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "join" | "tjoin" => match args.split_whitespace().next() {
                Some(channel) => Ok(Command::Join {
                    channel: channel.to_owned(),
                }),
                None => Err(ParseError::MissingArgument {
                    usage: "join <twitch channel>",
                }),
            },
            "move" => match args.split_whitespace().next() {
                Some(raw) => parse_channel(raw)
                    .map(|channel| Command::Move { channel })
                    .ok_or_else(|| ParseError::InvalidChannel(raw.to_owned())),
                None => Err(ParseError::MissingArgument {
                    usage: "move <voice channel>",
                }),
            },
            "stop" => Ok(Command::Stop),
            "test" => Ok(Command::Test),
            "read" if args.is_empty() => Err(ParseError::MissingArgument { usage: "read <text>" }),
            "read" => Ok(Command::Read {
                text: args.to_owned(),
            }),
            _ => return None,
        };
        Some(command)
    }
}

/// Accepts `<#123>` and `123`.
fn parse_channel(raw: &str) -> Option<VoiceChannelKey> {
    let id = raw
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);
    id.parse::<u64>().ok().filter(|id| *id != 0).map(VoiceChannelKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIXES: [&str; 3] = ["!", "<@42>", "<@!42>"];

    fn parse(content: &str) -> Option<Result<Command, ParseError>> {
        Command::parse(content, &PREFIXES)
    }

    #[test]
    fn join_and_alias() {
        let expected = Some(Ok(Command::Join {
            channel: "streamer".into(),
        }));
        assert_eq!(parse("!join streamer"), expected);
        assert_eq!(parse("!tjoin streamer extra"), expected);
        assert_eq!(
            parse("!join"),
            Some(Err(ParseError::MissingArgument {
                usage: "join <twitch channel>"
            }))
        );
    }

    #[test]
    fn move_accepts_mentions_and_ids() {
        assert_eq!(
            parse("!move <#1234>"),
            Some(Ok(Command::Move {
                channel: VoiceChannelKey(1234)
            }))
        );
        assert_eq!(
            parse("!move 99"),
            Some(Ok(Command::Move {
                channel: VoiceChannelKey(99)
            }))
        );
        assert_eq!(
            parse("!move general"),
            Some(Err(ParseError::InvalidChannel("general".into())))
        );
    }

    #[test]
    fn read_keeps_the_whole_text() {
        assert_eq!(
            parse("!read Привет,   мир! Как дела?"),
            Some(Ok(Command::Read {
                text: "Привет,   мир! Как дела?".into()
            }))
        );
        assert_eq!(
            parse("!read   "),
            Some(Err(ParseError::MissingArgument { usage: "read <text>" }))
        );
    }

    #[test]
    fn mention_prefix() {
        assert_eq!(parse("<@42> stop"), Some(Ok(Command::Stop)));
        assert_eq!(parse("<@!42>test"), Some(Ok(Command::Test)));
    }

    #[test]
    fn ignores_everything_else() {
        assert_eq!(parse("stop"), None);
        assert_eq!(parse("!dance"), None);
        assert_eq!(parse("<@7> stop"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn usage_message() {
        let err = ParseError::MissingArgument { usage: "read <text>" };
        assert_eq!(err.to_string(), "Usage: read <text>");
    }
}
