use std::collections::BTreeSet;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A single `PRIVMSG` received from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Raw sender identity, usually `nick!user@host`.
    pub sender: String,
    /// Channel name, or the bot's own nickname for a private message.
    pub target: String,
    /// Message body.
    pub body: String,
}

impl InboundMessage {
    /// The logical nickname of the sender (everything before the first `!`).
    pub fn sender_nick(&self) -> &str {
        self.sender.split_once('!').map_or(self.sender.as_str(), |(nick, _)| nick)
    }

    /// Whether the message was addressed to the bot rather than a channel.
    pub fn is_private(&self, bot_nick: &str) -> bool {
        self.target == bot_nick
    }
}

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Sender(String),
    Channel(String),
}

impl Destination {
    pub fn target(&self) -> &str {
        match self {
            Destination::Sender(nick) => nick,
            Destination::Channel(channel) => channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyIntent {
    pub destination: Destination,
    pub text: String,
}

/// What the classifier found in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub ticket_refs: BTreeSet<String>,
    pub changeset_refs: BTreeSet<String>,
    pub is_bare_address: bool,
    pub is_ignored_sender: bool,
    pub is_ignored_message: bool,
}

impl Classification {
    pub fn is_ignored(&self) -> bool {
        self.is_ignored_sender || self.is_ignored_message
    }
}
