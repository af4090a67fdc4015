//! Reference extraction and reply planning.

use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

use crate::base::{
    config::Config,
    ignore::IgnoreList,
    types::{Classification, Destination, InboundMessage, ReplyIntent},
};

/// `#1234` anywhere in a message.
static TICKET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([0-9]+)").expect("valid ticket regex"));

/// `[r1234]` at the start of a message or after whitespace. ASCII word characters only.
static CHANGESET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u)(?:^|\s)\[(\w+)\]").expect("valid changeset regex"));

/// Classifies chat lines against the configured ignore lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    nick_ignores: IgnoreList,
    message_ignores: IgnoreList,
}

impl Classifier {
    pub fn new(config: &Config) -> Self {
        Self {
            nick_ignores: config.nick_ignores.clone(),
            message_ignores: config.message_ignores.clone(),
        }
    }

    pub fn classify(&self, body: &str, sender_nick: &str, bot_nick: &str) -> Classification {
        let ticket_refs = captures(&TICKET_RE, body);
        let changeset_refs = captures(&CHANGESET_RE, body);

        let is_bare_address = !bot_nick.is_empty() && body.starts_with(bot_nick) && ticket_refs.is_empty() && changeset_refs.is_empty();

        Classification {
            ticket_refs,
            changeset_refs,
            is_bare_address,
            is_ignored_sender: self.nick_ignores.is_match(sender_nick),
            is_ignored_message: self.message_ignores.is_match(body),
        }
    }
}

fn captures(re: &Regex, body: &str) -> BTreeSet<String> {
    re.captures_iter(body).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect()
}

/// Turn a classification into the replies the bot should send.
///
/// Ignore rules win over everything, then the help reply, then one link per
/// distinct reference (tickets first).
pub fn plan_replies(classification: &Classification, message: &InboundMessage, bot_nick: &str, config: &Config) -> Vec<ReplyIntent> {
    if classification.is_ignored() {
        return Vec::new();
    }

    let sender = message.sender_nick().to_string();

    if classification.is_bare_address {
        return vec![ReplyIntent {
            destination: Destination::Sender(sender),
            text: config.help.clone(),
        }];
    }

    let destination = if message.is_private(bot_nick) {
        Destination::Sender(sender)
    } else {
        Destination::Channel(message.target.clone())
    };

    let tickets = classification
        .ticket_refs
        .iter()
        .filter(|reference| !config.excluded_tickets.contains(reference))
        .map(|reference| config.ticket_link(reference));

    let changesets = classification.changeset_refs.iter().map(|reference| config.changeset_link(reference));

    tickets
        .chain(changesets)
        .map(|text| ReplyIntent {
            destination: destination.clone(),
            text,
        })
        .collect()
}
