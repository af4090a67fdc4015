use tracing::{debug, info, instrument, warn};

use crate::{
    base::{config::Config, types::InboundMessage},
    interaction::classify::{Classifier, plan_replies},
    service::chat::ChatClient,
};

/// Handle one inbound chat line to completion.
///
/// Send failures are logged and skipped; nothing here can stop the session.
#[instrument(skip_all, fields(sender = message.sender_nick(), target = %message.target))]
pub async fn handle_chat_message(message: &InboundMessage, bot_nick: &str, classifier: &Classifier, config: &Config, chat: &ChatClient) {
    let classification = classifier.classify(&message.body, message.sender_nick(), bot_nick);

    if classification.is_ignored_sender {
        debug!("Ignoring message from ignored sender.");
    } else if classification.is_ignored_message {
        debug!("Ignoring message matching the message ignore list.");
    }

    let replies = plan_replies(&classification, message, bot_nick, config);

    if replies.is_empty() {
        return;
    }

    info!("Sending {} replies ...", replies.len());

    for reply in replies.iter() {
        if let Err(err) = chat.send_message(reply.destination.target(), &reply.text).await {
            warn!("Failed to send reply to `{}`: {}", reply.destination.target(), err);
        }
    }
}
