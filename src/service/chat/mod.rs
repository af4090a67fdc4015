//! Chat service integration for ticket-bot.
//!
//! This module provides the narrow transport surface the bot needs:
//! - Connecting (and reconnecting) to the network
//! - Changing nickname and joining channels
//! - Sending messages to channels and users
//!
//! Commands are fire-and-forget. Their outcomes, and every inbound line, come
//! back to the runtime as [`ChatEvent`]s over an `mpsc` channel.

pub mod irc;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::base::types::{InboundMessage, Void};

// Types.

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

/// Create the channel that carries transport events to the runtime.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Everything a transport reports back to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The network accepted the session under `nickname`.
    Connected { nickname: String },
    /// A connect attempt could not establish a session.
    ConnectFailed { reason: String },
    /// An established session was lost.
    Disconnected { reason: String },
    /// Someone (possibly the bot) changed nickname.
    NickChanged { old: String, new: String },
    /// A message to a channel or to the bot.
    Message(InboundMessage),
}

// Traits.

/// Generic "chat" trait that transports must implement.
///
/// None of these methods wait for the network; they only queue work.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Start a connection attempt; reports `Connected` or `ConnectFailed`.
    async fn connect(&self) -> Void;

    /// Request a nickname change.
    async fn set_nick(&self, nickname: &str) -> Void;

    /// Join a channel.
    async fn join(&self, channel: &str) -> Void;

    /// Send a message to a channel or a user.
    async fn send_message(&self, target: &str, text: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
