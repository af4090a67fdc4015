//! Session state machine for the ticket-bot.

use anyhow::anyhow;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::{chat_event::handle_chat_message, classify::Classifier},
    service::chat::{ChatClient, ChatEvent, EventReceiver, event_channel},
};

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    SignedOn,
}

/// Runtime that owns the chat session.
///
/// Events are handled one at a time, to completion, in the order the transport
/// reports them.
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
    classifier: Classifier,
    events: EventReceiver,
    state: SessionState,
    nickname: String,
}

impl Runtime {
    /// Create a runtime around an existing chat client and its event stream.
    pub fn new(config: Config, chat: ChatClient, events: EventReceiver) -> Self {
        let classifier = Classifier::new(&config);
        let nickname = config.nickname.clone();

        Self {
            config,
            chat,
            classifier,
            events,
            state: SessionState::Disconnected,
            nickname,
        }
    }

    /// Create a runtime backed by the IRC client.
    #[instrument(skip_all)]
    pub fn irc(config: Config) -> Self {
        let (sender, events) = event_channel();
        let chat = ChatClient::irc(&config, sender);

        Self::new(config, chat, events)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The nickname the bot currently holds on the network.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Connect and process events until the event stream ends or a connect fails.
    pub async fn start(&mut self) -> Void {
        self.connect().await?;

        while let Some(event) = self.events.recv().await {
            self.handle_event(event).await?;
        }

        info!("Event stream closed, stopping.");

        Ok(())
    }

    /// Apply one event to the session.
    ///
    /// Only a failed connect attempt is an error.
    #[instrument(skip_all, fields(state = ?self.state))]
    pub async fn handle_event(&mut self, event: ChatEvent) -> Void {
        match event {
            ChatEvent::Connected { nickname } => {
                info!("Connected as `{}`.", nickname);

                self.nickname = nickname;
                self.authenticate().await;
                self.join_channels().await;
            }
            ChatEvent::ConnectFailed { reason } => {
                error!("Connection failed: {}", reason);

                self.state = SessionState::Disconnected;

                return Err(anyhow!("Connection failed: {reason}"));
            }
            ChatEvent::Disconnected { reason } => {
                warn!("Connection lost ({}), reconnecting ...", reason);

                self.state = SessionState::Disconnected;
                self.connect().await?;
            }
            ChatEvent::NickChanged { old, new } => {
                if old == self.nickname {
                    info!("Nickname changed from `{}` to `{}`.", old, new);
                    self.nickname = new;
                }
            }
            ChatEvent::Message(message) => {
                if self.state != SessionState::SignedOn {
                    debug!("Dropping message received before sign-on.");
                    return Ok(());
                }

                handle_chat_message(&message, &self.nickname, &self.classifier, &self.config, &self.chat).await;
            }
        }

        Ok(())
    }

    async fn connect(&mut self) -> Res<()> {
        self.chat.connect().await?;
        self.state = SessionState::Connecting;

        Ok(())
    }

    /// Claim the configured nickname and identify with the nickname service.
    async fn authenticate(&mut self) {
        if let Err(err) = self.chat.set_nick(&self.config.nickname).await {
            warn!("Failed to set nickname: {}", err);
        }

        if !self.config.password.is_empty() {
            info!("Identifying with {} ...", self.config.identify_service);

            let message = format!("identify {}", self.config.password);

            if let Err(err) = self.chat.send_message(&self.config.identify_service, &message).await {
                warn!("Failed to identify: {}", err);
            }
        }

        self.state = SessionState::Authenticating;
    }

    async fn join_channels(&mut self) {
        for channel in self.config.channel_list() {
            info!("Joining {} ...", channel);

            if let Err(err) = self.chat.join(channel).await {
                warn!("Failed to join {}: {}", channel, err);
            }
        }

        self.state = SessionState::SignedOn;
    }
}
