//! IRC implementation of the chat client, backed by the `irc` crate.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::StreamExt;
use irc::{
    client::{Client, Sender, data::Config as IrcConfig},
    error::Error as IrcError,
    proto::{Command, Message, Prefix, Response},
};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, instrument, trace, warn};

use super::{ChatClient, ChatEvent, EventSender, GenericChatClient};
use crate::base::{
    config::Config,
    types::{InboundMessage, Void},
};

/// How many `_`-suffixed nicknames to try when the configured one is taken.
const ALT_NICKS: usize = 3;

// Extra methods on `ChatClient` applied by the IRC implementation.

impl ChatClient {
    /// Creates a new IRC chat client that reports to `events`.
    pub fn irc(config: &Config, events: EventSender) -> Self {
        Self {
            inner: Arc::new(IrcChatClient::new(config, events)),
        }
    }
}

// Structs.

/// IRC client implementation.
///
/// Each `connect` spawns a session task; the current session's sender lives in
/// `sender` and is cleared when the session ends.
pub struct IrcChatClient {
    config: Config,
    events: EventSender,
    sender: Arc<Mutex<Option<Sender>>>,
}

impl IrcChatClient {
    pub fn new(config: &Config, events: EventSender) -> Self {
        Self {
            config: config.clone(),
            events,
            sender: Arc::new(Mutex::new(None)),
        }
    }

    async fn queue(&self, command: Command) -> Void {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(anyhow!("Not connected."))?;

        sender.send(command).map_err(|e| anyhow!("Failed to queue message: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl GenericChatClient for IrcChatClient {
    async fn connect(&self) -> Void {
        let session = Session {
            config: self.config.clone(),
            events: self.events.clone(),
            sender: self.sender.clone(),
        };

        tokio::spawn(session.run().in_current_span());

        Ok(())
    }

    async fn set_nick(&self, nickname: &str) -> Void {
        self.queue(Command::NICK(sanitize(nickname))).await
    }

    async fn join(&self, channel: &str) -> Void {
        self.queue(Command::JOIN(sanitize(channel), None, None)).await
    }

    async fn send_message(&self, target: &str, text: &str) -> Void {
        self.queue(Command::PRIVMSG(sanitize(target), sanitize(text))).await
    }
}

/// One connection, from connect to disconnect.
struct Session {
    config: Config,
    events: EventSender,
    sender: Arc<Mutex<Option<Sender>>>,
}

impl Session {
    #[instrument(name = "Session::run", skip_all, fields(server = %self.config.server, port = self.config.port))]
    async fn run(self) {
        info!("Connecting ...");

        let mut client = match Client::from_config(irc_config(&self.config)).await {
            Ok(client) => client,
            Err(err) => {
                error!("Connection failed: {}", err);
                self.report(ChatEvent::ConnectFailed { reason: err.to_string() });
                return;
            }
        };

        info!("Connected, registering as `{}` ...", self.config.nickname);

        let mut stream = match client.identify().and_then(|_| client.stream()) {
            Ok(stream) => stream,
            Err(err) => {
                self.report(ChatEvent::Disconnected { reason: err.to_string() });
                return;
            }
        };

        *self.sender.lock().await = Some(client.sender());

        let mut registered = false;

        let ending = loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(IrcError::NoUsableNick)) if registered => {
                    warn!("Nickname change rejected: no usable nickname.");
                    continue;
                }
                Some(Err(err)) => break session_error(registered, err.to_string()),
                None => break ChatEvent::Disconnected { reason: "Connection closed by server.".to_string() },
            };

            if !registered && matches!(message.command, Command::Response(Response::ERR_ERRONEOUSNICKNAME, _)) {
                break ChatEvent::ConnectFailed {
                    reason: format!("Nickname `{}` rejected by server.", self.config.nickname),
                };
            }

            if let Some(event) = to_event(&message) {
                if let ChatEvent::Connected { nickname } = &event {
                    registered = true;
                    info!("Signed on as `{}`.", nickname);
                }

                self.report(event);
            }
        };

        *self.sender.lock().await = None;

        warn!("Session ended: {:?}", ending);
        self.report(ending);
    }

    fn report(&self, event: ChatEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver is gone; dropping event.");
        }
    }
}

/// Registration errors end the attempt for good; later errors are a lost connection.
fn session_error(registered: bool, reason: String) -> ChatEvent {
    if registered { ChatEvent::Disconnected { reason } } else { ChatEvent::ConnectFailed { reason } }
}

/// Build the `irc` crate configuration for one session.
///
/// Channels are joined by the runtime, so none are handed to the client.
fn irc_config(config: &Config) -> IrcConfig {
    let alt_nicks = (1..=ALT_NICKS).map(|n| format!("{}{}", config.nickname, "_".repeat(n))).collect();

    IrcConfig {
        nickname: Some(config.nickname.clone()),
        alt_nicks,
        username: Some(config.username().to_string()),
        realname: Some(config.realname().to_string()),
        server: Some(config.server.clone()),
        port: Some(config.port),
        use_tls: Some(false),
        ..Default::default()
    }
}

/// Map a server message onto the events the runtime cares about.
fn to_event(message: &Message) -> Option<ChatEvent> {
    match &message.command {
        Command::Response(Response::RPL_WELCOME, args) => {
            let nickname = args.first()?.clone();
            Some(ChatEvent::Connected { nickname })
        }
        Command::NICK(new) => {
            let old = message.source_nickname()?.to_string();
            Some(ChatEvent::NickChanged { old, new: new.clone() })
        }
        Command::PRIVMSG(target, body) => {
            if body.starts_with('\u{1}') {
                trace!("Skipping CTCP message.");
                return None;
            }

            let sender = match message.prefix.as_ref()? {
                Prefix::Nickname(nick, user, host) if !user.is_empty() || !host.is_empty() => format!("{nick}!{user}@{host}"),
                Prefix::Nickname(nick, _, _) => nick.clone(),
                Prefix::ServerName(name) => name.clone(),
            };

            Some(ChatEvent::Message(InboundMessage {
                sender,
                target: target.clone(),
                body: body.clone(),
            }))
        }
        Command::ERROR(reason) => {
            warn!("Server error: {}", reason);
            None
        }
        other => {
            trace!("< {:?}", other);
            None
        }
    }
}

/// Keep outbound text on one protocol line.
fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

// Tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, tcp::OwnedReadHalf},
        time::timeout,
    };

    use super::*;
    use crate::{
        base::config::ConfigInner,
        service::chat::{EventReceiver, event_channel},
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config(port: u16) -> Config {
        Config::new(ConfigInner {
            ticket_url: "https://example.com/t/%s".to_string(),
            changeset_url: "https://example.com/c/%s".to_string(),
            nickname: "ticketbot".to_string(),
            channels: "#dev".to_string(),
            server: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        })
        .unwrap()
    }

    fn parse(line: &str) -> Message {
        line.parse().unwrap()
    }

    async fn next_event(events: &mut EventReceiver) -> ChatEvent {
        timeout(WAIT, events.recv()).await.expect("event in time").expect("event channel open")
    }

    /// Read client lines until one starts with `prefix`.
    async fn read_until(reader: &mut BufReader<OwnedReadHalf>, prefix: &str) -> (String, Vec<String>) {
        let mut seen = Vec::new();

        loop {
            let mut line = String::new();
            let read = timeout(WAIT, reader.read_line(&mut line)).await.expect("line in time").unwrap();
            assert!(read > 0, "client closed the connection");

            let line = line.trim_end().to_string();

            if line.starts_with(prefix) {
                return (line, seen);
            }

            seen.push(line);
        }
    }

    #[test]
    fn test_welcome_maps_to_connected() {
        let event = to_event(&parse(":irc.example.com 001 ticketbot_ :Welcome"));

        assert_eq!(event, Some(ChatEvent::Connected { nickname: "ticketbot_".to_string() }));
    }

    #[test]
    fn test_nick_maps_to_nick_changed() {
        let event = to_event(&parse(":ticketbot_!~tb@host NICK :ticketbot"));

        assert_eq!(
            event,
            Some(ChatEvent::NickChanged {
                old: "ticketbot_".to_string(),
                new: "ticketbot".to_string()
            })
        );
    }

    #[test]
    fn test_privmsg_maps_to_message() {
        let event = to_event(&parse(":alice!~a@host PRIVMSG ticketbot :[r123]"));

        assert_eq!(
            event,
            Some(ChatEvent::Message(InboundMessage {
                sender: "alice!~a@host".to_string(),
                target: "ticketbot".to_string(),
                body: "[r123]".to_string(),
            }))
        );
    }

    #[test]
    fn test_ctcp_and_unprefixed_privmsg_are_skipped() {
        assert_eq!(to_event(&parse(":alice!~a@host PRIVMSG #dev :\u{1}ACTION waves #12\u{1}")), None);
        assert_eq!(to_event(&parse("PRIVMSG #dev :no prefix")), None);
        assert_eq!(to_event(&parse(":irc.example.com 372 ticketbot :- motd")), None);
    }

    #[test]
    fn test_irc_config_disables_tls_and_channels() {
        let config = irc_config(&test_config(6667));

        assert_eq!(config.nickname.as_deref(), Some("ticketbot"));
        assert_eq!(config.alt_nicks, vec!["ticketbot_", "ticketbot__", "ticketbot___"]);
        assert_eq!(config.use_tls, Some(false));
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_session_error_depends_on_registration() {
        assert!(matches!(session_error(false, "x".to_string()), ChatEvent::ConnectFailed { .. }));
        assert!(matches!(session_error(true, "x".to_string()), ChatEvent::Disconnected { .. }));
    }

    #[test]
    fn test_sanitize_strips_line_breaks() {
        assert_eq!(sanitize("hello\r\nQUIT :bye"), "hello  QUIT :bye");
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails() {
        let (events, _rx) = event_channel();
        let client = IrcChatClient::new(&test_config(6667), events);

        assert!(client.send_message("#dev", "hello").await.is_err());
        assert!(client.join("#dev").await.is_err());
    }

    #[tokio::test]
    async fn test_session_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (events, mut rx) = event_channel();
        let client = IrcChatClient::new(&test_config(port), events);

        client.connect().await.unwrap();

        let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (reader, mut writer) = socket.into_split();
        let mut reader = BufReader::new(reader);

        // Registration.

        let (user, before) = read_until(&mut reader, "USER").await;
        assert!(before.iter().any(|l| l == "NICK ticketbot"), "no NICK in {before:?}");
        assert!(user.starts_with("USER ticketbot 0 "), "unexpected {user}");

        writer.write_all(b":irc.test 001 ticketbot :Welcome\r\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, ChatEvent::Connected { nickname: "ticketbot".to_string() });

        // Keepalive is answered by the client itself.

        writer.write_all(b"PING :abc\r\n").await.unwrap();
        let (pong, _) = read_until(&mut reader, "PONG").await;
        assert!(pong.ends_with("abc"), "unexpected {pong}");

        // Inbound and outbound messages.

        writer.write_all(b":alice!~a@host PRIVMSG #dev :see #12\r\n").await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            ChatEvent::Message(InboundMessage {
                sender: "alice!~a@host".to_string(),
                target: "#dev".to_string(),
                body: "see #12".to_string(),
            })
        );

        client.send_message("#dev", "hi\r\nQUIT").await.unwrap();
        let (privmsg, _) = read_until(&mut reader, "PRIVMSG").await;
        assert!(privmsg.starts_with("PRIVMSG #dev "), "unexpected {privmsg}");
        assert!(privmsg.ends_with("hi  QUIT"), "unexpected {privmsg}");

        // Server goes away.

        drop(writer);
        drop(reader);

        assert!(matches!(next_event(&mut rx).await, ChatEvent::Disconnected { .. }));
        assert!(client.send_message("#dev", "hello").await.is_err());
    }

    #[tokio::test]
    async fn test_erroneous_nickname_fails_the_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (events, mut rx) = event_channel();
        let client = IrcChatClient::new(&test_config(port), events);

        client.connect().await.unwrap();

        let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (reader, mut writer) = socket.into_split();
        let mut reader = BufReader::new(reader);

        read_until(&mut reader, "USER").await;
        writer.write_all(b":irc.test 432 * ticketbot :Erroneous nickname\r\n").await.unwrap();

        assert!(matches!(next_event(&mut rx).await, ChatEvent::ConnectFailed { .. }));
        assert!(client.join("#dev").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_port_reports_connect_failed() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let (events, mut rx) = event_channel();
        let client = IrcChatClient::new(&test_config(port), events);

        client.connect().await.unwrap();

        assert!(matches!(next_event(&mut rx).await, ChatEvent::ConnectFailed { .. }));
    }
}
