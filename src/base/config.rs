//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, path::PathBuf, sync::Arc};

use anyhow::anyhow;
use serde::Deserialize;
use tracing::info;

use super::{
    ignore::{IgnoreList, TicketExclusions},
    types::Res,
};

/// The substitution slot in URL templates.
pub const URL_SLOT: &str = "%s";

/// Default IRC server.
fn default_server() -> String {
    "irc.libera.chat".to_string()
}

/// Default IRC port (plaintext).
fn default_port() -> u16 {
    6667
}

/// Default nickname identification service.
fn default_identify_service() -> String {
    "NickServ".to_string()
}

/// Configuration for the ticket-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Ticket URL template with one `%s` slot (`TICKET_BOT_TICKET_URL`).
    pub ticket_url: String,
    /// Changeset URL template with one `%s` slot (`TICKET_BOT_CHANGESET_URL`).
    pub changeset_url: String,
    /// The bot's nickname (`TICKET_BOT_NICKNAME`).
    pub nickname: String,
    /// NickServ password; empty disables identification (`TICKET_BOT_PASSWORD`).
    #[serde(default)]
    pub password: String,
    /// Comma separated channels to join (`TICKET_BOT_CHANNELS`).
    pub channels: String,
    /// Help text sent to users who address the bot without a reference (`TICKET_BOT_HELP`).
    pub help: String,
    /// File of nickname patterns to ignore (`TICKET_BOT_IGNORE_NICKS_FILE`).
    #[serde(default)]
    pub ignore_nicks_file: Option<PathBuf>,
    /// File of message patterns to ignore (`TICKET_BOT_IGNORE_MSGS_FILE`).
    #[serde(default)]
    pub ignore_msgs_file: Option<PathBuf>,
    /// Ticket numbers that never get a reply, e.g. `0-10` (`TICKET_BOT_EXCLUDED_TICKETS`).
    #[serde(default)]
    pub excluded_tickets: TicketExclusions,
    /// IRC server host (`TICKET_BOT_SERVER`).
    #[serde(default = "default_server")]
    pub server: String,
    /// IRC server port (`TICKET_BOT_PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// IRC user name; defaults to the nickname (`TICKET_BOT_USERNAME`).
    #[serde(default)]
    pub username: Option<String>,
    /// IRC real name; defaults to the nickname (`TICKET_BOT_REALNAME`).
    #[serde(default)]
    pub realname: Option<String>,
    /// Service that receives the `identify` message (`TICKET_BOT_IDENTIFY_SERVICE`).
    #[serde(default = "default_identify_service")]
    pub identify_service: String,
    /// Compiled from `ignore_nicks_file`.
    #[serde(skip)]
    pub nick_ignores: IgnoreList,
    /// Compiled from `ignore_msgs_file`.
    #[serde(skip)]
    pub message_ignores: IgnoreList,
}

impl ConfigInner {
    /// The configured channels, in order, without blanks.
    pub fn channel_list(&self) -> Vec<&str> {
        self.channels.split(',').map(str::trim).filter(|c| !c.is_empty()).collect()
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nickname)
    }

    pub fn ticket_link(&self, reference: &str) -> String {
        self.ticket_url.replacen(URL_SLOT, reference, 1)
    }

    pub fn changeset_link(&self, reference: &str) -> String {
        self.changeset_url.replacen(URL_SLOT, reference, 1)
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("TICKET_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let mut inner: ConfigInner = cfg.build()?.try_deserialize()?;

        if let Some(path) = &inner.ignore_nicks_file {
            inner.nick_ignores = IgnoreList::load(path)?;
        }

        if let Some(path) = &inner.ignore_msgs_file {
            inner.message_ignores = IgnoreList::load(path)?;
        }

        let result = Self::new(inner)?;

        info!(
            nick_ignores = result.nick_ignores.len(),
            message_ignores = result.message_ignores.len(),
            excluded_tickets = result.excluded_tickets.count(),
            "Loaded configuration for `{}`.",
            result.nickname
        );

        Ok(result)
    }

    /// Validate an already-populated configuration.
    pub fn new(inner: ConfigInner) -> Res<Self> {
        if inner.nickname.is_empty() || inner.nickname.contains(char::is_whitespace) {
            return Err(anyhow!("Nickname must be non-empty and contain no whitespace."));
        }

        if inner.ticket_url.matches(URL_SLOT).count() != 1 {
            return Err(anyhow!("Ticket URL must contain exactly one `{URL_SLOT}`."));
        }

        if inner.changeset_url.matches(URL_SLOT).count() != 1 {
            return Err(anyhow!("Changeset URL must contain exactly one `{URL_SLOT}`."));
        }

        if inner.channel_list().is_empty() {
            return Err(anyhow!("At least one channel must be configured."));
        }

        if inner.server.is_empty() {
            return Err(anyhow!("Server must not be empty."));
        }

        Ok(Self { inner: Arc::new(inner) })
    }
}
