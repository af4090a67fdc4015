//! Library root for `ticket-bot`.
//!
//! Ticket-bot is an IRC bot that watches channels for issue-tracker and
//! version-control references and answers with links:
//! - `#1234` becomes a ticket URL
//! - `[r1234]` becomes a changeset URL
//! - Addressing the bot without a reference gets a private help message
//! - Ignore lists silence noisy senders and messages
//!
//! The session is driven by an explicit state machine (`runtime`) fed by
//! events from a chat transport (`service::chat`), so the transport can be
//! swapped out or mocked in tests.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up the IRC client and runs the session until a connect attempt fails
/// or the process is interrupted.
pub async fn start(config: Config) -> Void {
    info!("Starting ticket-bot ...");

    // Initialize the runtime.
    let mut runtime = runtime::Runtime::irc(config);

    // Run until a fatal error or Ctrl-C.
    tokio::select! {
        result = runtime.start() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down.");
            Ok(())
        }
    }
}
