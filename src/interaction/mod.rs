//! Message handling for ticket-bot.
//!
//! This module provides functionality for handling inbound chat lines:
//! - Extracting ticket and changeset references
//! - Applying ignore lists and ticket exclusions
//! - Sending the resulting links back through the chat client

pub mod chat_event;
pub mod classify;
