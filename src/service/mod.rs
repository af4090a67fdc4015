//! Service integrations for external networks.
//!
//! This module contains the chat transport used by the ticket-bot. It defines
//! both the generic trait the runtime talks to and the IRC implementation,
//! allowing for extensibility and easy testing.

pub mod chat;
