//! Core components, types, and utilities for the ticket-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Ignore lists and ticket exclusions.
//! - Common types and result handling.

pub mod config;
pub mod ignore;
pub mod types;
