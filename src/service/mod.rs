//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the pin-bot:
//! - Chat services (e.g., Slack)
//! - Access gates (privilege and location checks)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod access;
pub mod chat;
