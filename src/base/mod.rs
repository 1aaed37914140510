//! Core components, types, and utilities for the pin-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - User-facing message text.
//! - Common types, the inbound event model, and classified errors.

pub mod config;
pub mod error;
pub mod messages;
pub mod types;
