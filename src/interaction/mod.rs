//! Event handling and user interactions for pin-bot.
//!
//! This module provides functionality for handling commands and events:
//! - Running `pin` and `unpin` commands as independent tasks
//! - Reporting command outcomes back to the channel
//! - Routing raw reaction and notice events to waiting monitors

pub mod event;
pub mod pin;
pub mod unpin;
