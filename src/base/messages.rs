//! User-facing text posted by the bot.

/// Acknowledgement posted after a successful pin (without a platform notice) or unpin.
pub const ACKNOWLEDGEMENT: &str = ":white_check_mark:";

/// Posted when the actor declines to remove the oldest pin.
pub const CANCELLED: &str = "Cancelled.";

/// Posted when the pin could not be placed after freeing space repeatedly.
pub const NO_ROOM: &str = "Could not make room in the pins.";

/// Text of the temporary prompt shown when the channel is out of pin space.
pub fn capacity_prompt(remove_oldest_emoji: &str) -> String {
    format!("No space in pins. Unpin or press :{remove_oldest_emoji}: to remove oldest")
}
