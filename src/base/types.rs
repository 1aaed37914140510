//! Common result aliases and the inbound event model.

use serde::{Deserialize, Serialize};

/// Application-level error type.
pub type Err = anyhow::Error;
/// Application-level result type.
pub type Res<T> = Result<T, Err>;
/// Application-level result with no value.
pub type Void = Res<()>;

/// Whether a reaction was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    /// A reaction was added to a message.
    Add,
    /// A reaction was removed from a message.
    Remove,
}

/// A reaction added to (or removed from) a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// The workspace (guild) the reaction happened in.
    pub guild_id: String,
    /// The channel containing the reacted message.
    pub channel_id: String,
    /// The reacted message.
    pub message_id: String,
    /// The user who reacted.
    pub user_id: String,
    /// The emoji identifier (e.g. `recycle`).
    pub emoji: String,
    /// Whether the reaction was added or removed.
    pub action: ReactionAction,
}

/// A system message posted by the platform announcing that a message was pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinNoticeEvent {
    /// The workspace (guild) the notice was posted in.
    pub guild_id: String,
    /// The channel the notice was posted in.
    pub channel_id: String,
    /// The notice message itself.
    pub message_id: String,
    /// The message that was pinned.
    pub reference_id: String,
    /// The user who pinned the message (as reported by the platform).
    pub user_id: String,
}

/// Raw events delivered by the chat transport.
///
/// These are immutable and produced by the transport adapter; the core only ever
/// reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// A reaction added or removed.
    Reaction(ReactionEvent),
    /// A "message pinned" system notice.
    PinNotice(PinNoticeEvent),
}

/// The `(guild, channel, message)` triple that narrows which events a monitor considers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    /// The workspace (guild) id.
    pub guild_id: String,
    /// The channel id.
    pub channel_id: String,
    /// The subject message id.
    pub message_id: String,
}

impl ScopeKey {
    /// Create a new scope key.
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

impl RawEvent {
    /// The scope this event belongs to.
    ///
    /// For a pin notice, the subject message is the message that was pinned, not the notice.
    pub fn scope_key(&self) -> ScopeKey {
        match self {
            RawEvent::Reaction(r) => ScopeKey::new(&r.guild_id, &r.channel_id, &r.message_id),
            RawEvent::PinNotice(n) => ScopeKey::new(&n.guild_id, &n.channel_id, &n.reference_id),
        }
    }

    /// The user who caused this event.
    pub fn actor_id(&self) -> &str {
        match self {
            RawEvent::Reaction(r) => &r.user_id,
            RawEvent::PinNotice(n) => &n.user_id,
        }
    }

    /// The emoji of an added reaction, if this is one.
    pub fn added_emoji(&self) -> Option<&str> {
        match self {
            RawEvent::Reaction(r) if r.action == ReactionAction::Add => Some(&r.emoji),
            _ => None,
        }
    }

    /// The message id of the event itself (the notice, for a pin notice).
    pub fn message_id(&self) -> &str {
        match self {
            RawEvent::Reaction(r) => &r.message_id,
            RawEvent::PinNotice(n) => &n.message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(action: ReactionAction) -> RawEvent {
        RawEvent::Reaction(ReactionEvent {
            guild_id: "T1".into(),
            channel_id: "C1".into(),
            message_id: "100.1".into(),
            user_id: "U1".into(),
            emoji: "recycle".into(),
            action,
        })
    }

    #[test]
    fn pin_notice_is_scoped_to_the_pinned_message() {
        let event = RawEvent::PinNotice(PinNoticeEvent {
            guild_id: "T1".into(),
            channel_id: "C1".into(),
            message_id: "200.2".into(),
            reference_id: "100.1".into(),
            user_id: "U1".into(),
        });

        assert_eq!(event.scope_key(), ScopeKey::new("T1", "C1", "100.1"));
        assert_eq!(event.message_id(), "200.2");
        assert_eq!(event.added_emoji(), None);
    }

    #[test]
    fn only_added_reactions_carry_an_emoji() {
        assert_eq!(reaction(ReactionAction::Add).added_emoji(), Some("recycle"));
        assert_eq!(reaction(ReactionAction::Remove).added_emoji(), None);
        assert_eq!(reaction(ReactionAction::Remove).actor_id(), "U1");
    }

    #[test]
    fn serializes_with_a_type_tag() {
        let value = serde_json::to_value(reaction(ReactionAction::Add)).unwrap();

        assert_eq!(value["type"], "reaction");
        assert_eq!(value["action"], "add");
    }
}
