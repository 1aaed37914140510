//! Chat service integration for pin-bot.
//!
//! This module provides the Slack transport:
//! - Receiving `/pin` and `/unpin` commands, plus reaction and pin-notice events
//! - Pinning, unpinning, and listing pins
//! - Posting, reacting to, and deleting messages
//!
//! Slack API error codes are classified into [`TransportError`] kinds here, so the pin flows
//! never need to know about Slack.

use crate::{
    base::{
        config::Config,
        error::TransportError,
        types::{PinNoticeEvent, RawEvent, ReactionAction, ReactionEvent, Res, Void},
    },
    interaction,
    pins::{PinCoordinator, PinRequest},
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slack_morphism::{errors::SlackClientError, prelude::*};
use tracing::{debug, info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient, TransportResult};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config) -> Res<Self> {
        let client = SlackChatClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    pins: PinCoordinator,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
}

/// Body of `pins.add` / `pins.remove`.
#[derive(Debug, Serialize)]
struct SlackPinsItemRequest<'a> {
    channel: &'a str,
    timestamp: &'a str,
}

/// Body of `pins.list`.
#[derive(Debug, Serialize)]
struct SlackPinsListRequest<'a> {
    channel: &'a str,
}

/// Response of `pins.add` / `pins.remove` (only `ok`, which the client already checks).
#[derive(Debug, Deserialize)]
struct SlackPinsEmptyResponse {}

/// Response of `pins.list`.
#[derive(Debug, Deserialize)]
struct SlackPinsListResponse {
    #[serde(default)]
    items: Vec<SlackPinnedItem>,
}

#[derive(Debug, Deserialize)]
struct SlackPinnedItem {
    #[serde(default)]
    created: i64,
    message: Option<SlackPinnedMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackPinnedMessage {
    ts: String,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self, pins: PinCoordinator) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState { pins }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_message(&self, channel_id: &str, text: &str) -> TransportResult<String> {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message)
            .with_as_user(true)
            .with_link_names(true);

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(classify)?;

        Ok(response.ts.0)
    }

    #[instrument(skip(self))]
    async fn react_to_message(&self, channel_id: &str, message_id: &str, emoji: &str) -> TransportResult<()> {
        let request = SlackApiReactionsAddRequest {
            channel: SlackChannelId(channel_id.to_string()),
            name: SlackReactionName(emoji.to_string()),
            timestamp: SlackTs(message_id.to_string()),
        };

        let session = self.client.open_session(&self.bot_token);

        session.reactions_add(&request).await.map_err(classify)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()> {
        let request = SlackApiChatDeleteRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(message_id.to_string()));

        let session = self.client.open_session(&self.bot_token);

        session.chat_delete(&request).await.map_err(classify)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn pin_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()> {
        let request = SlackPinsItemRequest {
            channel: channel_id,
            timestamp: message_id,
        };

        let session = self.client.open_session(&self.bot_token);

        let response: Result<SlackPinsEmptyResponse, _> = session.http_session_api.http_post("pins.add", &request, None).await;

        match response {
            Ok(_) => Ok(()),
            Err(SlackClientError::ApiError(ae)) if ae.code == "already_pinned" => {
                debug!("Message was already pinned.");
                Ok(())
            }
            Err(err) => Err(classify(err)),
        }
    }

    #[instrument(skip(self))]
    async fn unpin_message(&self, channel_id: &str, message_id: &str) -> TransportResult<()> {
        let request = SlackPinsItemRequest {
            channel: channel_id,
            timestamp: message_id,
        };

        let session = self.client.open_session(&self.bot_token);

        let _: SlackPinsEmptyResponse = session.http_session_api.http_post("pins.remove", &request, None).await.map_err(classify)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pins(&self, channel_id: &str) -> TransportResult<Vec<String>> {
        let request = SlackPinsListRequest { channel: channel_id };

        let session = self.client.open_session(&self.bot_token);

        let response: SlackPinsListResponse = session.http_session_api.http_post("pins.list", &request, None).await.map_err(classify)?;

        Ok(newest_first(response))
    }
}

// Helpers.

/// Map a Slack client error onto the transport taxonomy.
fn classify(err: SlackClientError) -> TransportError {
    if let SlackClientError::ApiError(ae) = &err
        && let Some(classified) = classify_error_code(&ae.code)
    {
        return classified;
    }

    TransportError::Other(anyhow::anyhow!("Slack request failed: {}", err))
}

/// Classify a Slack API error code; `None` means "not a recoverable kind".
fn classify_error_code(code: &str) -> Option<TransportError> {
    match code {
        "too_many_pins" => Some(TransportError::CapacityExceeded),
        "not_pinnable" | "permission_denied" | "restricted_action" | "not_in_channel" | "cant_update_message" | "cant_delete_message" => {
            Some(TransportError::Forbidden(code.to_string()))
        }
        "message_not_found" | "channel_not_found" | "no_item_specified" | "no_pin" | "no_reaction" => Some(TransportError::NotFound(code.to_string())),
        _ => None,
    }
}

/// Pinned message timestamps, newest pin first.
fn newest_first(response: SlackPinsListResponse) -> Vec<String> {
    let mut items: Vec<(i64, String)> = response
        .items
        .into_iter()
        .filter_map(|item| item.message.map(|message| (item.created, message.ts)))
        .collect();

    items.sort_by(|a, b| b.0.cmp(&a.0));

    items.into_iter().map(|(_, ts)| ts).collect()
}

/// Turn a command argument into a message timestamp.
///
/// Accepts a raw timestamp (`1712345678.123456`) or a message permalink
/// (`https://acme.slack.com/archives/C123/p1712345678123456`).
fn parse_message_ref(text: &str) -> Option<String> {
    let text = text.trim().trim_start_matches('<').trim_end_matches('>');

    if let Some((_, tail)) = text.rsplit_once("/p") {
        let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();

        if digits.len() <= 6 {
            return None;
        }

        let (secs, micros) = digits.split_at(digits.len() - 6);
        return Some(format!("{secs}.{micros}"));
    }

    let (secs, micros) = text.split_once('.')?;

    if secs.is_empty() || micros.is_empty() || !secs.chars().chain(micros.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(text.to_string())
}

/// Convert a serialized Slack event body into a raw event, if it is one the monitors care about.
fn raw_event_from_slack(team_id: &str, body: &Value) -> Option<RawEvent> {
    let str_at = |pointer: &str| body.pointer(pointer).and_then(Value::as_str).map(str::to_string);

    match body.get("type")?.as_str()? {
        kind @ ("reaction_added" | "reaction_removed") => {
            let action = if kind == "reaction_added" { ReactionAction::Add } else { ReactionAction::Remove };

            Some(RawEvent::Reaction(ReactionEvent {
                guild_id: team_id.to_string(),
                channel_id: str_at("/item/channel")?,
                message_id: str_at("/item/ts")?,
                user_id: str_at("/user")?,
                emoji: str_at("/reaction")?,
                action,
            }))
        }
        "message" if body.get("subtype").and_then(Value::as_str) == Some("pinned_item") => Some(RawEvent::PinNotice(PinNoticeEvent {
            guild_id: team_id.to_string(),
            channel_id: str_at("/channel")?,
            message_id: str_at("/ts")?,
            reference_id: str_at("/item/ts").or_else(|| str_at("/attachments/0/ts"))?,
            user_id: str_at("/user").unwrap_or_default(),
        })),
        _ => None,
    }
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
#[instrument(skip_all)]
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    let command = event.command.0.as_str();

    let Some(message_id) = event.text.as_deref().and_then(parse_message_ref) else {
        return Ok(command_reply(&format!("Usage: `{command} <message timestamp or link>`")));
    };

    let request = PinRequest::new(event.team_id.0.clone(), event.channel_id.0.clone(), event.user_id.0.clone(), message_id);

    match command {
        "/pin" => {
            info!("Received pin command ...");
            interaction::pin::handle_pin_command(request, user_state.pins.clone());
        }
        "/unpin" => {
            info!("Received unpin command ...");
            interaction::unpin::handle_unpin_command(request, user_state.pins.clone());
        }
        _ => {
            warn!("[COMMAND] {:#?}", event);
            return Ok(command_reply("Only `/pin` and `/unpin` are supported."));
        }
    }

    Ok(command_reply("On it."))
}

/// Builds the immediate response to a slash command.
fn command_reply(text: &str) -> SlackCommandEventResponse {
    SlackCommandEventResponse::new(SlackMessageContent::new().with_text(text.to_string()))
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    let body = serde_json::to_value(&event_callback.event)?;

    match raw_event_from_slack(&event_callback.team_id.0, &body) {
        Some(event) => {
            interaction::event::handle_raw_event(&event, user_state.pins.registry());
        }
        None => debug!("Ignoring push event."),
    }

    Ok(())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_pin_error_codes() {
        assert!(matches!(classify_error_code("too_many_pins"), Some(TransportError::CapacityExceeded)));
        assert!(matches!(classify_error_code("not_pinnable"), Some(TransportError::Forbidden(_))));
        assert!(matches!(classify_error_code("message_not_found"), Some(TransportError::NotFound(_))));
        assert!(classify_error_code("ratelimited").is_none());
    }

    #[test]
    fn parses_timestamps_and_permalinks() {
        assert_eq!(parse_message_ref("1712345678.123456"), Some("1712345678.123456".to_string()));
        assert_eq!(
            parse_message_ref("<https://acme.slack.com/archives/C123/p1712345678123456>"),
            Some("1712345678.123456".to_string())
        );
        assert_eq!(
            parse_message_ref("https://acme.slack.com/archives/C123/p1712345678123456?thread_ts=1.2"),
            Some("1712345678.123456".to_string())
        );
        assert_eq!(parse_message_ref("hello"), None);
        assert_eq!(parse_message_ref("12.ab"), None);
    }

    #[test]
    fn orders_pins_newest_first() {
        let response: SlackPinsListResponse = serde_json::from_value(serde_json::json!({
            "ok": true,
            "items": [
                { "type": "message", "created": 100, "message": { "ts": "1.0" } },
                { "type": "message", "created": 300, "message": { "ts": "3.0" } },
                { "type": "file", "created": 400 },
                { "type": "message", "created": 200, "message": { "ts": "2.0" } },
            ]
        }))
        .unwrap();

        assert_eq!(newest_first(response), vec!["3.0", "2.0", "1.0"]);
    }

    #[test]
    fn converts_reaction_events() {
        let body = serde_json::json!({
            "type": "reaction_added",
            "user": "U1",
            "reaction": "recycle",
            "item": { "type": "message", "channel": "C1", "ts": "100.1" },
            "event_ts": "100.2"
        });

        let event = raw_event_from_slack("T1", &body).unwrap();

        assert_eq!(
            event,
            RawEvent::Reaction(ReactionEvent {
                guild_id: "T1".into(),
                channel_id: "C1".into(),
                message_id: "100.1".into(),
                user_id: "U1".into(),
                emoji: "recycle".into(),
                action: ReactionAction::Add,
            })
        );

        let removed = serde_json::json!({
            "type": "reaction_removed",
            "user": "U1",
            "reaction": "x",
            "item": { "type": "message", "channel": "C1", "ts": "100.1" }
        });

        assert_eq!(raw_event_from_slack("T1", &removed).and_then(|e| e.added_emoji().map(str::to_string)), None);
    }

    #[test]
    fn converts_pin_notices() {
        let body = serde_json::json!({
            "type": "message",
            "subtype": "pinned_item",
            "channel": "C1",
            "ts": "200.2",
            "user": "U1",
            "text": "<@U1> pinned a message to this channel.",
            "item_type": "C",
            "item": { "type": "message", "ts": "100.1" }
        });

        let event = raw_event_from_slack("T1", &body).unwrap();

        assert_eq!(event.scope_key(), crate::base::types::ScopeKey::new("T1", "C1", "100.1"));
        assert_eq!(event.message_id(), "200.2");
    }

    #[test]
    fn ignores_other_events() {
        let message = serde_json::json!({ "type": "message", "channel": "C1", "ts": "1.0", "text": "hi" });
        let mention = serde_json::json!({ "type": "app_mention", "channel": "C1", "ts": "1.0" });

        assert!(raw_event_from_slack("T1", &message).is_none());
        assert!(raw_event_from_slack("T1", &mention).is_none());
    }
}
