//! Discord gateway listener.
//! Maintains the websocket session (hello, identify, heartbeat) and yields
//! reaction add/remove events as a stream. Everything else the gateway
//! sends is ignored.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use flagwatch_core::error::{FlagwatchError, Result};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
/// GUILDS + GUILD_MESSAGE_REACTIONS.
const INTENTS: u64 = (1 << 0) | (1 << 10);

/// A raw reaction event. The message's embed footer still has to be
/// resolved via REST before this becomes an opt-in/opt-out signal.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReaction {
    pub added: bool,
    pub user_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

/// Discord gateway websocket client.
pub struct DiscordGateway {
    token: String,
    gateway_url: String,
}

impl DiscordGateway {
    pub fn new(bot_token: &str) -> Self {
        Self {
            token: bot_token.to_string(),
            gateway_url: GATEWAY_URL.to_string(),
        }
    }

    /// Start the session loop — returns a stream of reaction events.
    /// Reconnects with a short delay on any session failure; stops once
    /// the receiver is dropped.
    pub fn start(self) -> ReactionStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            tracing::info!("Discord gateway loop started");
            loop {
                if tx.is_closed() {
                    break;
                }
                if let Err(e) = self.run_session(&tx).await {
                    tracing::error!("Gateway session ended: {e}");
                }
                if tx.is_closed() {
                    tracing::info!("Gateway loop stopped (receiver dropped)");
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        });

        ReactionStream { rx }
    }

    /// One websocket session: hello, identify, then heartbeats and
    /// dispatches until the connection drops.
    async fn run_session(
        &self,
        tx: &tokio::sync::mpsc::UnboundedSender<GatewayReaction>,
    ) -> Result<()> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.gateway_url.as_str())
            .await
            .map_err(|e| FlagwatchError::Channel(format!("gateway connect failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        // First frame must be Hello with our heartbeat interval.
        let hello = match read.next().await {
            Some(Ok(WsMessage::Text(text))) => parse_json(&text)?,
            other => {
                return Err(FlagwatchError::Channel(format!(
                    "expected gateway hello, got {other:?}"
                )));
            }
        };
        let heartbeat_ms = hello["d"]["heartbeat_interval"].as_u64().ok_or_else(|| {
            FlagwatchError::Channel("gateway hello without heartbeat_interval".into())
        })?;

        let identify = json!({
            "op": 2,
            "d": {
                "token": self.token,
                "intents": INTENTS,
                "properties": { "os": "linux", "browser": "flagwatch", "device": "flagwatch" },
            }
        });
        write
            .send(WsMessage::Text(identify.to_string().into()))
            .await
            .map_err(|e| FlagwatchError::Channel(format!("identify failed: {e}")))?;

        // First heartbeat goes out after a random fraction of the interval,
        // as the gateway asks.
        let first_beat = (heartbeat_ms as f64 * rand::thread_rng().gen_range(0.0..1.0)) as u64;
        tokio::time::sleep(std::time::Duration::from_millis(first_beat)).await;

        let mut heartbeat =
            tokio::time::interval(std::time::Duration::from_millis(heartbeat_ms.max(1000)));
        let mut seq: Option<u64> = None;
        let mut bot_user_id: Option<u64> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "op": 1, "d": seq });
                    write
                        .send(WsMessage::Text(beat.to_string().into()))
                        .await
                        .map_err(|e| FlagwatchError::Channel(format!("heartbeat failed: {e}")))?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let event = parse_json(&text)?;
                            if let Some(s) = event["s"].as_u64() {
                                seq = Some(s);
                            }
                            match event["op"].as_u64() {
                                Some(0) => {
                                    if event["t"].as_str() == Some("READY") {
                                        bot_user_id = parse_snowflake(&event["d"]["user"]["id"]);
                                        tracing::info!("Gateway ready (bot user {bot_user_id:?})");
                                    }
                                    if let Some(reaction) = parse_dispatch(&event, bot_user_id) {
                                        if tx.send(reaction).is_err() {
                                            return Ok(());
                                        }
                                    }
                                }
                                // Reconnect / invalid session: drop out and
                                // let the outer loop start over.
                                Some(7) | Some(9) => {
                                    return Err(FlagwatchError::Channel(
                                        "gateway requested reconnect".into(),
                                    ));
                                }
                                // Heartbeat ack and everything else: ignore.
                                _ => {}
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            return Err(FlagwatchError::Channel(format!(
                                "gateway closed: {frame:?}"
                            )));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(FlagwatchError::Channel(format!("gateway error: {e}")));
                        }
                        None => {
                            return Err(FlagwatchError::Channel("gateway stream ended".into()));
                        }
                    }
                }
            }
        }
    }
}

/// Stream of reaction events from the gateway session loop.
pub struct ReactionStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<GatewayReaction>,
}

impl Stream for ReactionStream {
    type Item = GatewayReaction;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Unpin for ReactionStream {}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| FlagwatchError::Channel(format!("invalid gateway frame: {e}")))
}

fn parse_snowflake(value: &Value) -> Option<u64> {
    value.as_str()?.parse().ok()
}

/// Turn a dispatch frame into a reaction event. Non-reaction dispatches,
/// our own reactions, and other bots' reactions all yield `None`.
fn parse_dispatch(event: &Value, bot_user_id: Option<u64>) -> Option<GatewayReaction> {
    let added = match event["t"].as_str() {
        Some("MESSAGE_REACTION_ADD") => true,
        Some("MESSAGE_REACTION_REMOVE") => false,
        _ => return None,
    };
    let data = &event["d"];
    let user_id = parse_snowflake(&data["user_id"])?;

    if bot_user_id == Some(user_id) {
        return None;
    }
    if data["member"]["user"]["bot"].as_bool() == Some(true) {
        return None;
    }

    Some(GatewayReaction {
        added,
        user_id,
        channel_id: parse_snowflake(&data["channel_id"])?,
        message_id: parse_snowflake(&data["message_id"])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction_frame(t: &str) -> Value {
        json!({
            "op": 0,
            "t": t,
            "s": 7,
            "d": {
                "user_id": "42",
                "channel_id": "777",
                "message_id": "123456",
            }
        })
    }

    #[test]
    fn test_parse_reaction_add_and_remove() {
        let added = parse_dispatch(&reaction_frame("MESSAGE_REACTION_ADD"), None).unwrap();
        assert!(added.added);
        assert_eq!(added.user_id, 42);
        assert_eq!(added.channel_id, 777);

        let removed = parse_dispatch(&reaction_frame("MESSAGE_REACTION_REMOVE"), None).unwrap();
        assert!(!removed.added);
    }

    #[test]
    fn test_non_reaction_dispatch_ignored() {
        assert_eq!(parse_dispatch(&reaction_frame("MESSAGE_CREATE"), None), None);
    }

    #[test]
    fn test_own_and_bot_reactions_ignored() {
        // Our own reaction.
        assert_eq!(
            parse_dispatch(&reaction_frame("MESSAGE_REACTION_ADD"), Some(42)),
            None
        );

        // Another bot's reaction.
        let mut frame = reaction_frame("MESSAGE_REACTION_ADD");
        frame["d"]["member"] = json!({ "user": { "id": "42", "bot": true } });
        assert_eq!(parse_dispatch(&frame, None), None);
    }

    #[test]
    fn test_malformed_snowflakes_ignored() {
        let mut frame = reaction_frame("MESSAGE_REACTION_ADD");
        frame["d"]["user_id"] = json!(42); // number, not a snowflake string
        assert_eq!(parse_dispatch(&frame, None), None);
    }
}
