//! Discord REST client — direct messages, channel broadcasts, message lookup.

use serde_json::{Value, json};

use async_trait::async_trait;
use flagwatch_core::embed;
use flagwatch_core::error::{FlagwatchError, Result};
use flagwatch_core::traits::NotificationSink;

const API_BASE: &str = "https://discord.com/api/v10";

/// Discord REST channel. All sends are best-effort: callers log failures
/// and move on, nothing here is retried.
pub struct DiscordRest {
    token: String,
    client: reqwest::Client,
    base_url: String,
}

impl DiscordRest {
    pub fn new(bot_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            token: bot_token.to_string(),
            client,
            base_url: API_BASE.to_string(),
        }
    }

    /// Override the API base (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header("Authorization", self.auth())
            .json(body)
            .send()
            .await
            .map_err(|e| FlagwatchError::Delivery(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlagwatchError::Delivery(format!(
                "Discord API error {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FlagwatchError::Delivery(format!("invalid response: {e}")))
    }

    /// Fetch a message so the caller can inspect its embeds (used to
    /// resolve the event marker behind a reaction).
    pub async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<Value> {
        let url = format!("{}/channels/{channel_id}/messages/{message_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| FlagwatchError::Channel(format!("message fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlagwatchError::Channel(format!(
                "message fetch returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FlagwatchError::Channel(format!("invalid message payload: {e}")))
    }

    /// Pull the event marker out of a fetched message, if any. Messages
    /// without a marked embed footer are not event-related.
    pub fn footer_marker(message: &Value) -> Option<(String, String)> {
        let embed_obj = message["embeds"].get(0)?;
        let footer = embed_obj["footer"]["text"].as_str()?;
        let event_id = embed::parse_marker(footer)?;
        let title = embed_obj["title"].as_str().unwrap_or_default().to_string();
        Some((event_id, title))
    }
}

#[async_trait]
impl NotificationSink for DiscordRest {
    async fn send_direct(&self, user_id: u64, text: &str) -> Result<()> {
        // DMs need a DM channel first; users who block DMs fail here and
        // the caller swallows it.
        let dm = self
            .post_json(
                &format!("{}/users/@me/channels", self.base_url),
                &json!({ "recipient_id": user_id.to_string() }),
            )
            .await?;
        let channel_id = dm["id"]
            .as_str()
            .ok_or_else(|| FlagwatchError::Delivery("DM channel without id".into()))?;

        self.post_json(
            &format!("{}/channels/{channel_id}/messages", self.base_url),
            &json!({ "content": text }),
        )
        .await?;
        tracing::debug!("📨 DM delivered to user {user_id}");
        Ok(())
    }

    async fn send_broadcast(
        &self,
        channel_id: u64,
        text: &str,
        embed: Option<Value>,
    ) -> Result<()> {
        let mut body = json!({ "content": text });
        if let Some(embed) = embed {
            body["embeds"] = json!([embed]);
        }
        self.post_json(
            &format!("{}/channels/{channel_id}/messages", self.base_url),
            &body,
        )
        .await?;
        tracing::info!("📣 Broadcast delivered to channel {channel_id}");
        Ok(())
    }
}
