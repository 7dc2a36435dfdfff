//! Daily upcoming-events digest.
//!
//! Independent of the subscription sweep: a 60-second check fires the
//! digest once per day at the configured local HH:MM. Settings are re-read
//! from shared config on every check, so a changed fire time or channel id
//! takes effect without a restart.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Timelike};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use flagwatch_channels::DiscordRest;
use flagwatch_core::config::FlagwatchConfig;
use flagwatch_core::traits::NotificationSink;
use flagwatch_core::types::EventInfo;
use flagwatch_directory::DirectoryClient;

const CHECK_SECS: u64 = 60;

pub fn spawn_digest(
    directory: Arc<DirectoryClient>,
    sink: Arc<DiscordRest>,
    config: Arc<RwLock<FlagwatchConfig>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_fired: Option<NaiveDate> = None;
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(CHECK_SECS)).await;

            let (digest, channel_id) = {
                let cfg = config.read().await;
                let channel = if cfg.digest.channel_id != 0 {
                    cfg.digest.channel_id
                } else {
                    cfg.notify.channel_id
                };
                (cfg.digest.clone(), channel)
            };
            if !digest.enabled || channel_id == 0 {
                continue;
            }
            let Some((hour, minute)) = digest.parse_time() else {
                continue;
            };

            let now = Local::now();
            if now.hour() != hour || now.minute() != minute {
                continue;
            }
            if last_fired == Some(now.date_naive()) {
                continue;
            }
            last_fired = Some(now.date_naive());

            let events = match directory.upcoming(digest.limit, digest.lookahead_days).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("Digest skipped, upcoming list unavailable: {e}");
                    continue;
                }
            };
            if events.is_empty() {
                tracing::info!("Digest skipped: nothing upcoming");
                continue;
            }

            let text = format_digest(&events);
            if let Err(e) = sink.send_broadcast(channel_id, &text, None).await {
                tracing::warn!("Digest broadcast dropped: {e}");
            }
        }
    })
}

/// One line per event: title, start date, format, weight.
pub fn format_digest(events: &[EventInfo]) -> String {
    let mut lines = vec![format!("📅 **Upcoming events ({})**", events.len())];
    for info in events {
        let start = match info.parse_start() {
            Some(dt) => dt.format("%d/%m/%Y %H:%M UTC").to_string(),
            None => "TBA".to_string(),
        };
        lines.push(format!(
            "• **{}** — {} — {} (weight {})\n  {}",
            info.title, start, info.format, info.weight, info.url
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_digest() {
        let events: Vec<EventInfo> = serde_json::from_str(
            r#"[
                {"id": 1, "title": "Alpha CTF", "url": "https://a.example",
                 "start": "2026-09-01T10:00:00Z", "format": "Jeopardy", "weight": 25.0},
                {"id": 2, "title": "Beta CTF", "url": "https://b.example",
                 "start": "bogus", "format": "Attack-Defense", "weight": 0.0}
            ]"#,
        )
        .unwrap();

        let text = format_digest(&events);
        assert!(text.contains("Upcoming events (2)"));
        assert!(text.contains("Alpha CTF"));
        assert!(text.contains("01/09/2026 10:00 UTC"));
        // Unparsable start renders as TBA instead of being dropped.
        assert!(text.contains("Beta CTF"));
        assert!(text.contains("TBA"));
    }
}
