//! Event embed construction and the footer marker format.
//!
//! The `CTF ID: <id>` footer is the contract between outbound embeds and
//! inbound reaction signals: the registrar only reacts to messages whose
//! first embed carries this marker.

use serde_json::{Value, json};

use crate::types::EventInfo;

/// Literal prefix embedded in every event embed footer.
pub const EVENT_MARKER: &str = "CTF ID: ";

/// Extract the event id from an embed footer. Returns `None` when the
/// marker is absent or carries no id — such messages are not event-related.
pub fn parse_marker(footer: &str) -> Option<String> {
    let (_, id) = footer.rsplit_once(EVENT_MARKER)?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Discord mention string for one user.
pub fn mention(user_id: u64) -> String {
    format!("<@{user_id}>")
}

/// Space-joined mentions for a subscriber set.
pub fn mention_all<'a, I: IntoIterator<Item = &'a u64>>(user_ids: I) -> String {
    user_ids
        .into_iter()
        .map(|id| mention(*id))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the Discord embed JSON for an event.
pub fn event_embed(info: &EventInfo) -> Value {
    let start = format_timestamp(info.parse_start(), info.start.as_deref());
    let finish = format_timestamp(info.parse_finish(), info.finish.as_deref());

    let duration = if info.duration.days <= 0 {
        format!("{} hours", info.duration.hours)
    } else {
        format!("{} days {} hours", info.duration.days, info.duration.hours)
    };

    let restrictions = if info.restrictions == "Individual" || info.participants <= 0 {
        info.restrictions.clone()
    } else {
        format!("{} ({} teams registered)", info.restrictions, info.participants)
    };

    let mut embed = json!({
        "title": info.title,
        "url": info.url,
        "color": 0x8B0000,
        "fields": [
            { "name": "date", "value": format!("start: {start}\nfinish: {finish}"), "inline": false },
            { "name": "duration", "value": duration, "inline": true },
            { "name": "format", "value": info.format, "inline": true },
            { "name": "onsite", "value": info.onsite.to_string(), "inline": true },
            { "name": "weight", "value": info.weight.to_string(), "inline": true },
            { "name": "restrictions", "value": restrictions, "inline": true },
        ],
        "footer": { "text": format!("{EVENT_MARKER}{}", info.id) },
    });

    if !info.logo.is_empty() {
        embed["thumbnail"] = json!({ "url": info.logo });
    }

    embed
}

fn format_timestamp(parsed: Option<chrono::DateTime<chrono::Utc>>, raw: Option<&str>) -> String {
    match parsed {
        Some(dt) => dt.format("%d/%m/%Y %H:%M UTC").to_string(),
        None => raw.unwrap_or("unknown").to_string(),
    }
}
