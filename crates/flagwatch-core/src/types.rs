//! Shared event and signal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event metadata as returned by the competition directory.
///
/// This is an immutable snapshot captured when a record is created and never
/// refreshed afterwards. `start`/`finish` stay raw strings on purpose: the
/// directory may hand us malformed timestamps, and the sweep (not the
/// decoder) is responsible for purging records it cannot schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventInfo {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// ISO-8601 start timestamp ("2026-09-01T10:00:00Z"), possibly absent
    /// or malformed.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub finish: Option<String>,
    #[serde(default)]
    pub duration: EventDuration,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub onsite: bool,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub restrictions: String,
    #[serde(default)]
    pub participants: i64,
    #[serde(default)]
    pub organizers: Vec<Organizer>,
    #[serde(default)]
    pub logo: String,
}

/// Event duration as reported by the directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventDuration {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organizer {
    #[serde(default)]
    pub name: String,
}

impl EventInfo {
    /// Parse the start timestamp. `None` means the record is unschedulable
    /// and must be reclaimed without ever notifying.
    pub fn parse_start(&self) -> Option<DateTime<Utc>> {
        let raw = self.start.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn parse_finish(&self) -> Option<DateTime<Utc>> {
        let raw = self.finish.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// An opt-in/opt-out signal extracted from a reaction on an event embed.
///
/// `event_id` comes from the `CTF ID: <id>` footer marker; reactions on
/// messages without the marker never produce a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionSignal {
    Added {
        event_id: String,
        user_id: u64,
        title: String,
    },
    Removed {
        event_id: String,
        user_id: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_utc_z() {
        let info = EventInfo {
            start: Some("2026-09-01T10:00:00Z".into()),
            ..sample()
        };
        let dt = info.parse_start().unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-09-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_start_offset() {
        let info = EventInfo {
            start: Some("2026-09-01T17:00:00+07:00".into()),
            ..sample()
        };
        let dt = info.parse_start().unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-09-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_start_malformed_or_missing() {
        let garbage = EventInfo {
            start: Some("next tuesday".into()),
            ..sample()
        };
        assert!(garbage.parse_start().is_none());

        let missing = EventInfo { start: None, ..sample() };
        assert!(missing.parse_start().is_none());
    }

    #[test]
    fn test_decode_directory_payload_with_missing_fields() {
        // Directory responses carry fields we do not model; missing ones
        // must default instead of failing the decode.
        let json = r#"{
            "id": 1001,
            "title": "Example CTF 2026",
            "url": "https://example.org/ctf",
            "start": "2026-09-01T10:00:00Z",
            "finish": "2026-09-02T10:00:00Z",
            "duration": {"days": 1, "hours": 0},
            "format": "Jeopardy",
            "onsite": false,
            "weight": 24.5,
            "organizers": [{"id": 9, "name": "example-team"}],
            "ctftime_url": "https://ctftime.org/event/1001/",
            "is_votable_now": false
        }"#;
        let info: EventInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.id, 1001);
        assert_eq!(info.organizers[0].name, "example-team");
        assert_eq!(info.restrictions, "");
        assert_eq!(info.participants, 0);
        assert!(info.parse_start().is_some());
    }

    fn sample() -> EventInfo {
        serde_json::from_str("{}").unwrap()
    }
}
