//! Per-record sweep decisions.
//!
//! Pure functions of `(record, now, limits)` so the scheduler's behavior is
//! driven entirely by explicit clocks in tests. The state machine per
//! record: `Pending -> Notified` on window entry, `Notified -> Expired`
//! after the grace period; `Pending -> Expired` directly when the window
//! was missed or the start time is unusable.

use chrono::{DateTime, Duration, Utc};

use crate::store::SubscriptionRecord;

/// Scheduling constants, resolved from config at each tick.
#[derive(Debug, Clone, Copy)]
pub struct SweepLimits {
    /// Width of the pre-start reminder window.
    pub window: Duration,
    /// Retention after start for already-notified records.
    pub grace: Duration,
}

impl Default for SweepLimits {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            grace: Duration::hours(2),
        }
    }
}

impl SweepLimits {
    pub fn from_hours(window_hours: i64, grace_hours: i64) -> Self {
        Self {
            window: Duration::hours(window_hours),
            grace: Duration::hours(grace_hours),
        }
    }
}

/// Derived record state at a given instant. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet notified, start still in the future.
    Pending,
    /// Reminder sent, awaiting grace expiry.
    Notified,
    /// Eligible for removal.
    Expired,
}

/// What the sweep must do with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// Nothing to do this tick.
    Keep,
    /// Broadcast the reminder and flip `notified`.
    Notify,
    /// Reclaim the record without sending anything.
    Remove,
}

/// Decide the action for one record. Records are independent; the caller
/// may evaluate them in any order.
pub fn assess(record: &SubscriptionRecord, now: DateTime<Utc>, limits: &SweepLimits) -> SweepAction {
    // An unschedulable start time poisons the record either way: purge
    // without ever notifying.
    let Some(start) = record.info.parse_start() else {
        return SweepAction::Remove;
    };

    if record.notified {
        if now >= start + limits.grace {
            return SweepAction::Remove;
        }
        return SweepAction::Keep;
    }

    if now >= start {
        // Window missed entirely (downtime or late subscription). The
        // reminder is dropped, never fired late: at-most-once delivery.
        return SweepAction::Remove;
    }

    if now >= start - limits.window {
        return SweepAction::Notify;
    }

    SweepAction::Keep
}

/// Derived state, for diagnostics.
pub fn state_of(
    record: &SubscriptionRecord,
    now: DateTime<Utc>,
    limits: &SweepLimits,
) -> RecordState {
    match (record.notified, assess(record, now, limits)) {
        (_, SweepAction::Remove) => RecordState::Expired,
        (true, _) => RecordState::Notified,
        (false, _) => RecordState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SubscriptionRecord;
    use flagwatch_core::types::EventInfo;

    fn record_starting_at(start: &str) -> SubscriptionRecord {
        let info: EventInfo =
            serde_json::from_str(&format!(r#"{{"id": 1, "start": "{start}"}}"#)).unwrap();
        let mut record = SubscriptionRecord::new(info);
        record.subscribers.insert(42);
        record
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_pending_outside_window_kept() {
        let record = record_starting_at("2026-09-03T10:00:00Z");
        let limits = SweepLimits::default();
        // 48h before start: outside the 24h window.
        assert_eq!(
            assess(&record, at("2026-09-01T10:00:00Z"), &limits),
            SweepAction::Keep
        );
        assert_eq!(
            state_of(&record, at("2026-09-01T10:00:00Z"), &limits),
            RecordState::Pending
        );
    }

    #[test]
    fn test_window_entry_notifies() {
        let record = record_starting_at("2026-09-03T10:00:00Z");
        let limits = SweepLimits::default();
        // Exactly on the window edge.
        assert_eq!(
            assess(&record, at("2026-09-02T10:00:00Z"), &limits),
            SweepAction::Notify
        );
        // Just before start, still inside.
        assert_eq!(
            assess(&record, at("2026-09-03T09:59:59Z"), &limits),
            SweepAction::Notify
        );
    }

    #[test]
    fn test_start_instant_is_outside_window() {
        // The window is half-open: [start - 24h, start).
        let record = record_starting_at("2026-09-03T10:00:00Z");
        let limits = SweepLimits::default();
        assert_eq!(
            assess(&record, at("2026-09-03T10:00:00Z"), &limits),
            SweepAction::Remove
        );
    }

    #[test]
    fn test_missed_window_removed_without_notify() {
        let record = record_starting_at("2026-09-03T10:00:00Z");
        let limits = SweepLimits::default();
        assert_eq!(
            assess(&record, at("2026-09-04T00:00:00Z"), &limits),
            SweepAction::Remove
        );
    }

    #[test]
    fn test_notified_retained_through_grace() {
        let mut record = record_starting_at("2026-09-03T10:00:00Z");
        record.notified = true;
        let limits = SweepLimits::default();
        // Past start but inside grace: retained.
        assert_eq!(
            assess(&record, at("2026-09-03T10:01:00Z"), &limits),
            SweepAction::Keep
        );
        assert_eq!(
            state_of(&record, at("2026-09-03T10:01:00Z"), &limits),
            RecordState::Notified
        );
        // Grace elapsed: reclaimed.
        assert_eq!(
            assess(&record, at("2026-09-03T12:00:00Z"), &limits),
            SweepAction::Remove
        );
    }

    #[test]
    fn test_notified_never_renotifies() {
        let mut record = record_starting_at("2026-09-03T10:00:00Z");
        record.notified = true;
        let limits = SweepLimits::default();
        // Still inside the window, already notified: keep, never Notify.
        assert_eq!(
            assess(&record, at("2026-09-02T12:00:00Z"), &limits),
            SweepAction::Keep
        );
    }

    #[test]
    fn test_unparsable_start_removed_in_any_state() {
        let mut record = record_starting_at("2026-09-03T10:00:00Z");
        record.info.start = Some("whenever".into());
        let limits = SweepLimits::default();
        assert_eq!(
            assess(&record, at("2026-09-01T00:00:00Z"), &limits),
            SweepAction::Remove
        );
        record.notified = true;
        assert_eq!(
            assess(&record, at("2026-09-01T00:00:00Z"), &limits),
            SweepAction::Remove
        );

        record.info.start = None;
        assert_eq!(
            assess(&record, at("2026-09-01T00:00:00Z"), &limits),
            SweepAction::Remove
        );
    }

    #[test]
    fn test_custom_limits() {
        let record = record_starting_at("2026-09-03T10:00:00Z");
        let limits = SweepLimits::from_hours(1, 6);
        // 2h before start: outside a 1h window.
        assert_eq!(
            assess(&record, at("2026-09-03T08:00:00Z"), &limits),
            SweepAction::Keep
        );
        assert_eq!(
            assess(&record, at("2026-09-03T09:30:00Z"), &limits),
            SweepAction::Notify
        );
    }
}
