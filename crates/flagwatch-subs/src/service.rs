//! The single-writer subscription service.
//!
//! All mutations of the persisted book — user-driven registration and the
//! time-driven sweep — are funneled through one actor that drains an
//! ordered mpsc channel and applies commands strictly one at a time. This
//! is what rules out the lost-update race between a `Subscribe` and a
//! concurrent tick: there are never two load-mutate-save cycles in flight.
//!
//! Per-(event, user) ordering holds because callers forward signals into
//! the channel in arrival order and the channel is FIFO.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use flagwatch_core::config::FlagwatchConfig;
use flagwatch_core::embed;
use flagwatch_core::traits::{EventDirectory, NotificationSink};
use flagwatch_core::types::ReactionSignal;

use crate::store::{SubscriptionRecord, SubscriptionStore};
use crate::sweep::{self, SweepAction, SweepLimits};

/// The three request kinds every store mutation reduces to.
#[derive(Debug)]
pub enum Command {
    Subscribe {
        event_id: String,
        user_id: u64,
        title: String,
    },
    Unsubscribe {
        event_id: String,
        user_id: u64,
    },
    Tick,
}

/// Cloneable sender side of the service.
#[derive(Clone)]
pub struct SubscriptionHandle {
    tx: mpsc::Sender<Command>,
}

impl SubscriptionHandle {
    pub async fn subscribe(&self, event_id: &str, user_id: u64, title: &str) {
        self.send(Command::Subscribe {
            event_id: event_id.to_string(),
            user_id,
            title: title.to_string(),
        })
        .await;
    }

    pub async fn unsubscribe(&self, event_id: &str, user_id: u64) {
        self.send(Command::Unsubscribe {
            event_id: event_id.to_string(),
            user_id,
        })
        .await;
    }

    pub async fn tick(&self) {
        self.send(Command::Tick).await;
    }

    /// Forward a reaction signal. Ordering across calls is the caller's
    /// arrival order, which the FIFO channel preserves.
    pub async fn apply(&self, signal: ReactionSignal) {
        match signal {
            ReactionSignal::Added {
                event_id,
                user_id,
                title,
            } => self.subscribe(&event_id, user_id, &title).await,
            ReactionSignal::Removed { event_id, user_id } => {
                self.unsubscribe(&event_id, user_id).await
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) {
        if self.tx.send(command).await.is_err() {
            tracing::warn!("Subscription service is gone, command dropped");
        }
    }
}

/// Owns the store and the collaborator boundaries.
pub struct SubscriptionService {
    store: SubscriptionStore,
    directory: Arc<dyn EventDirectory>,
    sink: Arc<dyn NotificationSink>,
    /// Read through at every use, never snapshotted at startup.
    config: Arc<RwLock<FlagwatchConfig>>,
}

impl SubscriptionService {
    pub fn new(
        store: SubscriptionStore,
        directory: Arc<dyn EventDirectory>,
        sink: Arc<dyn NotificationSink>,
        config: Arc<RwLock<FlagwatchConfig>>,
    ) -> Self {
        Self {
            store,
            directory,
            sink,
            config,
        }
    }

    /// Spawn the actor loop. The loop drains commands until every handle is
    /// dropped, finishing the in-flight command (and its save) first — that
    /// is the graceful-shutdown contract.
    pub fn spawn(self) -> (SubscriptionHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(64);
        let join = tokio::spawn(async move {
            tracing::info!("📋 Subscription service started");
            while let Some(command) = rx.recv().await {
                self.handle(command).await;
            }
            tracing::info!("Subscription service stopped");
        });
        (SubscriptionHandle { tx }, join)
    }

    async fn handle(&self, command: Command) {
        match command {
            Command::Subscribe {
                event_id,
                user_id,
                title,
            } => self.handle_subscribe(&event_id, user_id, &title).await,
            Command::Unsubscribe { event_id, user_id } => {
                self.handle_unsubscribe(&event_id, user_id).await
            }
            Command::Tick => self.run_sweep_at(Utc::now()).await,
        }
    }

    /// Opt-in path. Idempotent under double delivery of the same reaction.
    async fn handle_subscribe(&self, event_id: &str, user_id: u64, title: &str) {
        let mut book = self.store.load();

        if !book.events.contains_key(event_id) {
            // First sight of this event id: capture the metadata snapshot.
            // Any lookup failure aborts the whole operation — no record,
            // no confirmation.
            let info = match self.directory.fetch(event_id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!("Subscription to event {event_id} aborted: {e}");
                    return;
                }
            };
            book.events
                .insert(event_id.to_string(), SubscriptionRecord::new(info));
        }

        let Some(record) = book.events.get_mut(event_id) else {
            return;
        };
        let display = if title.is_empty() {
            record.info.title.clone()
        } else {
            title.to_string()
        };

        if !record.subscribers.insert(user_id) {
            // Already subscribed: nothing to persist, still acknowledge.
            self.dm(
                user_id,
                &format!("✅ You are set to receive a reminder for **{display}**."),
            )
            .await;
            return;
        }

        if let Err(e) = self.store.save(&book) {
            tracing::error!("Subscription to event {event_id} not persisted: {e}");
            return;
        }
        tracing::info!("➕ User {user_id} subscribed to event {event_id}");

        self.dm(
            user_id,
            &format!(
                "✅ You are set to receive a reminder for **{display}**.\n\
                 A reminder goes out in the public channel before the event starts."
            ),
        )
        .await;
    }

    /// Opt-out path. Deletes the record immediately when the last
    /// subscriber leaves — never deferred to the sweep.
    async fn handle_unsubscribe(&self, event_id: &str, user_id: u64) {
        let mut book = self.store.load();

        let Some(record) = book.events.get_mut(event_id) else {
            return;
        };
        if !record.subscribers.remove(&user_id) {
            return;
        }
        let display = record.info.title.clone();
        let emptied = record.subscribers.is_empty();

        if let Err(e) = self.store.save(&book) {
            tracing::error!("Unsubscribe from event {event_id} not persisted: {e}");
            return;
        }
        tracing::info!("➖ User {user_id} unsubscribed from event {event_id}");

        self.dm(
            user_id,
            &format!("❌ Reminder for **{display}** cancelled."),
        )
        .await;

        if emptied {
            book.events.remove(event_id);
            if let Err(e) = self.store.save(&book) {
                tracing::error!("Removal of emptied event {event_id} not persisted: {e}");
                return;
            }
            tracing::info!("🧹 Event {event_id} removed: no subscribers left");
        }
    }

    /// Best-effort confirmation DM: failures are logged and swallowed,
    /// never retried, and never abort the enclosing transition.
    async fn dm(&self, user_id: u64, text: &str) {
        if let Err(e) = self.sink.send_direct(user_id, text).await {
            tracing::warn!("DM to user {user_id} dropped: {e}");
        }
    }

    /// One full sweep pass at an explicit instant. Loads once, decides per
    /// record, applies removals, saves exactly once — even when no record
    /// changed, so a tick is idempotent and safe to run with zero effect.
    pub(crate) async fn run_sweep_at(&self, now: DateTime<Utc>) {
        let mut book = self.store.load();

        let (channel_id, limits) = {
            let cfg = self.config.read().await;
            (
                cfg.notify.channel_id,
                SweepLimits::from_hours(cfg.notify.window_hours, cfg.notify.grace_hours),
            )
        };

        let mut due = Vec::new();
        let mut expired = Vec::new();
        for (event_id, record) in book.events.iter() {
            match sweep::assess(record, now, &limits) {
                SweepAction::Keep => {}
                SweepAction::Notify => due.push(event_id.clone()),
                SweepAction::Remove => expired.push(event_id.clone()),
            }
        }

        for event_id in &due {
            let Some(record) = book.events.get_mut(event_id) else {
                continue;
            };
            let text = format!(
                "🔔 **[STARTING SOON]** {} — reminder for subscribers:\n{}",
                record.info.title,
                embed::mention_all(&record.subscribers)
            );
            if let Err(e) = self
                .sink
                .send_broadcast(channel_id, &text, Some(embed::event_embed(&record.info)))
                .await
            {
                tracing::warn!("Reminder broadcast for event {event_id} dropped: {e}");
            }
            // One attempted send is all this record gets: the transition
            // commits regardless of delivery outcome.
            record.notified = true;
        }

        for event_id in &expired {
            if let Some(record) = book.events.remove(event_id) {
                if record.info.parse_start().is_none() {
                    tracing::warn!(
                        "🧹 Purged event {event_id}: missing or unparsable start time"
                    );
                } else {
                    tracing::info!("🧹 Reclaimed concluded event {event_id}");
                }
            }
        }

        if let Err(e) = self.store.save(&book) {
            tracing::error!("Sweep not persisted, prior snapshot stays authoritative: {e}");
        }
    }
}

/// Drive the sweep on its fixed period. The period is re-read from config
/// every pass; the loop ends once the service is gone.
pub fn spawn_sweeper(
    handle: SubscriptionHandle,
    config: Arc<RwLock<FlagwatchConfig>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let secs = { config.read().await.notify.sweep_interval_secs.max(1) };
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            if handle.is_closed() {
                break;
            }
            handle.tick().await;
        }
    })
}
