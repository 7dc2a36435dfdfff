//! # Flagwatch
//! CTF reminder bot: users react to an event embed to opt in, a 30-second
//! sweep fires each reminder exactly once inside the pre-start window, and
//! a daily digest lists upcoming events.
//!
//! Usage:
//!   flagwatch                        # run with ~/.flagwatch/config.toml
//!   flagwatch --config ./dev.toml    # explicit config
//!   flagwatch --verbose              # debug logging

mod digest;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use flagwatch_channels::{DiscordGateway, DiscordRest, GatewayReaction};
use flagwatch_core::config::FlagwatchConfig;
use flagwatch_core::traits::{EventDirectory, NotificationSink};
use flagwatch_core::types::ReactionSignal;
use flagwatch_directory::DirectoryClient;
use flagwatch_subs::{SubscriptionHandle, SubscriptionService, SubscriptionStore, spawn_sweeper};

#[derive(Parser)]
#[command(name = "flagwatch", version, about = "🚩 Flagwatch — CTF reminder bot")]
struct Cli {
    /// Config file path (default: ~/.flagwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for the subscription store (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => FlagwatchConfig::load_from(path)?,
        None => FlagwatchConfig::load()?,
    };

    if config.discord.bot_token.is_empty() {
        anyhow::bail!(
            "No bot token configured. Set [discord].bot_token in {}",
            FlagwatchConfig::default_path().display()
        );
    }
    if config.notify.channel_id == 0 {
        tracing::warn!("⚠️ [notify].channel_id is not set — reminders have nowhere to go");
    }

    let data_dir = expand_home(
        cli.data_dir
            .as_deref()
            .unwrap_or(&config.store.data_dir),
    );
    let token = config.discord.bot_token.clone();

    let directory = Arc::new(DirectoryClient::new(
        &config.directory.base_url,
        config.directory.timeout_secs,
    ));
    let rest = Arc::new(DiscordRest::new(&token));
    let config = Arc::new(RwLock::new(config));

    let store = SubscriptionStore::new(&data_dir);
    tracing::info!("🚩 Flagwatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("   📂 Store: {}", store.file_path().display());

    let directory_dyn: Arc<dyn EventDirectory> = directory.clone();
    let sink_dyn: Arc<dyn NotificationSink> = rest.clone();
    let service = SubscriptionService::new(store, directory_dyn, sink_dyn, config.clone());
    let (handle, service_join) = service.spawn();

    let sweeper = spawn_sweeper(handle.clone(), config.clone());
    let digest = digest::spawn_digest(directory.clone(), rest.clone(), config.clone());

    let reactions = DiscordGateway::new(&token).start();
    let forwarder = tokio::spawn(forward_reactions(reactions, rest.clone(), handle.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    // Stop producing new commands, then let the service drain: the
    // in-flight command finishes its save before the loop ends.
    sweeper.abort();
    digest.abort();
    forwarder.abort();
    drop(handle);
    service_join.await.ok();

    Ok(())
}

/// Resolve each gateway reaction against the message it landed on and
/// forward event-marked ones to the service, strictly in arrival order.
async fn forward_reactions(
    mut reactions: flagwatch_channels::ReactionStream,
    rest: Arc<DiscordRest>,
    handle: SubscriptionHandle,
) {
    while let Some(reaction) = reactions.next().await {
        if let Some(signal) = resolve_reaction(&rest, &reaction).await {
            handle.apply(signal).await;
        }
    }
}

async fn resolve_reaction(
    rest: &DiscordRest,
    reaction: &GatewayReaction,
) -> Option<ReactionSignal> {
    let message = match rest
        .fetch_message(reaction.channel_id, reaction.message_id)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Reaction ignored, message lookup failed: {e}");
            return None;
        }
    };
    // No marker: the reaction is not event-related.
    let (event_id, title) = DiscordRest::footer_marker(&message)?;

    Some(if reaction.added {
        ReactionSignal::Added {
            event_id,
            user_id: reaction.user_id,
            title,
        }
    } else {
        ReactionSignal::Removed {
            event_id,
            user_id: reaction.user_id,
        }
    })
}
