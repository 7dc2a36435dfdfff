//! # Flagwatch Channels
//! Discord plumbing: the REST sink used for direct messages and channel
//! broadcasts, and the gateway websocket listener that turns reactions on
//! event embeds into opt-in/opt-out signals.

pub mod discord;
pub mod gateway;

pub use discord::DiscordRest;
pub use gateway::{DiscordGateway, GatewayReaction, ReactionStream};
