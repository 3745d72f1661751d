//! Tabletop sessions - per-channel lifecycle for turn-based chat games
//!
//! Many games run at once inside one process, one per chat channel. This crate
//! tracks what each channel is doing and hands running games the pieces they
//! need from the outside world.
//!
//! # Architecture
//!
//! - **Registry**: [`SessionRegistry`] maps each [`ChannelKey`] to an immutable
//!   session snapshot and moves it through idle → open → active → idle with
//!   per-channel compare-and-swap
//! - **Games**: [`GameHandle`] owns a running game; the game ends itself by
//!   firing its [`EndSignal`]
//! - **Outbox**: [`PlayerOutbox`] queues direct messages a [`Messenger`] failed
//!   to deliver and retries them in order
//! - **Config**: [`TabletopConfig`] loads per-deployment settings from TOML
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabletop_sessions::{ChannelKey, EndSignal, SessionRegistry, UserId};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // The game keeps its end signal; dropping it would end the game.
//! struct Lobby {
//!     players: Vec<UserId>,
//!     end: Option<EndSignal>,
//! }
//!
//! let registry = Arc::new(SessionRegistry::<Lobby>::new());
//! let channel = ChannelKey::from("general");
//!
//! registry.try_open(&channel);
//! registry.add_player(&channel, &UserId::from("ada"));
//! let handle = registry.try_start(&channel, |setup| {
//!     Ok::<_, std::convert::Infallible>(Lobby {
//!         players: setup.players,
//!         end: Some(setup.end),
//!     })
//! })?;
//! assert!(registry.is_active(&channel));
//!
//! // Later, when the game is over:
//! if let Some(end) = handle.lock().await.end.take() {
//!     end.fire();
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod handle;
mod ids;
mod outbox;
mod registry;
mod state;

pub use config::{OutboxSettings, PileSettings, TabletopConfig};
pub use error::{ConfigError, DeliveryError, SessionError};
pub use handle::{EndSignal, GameHandle, GameSetup};
pub use ids::{ChannelKey, GameId, UserId};
pub use outbox::{
    Attachment, KickAfter, KickPolicy, Messenger, NeverKick, OutgoingMessage, PlayerOutbox,
    SendOutcome,
};
pub use registry::SessionRegistry;
pub use state::{Phase, Transition};
