//! Running-game handles and the one-shot end signal.

use crate::{ChannelKey, GameId, UserId};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, oneshot};
use tracing::{debug, instrument};

/// Shared handle to a running game.
///
/// The registry keeps one clone while the game is active and drops it when
/// the game ends. Commands lock the game one at a time.
pub struct GameHandle<G> {
    id: GameId,
    channel: ChannelKey,
    game: Arc<Mutex<G>>,
}

impl<G> GameHandle<G> {
    pub(crate) fn new(id: GameId, channel: ChannelKey, game: G) -> Self {
        Self {
            id,
            channel,
            game: Arc::new(Mutex::new(game)),
        }
    }

    /// Returns the registry-assigned game id.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Returns the channel the game runs in.
    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Waits for exclusive access to the game.
    pub async fn lock(&self) -> MutexGuard<'_, G> {
        self.game.lock().await
    }

    /// Returns `true` if both handles refer to the same game.
    pub fn same_game(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.game, &other.game)
    }
}

impl<G> Clone for GameHandle<G> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            channel: self.channel.clone(),
            game: Arc::clone(&self.game),
        }
    }
}

impl<G> std::fmt::Debug for GameHandle<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Single-shot notice a game sends when it is over.
///
/// Firing consumes the signal, so a game can end only once. Dropping it
/// unfired also ends the game.
#[derive(Debug)]
pub struct EndSignal {
    channel: ChannelKey,
    sender: oneshot::Sender<()>,
}

impl EndSignal {
    pub(crate) fn pair(channel: ChannelKey) -> (Self, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        (Self { channel, sender }, receiver)
    }

    /// Tells the registry this game is over.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub fn fire(self) {
        debug!("Game signalled end");
        // The receiver is gone only if the registry already retired the game.
        let _ = self.sender.send(());
    }
}

/// Everything a game factory receives when a channel starts.
#[derive(Debug)]
pub struct GameSetup {
    /// Channel the game will run in.
    pub channel: ChannelKey,
    /// Joined players, sorted by id.
    pub players: Vec<UserId>,
    /// Signal to fire when the game is over.
    ///
    /// The game must keep this for as long as it runs: dropping it unfired
    /// ends the game just like firing it.
    pub end: EndSignal,
}
