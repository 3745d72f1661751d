//! Channel-keyed session registry.
//!
//! Each channel owns an [`ArcSwap`] holding an immutable [`SessionState`].
//! Transitions read the current snapshot, build the next one, and commit with
//! compare-and-swap, retrying if another command on the same channel won the
//! race. Channels never share a lock: the map is sharded, and each transition
//! only holds a shard read guard while it works on its own channel.

use crate::state::SessionState;
use crate::{ChannelKey, EndSignal, GameHandle, GameId, GameSetup, Phase, SessionError, Transition, UserId};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

type Slot<G> = ArcSwap<SessionState<G>>;

/// Snapshot a transition replaced, and the snapshot it committed.
type Committed<G> = (Arc<SessionState<G>>, Arc<SessionState<G>>);

/// Single source of truth for what every channel is doing.
pub struct SessionRegistry<G> {
    channels: DashMap<ChannelKey, Slot<G>>,
    next_game: AtomicU64,
}

impl<G: Send + 'static> SessionRegistry<G> {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session registry");
        Self {
            channels: DashMap::new(),
            next_game: AtomicU64::new(1),
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Commit machinery
    // ─────────────────────────────────────────────────────────────

    /// Applies `step` to the channel's snapshot until the result commits,
    /// returning the replaced snapshot and the committed one.
    ///
    /// `step` may run several times; it must only compute, never act.
    fn commit<F>(
        slot: &Slot<G>,
        channel: &ChannelKey,
        attempted: Transition,
        step: F,
    ) -> Result<Committed<G>, SessionError>
    where
        F: Fn(&SessionState<G>) -> Result<SessionState<G>, SessionError>,
    {
        loop {
            let current = slot.load_full();
            let next = Arc::new(step(&*current)?);
            let previous = slot.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok((current, next));
            }
            debug!(%channel, %attempted, "Concurrent update, retrying");
        }
    }

    /// Commits a transition on an existing channel.
    fn transition<F>(
        &self,
        channel: &ChannelKey,
        attempted: Transition,
        step: F,
    ) -> Result<Committed<G>, SessionError>
    where
        F: Fn(&SessionState<G>) -> Result<SessionState<G>, SessionError>,
    {
        let slot = self
            .channels
            .get(channel)
            .ok_or_else(|| SessionError::ChannelNotFound {
                channel: channel.clone(),
            })?;
        Self::commit(&slot, channel, attempted, step)
    }

    /// Drops the channel's entry if it went back to idle.
    fn prune(&self, channel: &ChannelKey) {
        let removed = self
            .channels
            .remove_if(channel, |_, slot| slot.load().phase() == Phase::Idle);
        if removed.is_some() {
            debug!(%channel, "Pruned idle channel");
        }
    }

    fn conflict(channel: &ChannelKey, attempted: Transition, state: &SessionState<G>) -> SessionError {
        SessionError::StateConflict {
            channel: channel.clone(),
            attempted,
            actual: state.phase(),
        }
    }

    fn report(channel: &ChannelKey, attempted: Transition, result: Result<Committed<G>, SessionError>) -> bool {
        match result {
            Ok(_) => true,
            Err(error) => {
                warn!(%channel, %attempted, %error, "Transition refused");
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Lobby transitions
    // ─────────────────────────────────────────────────────────────

    /// Opens the channel for joining.
    ///
    /// Succeeds only if the channel has no session or its session is idle.
    #[instrument(skip(self), fields(channel = %channel))]
    pub fn try_open(&self, channel: &ChannelKey) -> bool {
        let slot = self
            .channels
            .entry(channel.clone())
            .or_insert_with(|| ArcSwap::from_pointee(SessionState::Idle))
            .downgrade();
        let result = Self::commit(&slot, channel, Transition::Open, |state| match state {
            SessionState::Idle => Ok(SessionState::Open {
                players: HashSet::new(),
            }),
            other => Err(Self::conflict(channel, Transition::Open, other)),
        });
        drop(slot);
        let opened = Self::report(channel, Transition::Open, result);
        if opened {
            info!("Channel opened for joining");
        }
        opened
    }

    /// Adds a user to an open channel.
    ///
    /// Returns `false` if the channel is not open or the user already joined.
    #[instrument(skip(self), fields(channel = %channel, user = %user))]
    pub fn add_player(&self, channel: &ChannelKey, user: &UserId) -> bool {
        let result = self.transition(channel, Transition::Join, |state| match state {
            SessionState::Open { players } if players.contains(user) => {
                Err(SessionError::AlreadyJoined {
                    channel: channel.clone(),
                    user: user.clone(),
                })
            }
            SessionState::Open { players } => {
                let mut players = players.clone();
                players.insert(user.clone());
                Ok(SessionState::Open { players })
            }
            other => Err(Self::conflict(channel, Transition::Join, other)),
        });
        let joined = Self::report(channel, Transition::Join, result);
        if joined {
            debug!("Player joined");
        }
        joined
    }

    /// Removes a user from an open channel.
    ///
    /// Returns `false` if the channel is not open or the user never joined.
    #[instrument(skip(self), fields(channel = %channel, user = %user))]
    pub fn remove_player(&self, channel: &ChannelKey, user: &UserId) -> bool {
        let result = self.transition(channel, Transition::Leave, |state| match state {
            SessionState::Open { players } if players.contains(user) => {
                let mut players = players.clone();
                players.remove(user);
                Ok(SessionState::Open { players })
            }
            SessionState::Open { .. } => Err(SessionError::NotJoined {
                channel: channel.clone(),
                user: user.clone(),
            }),
            other => Err(Self::conflict(channel, Transition::Leave, other)),
        });
        let left = Self::report(channel, Transition::Leave, result);
        if left {
            debug!("Player left");
        }
        left
    }

    /// Closes an open channel without starting a game and forgets its players.
    #[instrument(skip(self), fields(channel = %channel))]
    pub fn cancel(&self, channel: &ChannelKey) -> bool {
        let result = self.transition(channel, Transition::Cancel, |state| match state {
            SessionState::Open { .. } => Ok(SessionState::Idle),
            other => Err(Self::conflict(channel, Transition::Cancel, other)),
        });
        let cancelled = Self::report(channel, Transition::Cancel, result);
        if cancelled {
            self.prune(channel);
            info!("Channel cancelled");
        }
        cancelled
    }

    // ─────────────────────────────────────────────────────────────
    //  Game lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Starts a game from the channel's joined players.
    ///
    /// The channel moves to `Starting` before `factory` runs, so concurrent
    /// starts, joins, and cancels are refused while the game is built. Exactly
    /// one of several racing starts succeeds. If `factory` fails the channel
    /// goes back to `Open` with the same players.
    ///
    /// A background task waits on the game's [`EndSignal`] and retires the
    /// channel when it fires or is dropped. If `factory` panics the channel
    /// is reopened before the panic continues.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoRuntime`] outside a Tokio runtime
    /// - [`SessionError::StateConflict`] if the channel is not open
    /// - [`SessionError::GameConstruction`] if `factory` fails
    #[instrument(skip(self, factory), fields(channel = %channel))]
    pub fn try_start<F, E>(self: &Arc<Self>, channel: &ChannelKey, factory: F) -> Result<GameHandle<G>, SessionError>
    where
        F: FnOnce(GameSetup) -> Result<G, E>,
        E: Display,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let (_, starting) = self
            .transition(channel, Transition::Start, |state| match state {
                SessionState::Open { players } => Ok(SessionState::Starting {
                    players: players.clone(),
                }),
                other => Err(Self::conflict(channel, Transition::Start, other)),
            })
            .inspect_err(|error| warn!(%error, "Start refused"))?;
        let joined = starting.players().cloned().unwrap_or_default();
        let mut players: Vec<UserId> = joined.iter().cloned().collect();
        players.sort();

        let id = GameId::from(self.next_game.fetch_add(1, Ordering::Relaxed));
        let (end, ended) = EndSignal::pair(channel.clone());
        let setup = GameSetup {
            channel: channel.clone(),
            players,
            end,
        };
        let rollback = StartRollback {
            registry: self.as_ref(),
            channel,
            armed: true,
        };
        let game = match factory(setup) {
            Ok(game) => game,
            Err(reason) => {
                let reason = reason.to_string();
                warn!(%reason, "Game factory failed");
                drop(rollback);
                return Err(SessionError::GameConstruction {
                    channel: channel.clone(),
                    reason,
                });
            }
        };

        let handle = GameHandle::new(id, channel.clone(), game);
        let (arm, armed) = oneshot::channel::<()>();
        let registry = Arc::downgrade(self);
        let watched = channel.clone();
        let watcher = runtime.spawn(async move {
            // The sender is dropped unsent if the game never became active.
            if armed.await.is_err() {
                return;
            }
            // Err means the game dropped its signal unfired; the game is over either way.
            let _ = ended.await;
            Self::retire_from_watcher(registry, &watched, id);
        });
        let watcher = watcher.abort_handle();

        self.transition(channel, Transition::Start, |state| match state {
            SessionState::Starting { players } => Ok(SessionState::Active {
                players: players.clone(),
                game: handle.clone(),
                watcher: watcher.clone(),
            }),
            other => Err(Self::conflict(channel, Transition::Start, other)),
        })?;
        rollback.disarm();
        let _ = arm.send(());

        info!(game = %id, players = joined.len(), "Game started");
        Ok(handle)
    }

    /// Puts a channel left in `Starting` back to `Open` with its players.
    fn reopen(&self, channel: &ChannelKey) -> Result<Committed<G>, SessionError> {
        self.transition(channel, Transition::Start, |state| match state {
            SessionState::Starting { players } => Ok(SessionState::Open {
                players: players.clone(),
            }),
            other => Err(Self::conflict(channel, Transition::Start, other)),
        })
    }

    fn retire_from_watcher(registry: Weak<Self>, channel: &ChannelKey, id: GameId) {
        match registry.upgrade() {
            Some(registry) => {
                registry.retire(channel, id);
            }
            None => debug!(%channel, game = %id, "Registry gone before game ended"),
        }
    }

    /// Retires the channel's game only if it is still game `id`.
    fn retire(&self, channel: &ChannelKey, id: GameId) -> bool {
        let result = self.transition(channel, Transition::End, |state| match state {
            SessionState::Active { game, .. } if game.id() == id => Ok(SessionState::Idle),
            other => Err(Self::conflict(channel, Transition::End, other)),
        });
        match result {
            Ok(_) => {
                self.prune(channel);
                info!(%channel, game = %id, "Game ended");
                true
            }
            Err(error) => {
                debug!(%channel, game = %id, %error, "Game already retired");
                false
            }
        }
    }

    /// Ends whatever game is active in the channel and returns it to idle.
    ///
    /// The task watching the game's end signal is stopped, so the signal
    /// becomes a no-op afterwards.
    #[instrument(skip(self), fields(channel = %channel))]
    pub fn on_game_end(&self, channel: &ChannelKey) -> bool {
        let result = self.transition(channel, Transition::End, |state| match state {
            SessionState::Active { .. } => Ok(SessionState::Idle),
            other => Err(Self::conflict(channel, Transition::End, other)),
        });
        if let Ok((before, _)) = &result {
            if let SessionState::Active { watcher, .. } = before.as_ref() {
                watcher.abort();
            }
        }
        let ended = Self::report(channel, Transition::End, result);
        if ended {
            self.prune(channel);
            info!("Game ended by command");
        }
        ended
    }

    // ─────────────────────────────────────────────────────────────
    //  Point-in-time queries
    // ─────────────────────────────────────────────────────────────

    fn snapshot(&self, channel: &ChannelKey) -> Option<Arc<SessionState<G>>> {
        self.channels.get(channel).map(|slot| slot.load_full())
    }

    /// Returns the channel's phase; channels without a session are idle.
    pub fn phase(&self, channel: &ChannelKey) -> Phase {
        self.snapshot(channel)
            .map_or(Phase::Idle, |state| state.phase())
    }

    /// Returns `true` if players may currently join the channel.
    pub fn is_open(&self, channel: &ChannelKey) -> bool {
        self.phase(channel) == Phase::Open
    }

    /// Returns `true` if a game is currently running in the channel.
    pub fn is_active(&self, channel: &ChannelKey) -> bool {
        self.phase(channel) == Phase::Active
    }

    /// Returns the users currently joined to the channel.
    pub fn current_players(&self, channel: &ChannelKey) -> HashSet<UserId> {
        self.snapshot(channel)
            .and_then(|state| state.players().cloned())
            .unwrap_or_default()
    }

    /// Returns the channel's running game, if any.
    pub fn active_game(&self, channel: &ChannelKey) -> Option<GameHandle<G>> {
        self.snapshot(channel)
            .and_then(|state| state.game().cloned())
    }

    /// Returns the number of channels with a non-idle session.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no channel has a session.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Reopens a starting channel when dropped while still armed, which covers
/// both a failed and a panicking factory.
struct StartRollback<'a, G: Send + 'static> {
    registry: &'a SessionRegistry<G>,
    channel: &'a ChannelKey,
    armed: bool,
}

impl<G: Send + 'static> StartRollback<'_, G> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<G: Send + 'static> Drop for StartRollback<'_, G> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            warn!(channel = %self.channel, "Game factory panicked, reopening channel");
        }
        match self.registry.reopen(self.channel) {
            Ok(_) => info!(channel = %self.channel, "Channel reopened after failed start"),
            Err(error) => warn!(channel = %self.channel, %error, "Could not reopen channel"),
        }
    }
}

impl<G: Send + 'static> Default for SessionRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> std::fmt::Debug for SessionRegistry<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}
