//! Immutable per-channel session snapshots.
//!
//! The registry never edits a snapshot in place. Every transition builds a new
//! [`SessionState`] from the one it read and swaps it in only if nobody else
//! swapped first.

use crate::{GameHandle, UserId};
use std::collections::HashSet;
use tokio::task::AbortHandle;

/// Lifecycle phase of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Nothing is happening.
    Idle,
    /// Players may join or leave.
    Open,
    /// A game is being built from the joined players.
    Starting,
    /// A game is running.
    Active,
}

/// A lifecycle transition a caller can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Transition {
    /// Idle → open.
    Open,
    /// Add a player while open.
    Join,
    /// Remove a player while open.
    Leave,
    /// Open → idle.
    Cancel,
    /// Open → starting → active.
    Start,
    /// Active → idle.
    End,
}

/// One channel's state at one instant.
///
/// `Open` and `Active` are separate variants, so a snapshot can never be both
/// open to join and running a game.
pub(crate) enum SessionState<G> {
    Idle,
    Open {
        players: HashSet<UserId>,
    },
    Starting {
        players: HashSet<UserId>,
    },
    Active {
        players: HashSet<UserId>,
        game: GameHandle<G>,
        /// Task waiting on the game's end signal.
        watcher: AbortHandle,
    },
}

impl<G> SessionState<G> {
    pub(crate) fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Open { .. } => Phase::Open,
            Self::Starting { .. } => Phase::Starting,
            Self::Active { .. } => Phase::Active,
        }
    }

    pub(crate) fn players(&self) -> Option<&HashSet<UserId>> {
        match self {
            Self::Idle => None,
            Self::Open { players }
            | Self::Starting { players }
            | Self::Active { players, .. } => Some(players),
        }
    }

    pub(crate) fn game(&self) -> Option<&GameHandle<G>> {
        match self {
            Self::Active { game, .. } => Some(game),
            _ => None,
        }
    }
}
