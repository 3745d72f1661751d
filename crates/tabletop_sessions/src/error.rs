//! Error types for sessions, delivery, and configuration.

use crate::{ChannelKey, Phase, Transition, UserId};
use derive_more::{Display, Error};
use tracing::instrument;

/// Error returned when a session transition is refused.
///
/// Refusals never leave a partial change behind: either the whole transition
/// committed or nothing did.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// The channel was not in a phase that allows the transition.
    #[display("Cannot {attempted} channel {channel} while it is {actual}")]
    StateConflict {
        /// Channel the transition targeted.
        channel: ChannelKey,
        /// Transition that was attempted.
        attempted: Transition,
        /// Phase the channel was actually in.
        actual: Phase,
    },

    /// The channel has no session at all.
    #[display("Channel {channel} has no session")]
    ChannelNotFound {
        /// Channel the transition targeted.
        channel: ChannelKey,
    },

    /// The user already joined this channel's session.
    #[display("{user} already joined channel {channel}")]
    AlreadyJoined {
        /// Channel the user tried to join.
        channel: ChannelKey,
        /// The user.
        user: UserId,
    },

    /// The user is not part of this channel's session.
    #[display("{user} has not joined channel {channel}")]
    NotJoined {
        /// Channel the user tried to leave.
        channel: ChannelKey,
        /// The user.
        user: UserId,
    },

    /// The game factory refused to build a game.
    #[display("Failed to start game in channel {channel}: {reason}")]
    GameConstruction {
        /// Channel whose game failed to build.
        channel: ChannelKey,
        /// Factory's explanation.
        reason: String,
    },

    /// Starting a game needs a Tokio runtime to watch for its end.
    #[display("No Tokio runtime available to supervise the game")]
    NoRuntime,
}

/// Error returned by a [`Messenger`](crate::Messenger) that could not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    /// Intended recipient.
    pub recipient: UserId,
    /// Platform's explanation.
    pub reason: String,
}

impl DeliveryError {
    /// Creates a delivery error for `recipient`.
    pub fn new(recipient: UserId, reason: impl Into<String>) -> Self {
        Self {
            recipient,
            reason: reason.into(),
        }
    }
}

/// Configuration error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new config error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
