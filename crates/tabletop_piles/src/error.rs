//! Error types for piles and turn orders.

use crate::Capability;
use derive_more::{Display, Error};

/// Which indexed operation rejected its index or amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IndexKind {
    /// `cut(index)`.
    #[display("cut")]
    Cut,
    /// `insert_at(index, item)`.
    #[display("insert")]
    Insert,
    /// `peek(amount)`.
    #[display("peek")]
    Peek,
    /// `take_at(index)`.
    #[display("take")]
    Take,
}

/// Why an index or amount was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IndexFault {
    /// The value was below zero.
    #[display("is negative")]
    Negative,
    /// The value was past the end of the pile.
    #[display("is too high")]
    TooHigh,
}

/// Error returned by pile operations.
///
/// Every variant is raised before the pile is touched, so a failed operation
/// never leaves a partial change behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PileError {
    /// The pile was not built with the capability this operation needs.
    #[display("This pile does not permit {operation}")]
    CapabilityDenied {
        /// The denied operation.
        operation: Capability,
    },

    /// An index or amount fell outside the pile.
    #[display("The {kind} index {reason}")]
    IndexOutOfRange {
        /// Operation that received the index.
        kind: IndexKind,
        /// Which bound was violated.
        reason: IndexFault,
    },

    /// The pile has no items to remove.
    #[display("The pile is empty")]
    PileEmpty,

    /// A shuffle algorithm returned something other than a reordering of
    /// every item.
    #[display("The shuffle did not return a permutation of the pile")]
    NotAPermutation,
}

impl PileError {
    pub(crate) fn denied(operation: Capability) -> Self {
        Self::CapabilityDenied { operation }
    }

    pub(crate) fn out_of_range(kind: IndexKind, reason: IndexFault) -> Self {
        Self::IndexOutOfRange { kind, reason }
    }
}

/// Error returned by [`CircularTurnOrder`](crate::CircularTurnOrder) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum TurnOrderError {
    /// A turn order cannot be built without players.
    #[display("A turn order needs at least one player")]
    EmptyTurnOrder,

    /// Removing the only remaining player would empty the ring.
    #[display("Cannot remove the last remaining player; end the game instead")]
    EmptyTurnOrderRemoval,

    /// The player is not seated in the ring.
    #[display("Player is not in the turn order")]
    PlayerNotFound,

    /// The player is already seated in the ring.
    #[display("Player is already in the turn order")]
    AlreadySeated,

    /// This game does not allow joining after the start.
    #[display("This game does not allow joining mid-game")]
    JoinNotPermitted,

    /// This game does not allow leaving after the start.
    #[display("This game does not allow removing players mid-game")]
    RemovalNotPermitted,
}
