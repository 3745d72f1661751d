//! Pile capabilities.
//!
//! A pile declares once, at construction, which of its operations are
//! permitted. [`Capability`] names a single operation; [`CapabilitySet`] is the
//! fixed set a pile carries for its whole life.

use serde::{Deserialize, Serialize};

/// A single permission gating one pile operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Read every item without removing anything.
    Browse,
    /// Remove every item.
    Clear,
    /// Rotate the pile around an index.
    Cut,
    /// Remove the top item.
    Draw,
    /// Remove the bottom item.
    DrawBottom,
    /// Place an item at an arbitrary index.
    Insert,
    /// Read the top N items without removing them.
    Peek,
    /// Place an item on top.
    Put,
    /// Place an item on the bottom.
    PutBottom,
    /// Reorder the whole pile.
    Shuffle,
    /// Remove the item at an arbitrary index.
    Take,
}

bitflags::bitflags! {
    /// The fixed set of operations a pile permits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u16 {
        /// Read every item without removing anything.
        const BROWSE = 1 << 0;
        /// Remove every item.
        const CLEAR = 1 << 1;
        /// Rotate the pile around an index.
        const CUT = 1 << 2;
        /// Remove the top item.
        const DRAW = 1 << 3;
        /// Remove the bottom item.
        const DRAW_BOTTOM = 1 << 4;
        /// Place an item at an arbitrary index.
        const INSERT = 1 << 5;
        /// Read the top N items without removing them.
        const PEEK = 1 << 6;
        /// Place an item on top.
        const PUT = 1 << 7;
        /// Place an item on the bottom.
        const PUT_BOTTOM = 1 << 8;
        /// Reorder the whole pile.
        const SHUFFLE = 1 << 9;
        /// Remove the item at an arbitrary index.
        const TAKE = 1 << 10;
    }
}

impl Capability {
    /// Returns the bitflag for this capability.
    pub const fn as_set(self) -> CapabilitySet {
        match self {
            Self::Browse => CapabilitySet::BROWSE,
            Self::Clear => CapabilitySet::CLEAR,
            Self::Cut => CapabilitySet::CUT,
            Self::Draw => CapabilitySet::DRAW,
            Self::DrawBottom => CapabilitySet::DRAW_BOTTOM,
            Self::Insert => CapabilitySet::INSERT,
            Self::Peek => CapabilitySet::PEEK,
            Self::Put => CapabilitySet::PUT,
            Self::PutBottom => CapabilitySet::PUT_BOTTOM,
            Self::Shuffle => CapabilitySet::SHUFFLE,
            Self::Take => CapabilitySet::TAKE,
        }
    }
}

impl From<Capability> for CapabilitySet {
    fn from(cap: Capability) -> Self {
        cap.as_set()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::empty(), |set, cap| set | cap.as_set())
    }
}

impl CapabilitySet {
    /// Returns `true` if the set permits the given operation.
    pub const fn permits(self, cap: Capability) -> bool {
        self.contains(cap.as_set())
    }
}
