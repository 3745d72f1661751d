//! Single-writer game structures for turn-based table games.
//!
//! # Architecture
//!
//! - **Piles**: ordered, capability-gated collections ([`Pile`]) whose permitted
//!   operations are fixed when the pile is built
//! - **Wrapping piles**: [`WrappingPile`] attaches a per-item wrapper such as
//!   face-up/face-down state ([`Facing`]) without changing pile semantics
//! - **Buffers**: [`BufferStrategy`] decides where a pile's backing storage comes
//!   from ([`Fresh`] allocation or a shared [`Pooled`] set of buffers)
//! - **Turn order**: [`CircularTurnOrder`] is a ring of players with a cursor on
//!   whoever's turn it is
//!
//! Every structure here belongs to exactly one running game. None of them lock
//! internally; the caller serializes commands per game.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tabletop_piles::{CapabilitySet, Fresh, Pile, PileError, Capability};
//!
//! let caps = CapabilitySet::PEEK | CapabilitySet::PUT;
//! let mut pile = Pile::with_items(caps, Arc::new(Fresh), [1, 2, 3]);
//!
//! let top: Vec<i32> = pile.peek(2).unwrap().copied().collect();
//! assert_eq!(top, [1, 2]);
//! assert_eq!(
//!     pile.draw(),
//!     Err(PileError::CapabilityDenied { operation: Capability::Draw })
//! );
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod buffer;
mod capability;
mod error;
mod pile;
mod turn_order;
mod wrapping;

pub use buffer::{BufferStrategy, Fresh, Pooled};
pub use capability::{Capability, CapabilitySet};
pub use error::{IndexFault, IndexKind, PileError, TurnOrderError};
pub use pile::{Pile, PileHooks};
pub use turn_order::{CircularTurnOrder, JoinPosition, TurnOrderOptions, TurnStart};
pub use wrapping::{Concealed, Facing, Wrap, WrappingPile};
