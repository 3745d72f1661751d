//! Piles whose items carry per-instance state such as face-up/face-down.
//!
//! [`WrappingPile`] delegates every ordering and capability decision to an
//! inner [`Pile`] of wrappers. Only retrieval changes: reading an item takes a
//! `revealing` flag, and a hidden item read without revealing comes back as the
//! item type's shared "unknown" sentinel instead of its real value.

use crate::{BufferStrategy, CapabilitySet, Pile, PileError, PileHooks};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Item types that can stand in for a hidden item.
pub trait Concealed: 'static {
    /// Returns the shared sentinel shown in place of a hidden item.
    fn unknown() -> &'static Self;
}

/// A per-item wrapper built when the item enters a [`WrappingPile`].
pub trait Wrap<T: Concealed>: Sized {
    /// Wraps an item entering the pile.
    fn wrap(item: T) -> Self;

    /// Returns the real item if it is visible or `revealing` is set, and the
    /// unknown sentinel otherwise.
    fn unwrap_item(&self, revealing: bool) -> &T;

    /// Consumes the wrapper and returns the real item.
    fn into_inner(self) -> T;
}

/// Face-up/face-down state for a card-like item.
///
/// Items wrapped on entry start face down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facing<T> {
    item: T,
    face_up: bool,
}

impl<T> Facing<T> {
    /// Wraps an item face up.
    pub fn face_up(item: T) -> Self {
        Self {
            item,
            face_up: true,
        }
    }

    /// Wraps an item face down.
    pub fn face_down(item: T) -> Self {
        Self {
            item,
            face_up: false,
        }
    }

    /// Returns `true` if the item is visible to everyone.
    pub fn is_face_up(&self) -> bool {
        self.face_up
    }

    /// Turns the item over.
    pub fn flip(&mut self) {
        self.face_up = !self.face_up;
    }
}

impl<T: Concealed> Wrap<T> for Facing<T> {
    fn wrap(item: T) -> Self {
        Self::face_down(item)
    }

    fn unwrap_item(&self, revealing: bool) -> &T {
        if self.face_up || revealing {
            &self.item
        } else {
            T::unknown()
        }
    }

    fn into_inner(self) -> T {
        self.item
    }
}

/// A [`Pile`] of wrapped items.
pub struct WrappingPile<T, W = Facing<T>, H = ()> {
    pile: Pile<W, H>,
    _item: PhantomData<fn() -> T>,
}

impl<T: Concealed, W: Wrap<T>> WrappingPile<T, W> {
    /// Creates an empty wrapping pile.
    pub fn new(capabilities: CapabilitySet, strategy: Arc<dyn BufferStrategy<W>>) -> Self {
        Self::from_pile(Pile::new(capabilities, strategy))
    }

    /// Creates a wrapping pile holding `items`, each wrapped on entry.
    pub fn with_items(
        capabilities: CapabilitySet,
        strategy: Arc<dyn BufferStrategy<W>>,
        items: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::from_pile(Pile::with_items(
            capabilities,
            strategy,
            items.into_iter().map(W::wrap),
        ))
    }
}

impl<T: Concealed, W: Wrap<T>, H: PileHooks<W>> WrappingPile<T, W, H> {
    /// Wraps an existing pile of wrappers.
    pub fn from_pile(pile: Pile<W, H>) -> Self {
        Self {
            pile,
            _item: PhantomData,
        }
    }

    /// Returns the underlying pile of wrappers.
    pub fn pile(&self) -> &Pile<W, H> {
        &self.pile
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.pile.len()
    }

    /// Returns `true` if the pile holds no items.
    pub fn is_empty(&self) -> bool {
        self.pile.is_empty()
    }

    /// Returns every item top first, hiding concealed items unless `revealing`.
    pub fn browse(&self, revealing: bool) -> Result<Vec<&T>, PileError> {
        Ok(self
            .pile
            .browse()?
            .map(|w| w.unwrap_item(revealing))
            .collect())
    }

    /// Returns the top `amount` items, hiding concealed items unless `revealing`.
    pub fn peek(&self, amount: isize, revealing: bool) -> Result<Vec<&T>, PileError> {
        Ok(self
            .pile
            .peek(amount)?
            .map(|w| w.unwrap_item(revealing))
            .collect())
    }

    /// Removes every item.
    pub fn clear(&mut self) -> Result<(), PileError> {
        self.pile.clear()
    }

    /// Moves the items above `index` to the bottom.
    pub fn cut(&mut self, index: isize) -> Result<(), PileError> {
        self.pile.cut(index)
    }

    /// Removes and returns the top wrapper.
    pub fn draw(&mut self) -> Result<W, PileError> {
        self.pile.draw()
    }

    /// Removes and returns the bottom wrapper.
    pub fn draw_bottom(&mut self) -> Result<W, PileError> {
        self.pile.draw_bottom()
    }

    /// Removes and returns the wrapper at `index`.
    pub fn take_at(&mut self, index: isize) -> Result<W, PileError> {
        self.pile.take_at(index)
    }

    /// Wraps `item` and places it at `index`.
    pub fn insert_at(&mut self, index: isize, item: T) -> Result<(), PileError> {
        self.pile.insert_at(index, W::wrap(item))
    }

    /// Wraps `item` and places it on top.
    pub fn put(&mut self, item: T) -> Result<(), PileError> {
        self.pile.put(W::wrap(item))
    }

    /// Wraps `item` and places it on the bottom.
    pub fn put_bottom(&mut self, item: T) -> Result<(), PileError> {
        self.pile.put_bottom(W::wrap(item))
    }

    /// Places an already wrapped item on top, keeping its state.
    pub fn put_wrapped(&mut self, wrapped: W) -> Result<(), PileError> {
        self.pile.put(wrapped)
    }

    /// Places an already wrapped item on the bottom, keeping its state.
    pub fn put_bottom_wrapped(&mut self, wrapped: W) -> Result<(), PileError> {
        self.pile.put_bottom(wrapped)
    }
}

impl<T: Concealed, W: Wrap<T> + Clone, H: PileHooks<W>> WrappingPile<T, W, H> {
    /// Shuffles the pile uniformly at random; wrappers travel with their items.
    pub fn shuffle(&mut self) -> Result<(), PileError> {
        self.pile.shuffle()
    }
}

impl<T, W: std::fmt::Debug, H> std::fmt::Debug for WrappingPile<T, W, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappingPile")
            .field("pile", &self.pile)
            .finish()
    }
}
