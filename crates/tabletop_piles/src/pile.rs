//! Capability-gated ordered pile.
//!
//! Index 0 is the top of the pile. Items are stored bottom first so the top
//! sits at the end of the buffer. Every operation checks its capability, then
//! its index or amount, then emptiness, and only then touches the items.

use crate::{BufferStrategy, Capability, CapabilitySet, IndexFault, IndexKind, PileError};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Extension points a game can attach to a pile for its own bookkeeping.
///
/// Every method defaults to doing nothing. `()` is the no-op implementation.
pub trait PileHooks<T> {
    /// Called after a removal leaves the pile empty.
    fn on_last_removed(&mut self) {}

    /// Called after `put` or `put_bottom` stores an item.
    fn on_put(&mut self, _item: &T) {}

    /// Called after a shuffle with the order before and after.
    fn on_shuffle(&mut self, _before: &[T], _after: &[T]) {}
}

impl<T> PileHooks<T> for () {}

/// An owned, ordered collection whose permitted operations are fixed at
/// construction.
pub struct Pile<T, H = ()> {
    items: Vec<T>,
    capabilities: CapabilitySet,
    strategy: Arc<dyn BufferStrategy<T>>,
    hooks: H,
}

// ─────────────────────────────────────────────────────────────
//  Construction
// ─────────────────────────────────────────────────────────────

impl<T> Pile<T> {
    /// Creates an empty pile.
    pub fn new(capabilities: CapabilitySet, strategy: Arc<dyn BufferStrategy<T>>) -> Self {
        Self::with_hooks(capabilities, strategy, (), std::iter::empty())
    }

    /// Creates a pile holding `items`, the first item on top.
    pub fn with_items(
        capabilities: CapabilitySet,
        strategy: Arc<dyn BufferStrategy<T>>,
        items: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::with_hooks(capabilities, strategy, (), items)
    }
}

impl<T, H: PileHooks<T>> Pile<T, H> {
    /// Creates a pile holding `items`, the first item on top, with the given
    /// hooks attached.
    ///
    /// The backing buffer is acquired from `strategy` exactly once, here.
    #[instrument(skip_all, fields(capabilities = ?capabilities))]
    pub fn with_hooks(
        capabilities: CapabilitySet,
        strategy: Arc<dyn BufferStrategy<T>>,
        hooks: H,
        items: impl IntoIterator<Item = T>,
    ) -> Self {
        let items = items.into_iter();
        let mut buffer = strategy.acquire(items.size_hint().0);
        buffer.extend(items);
        buffer.reverse();
        debug!(len = buffer.len(), "Created pile");
        Self {
            items: buffer,
            capabilities,
            strategy,
            hooks,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Unrestricted queries
// ─────────────────────────────────────────────────────────────

impl<T, H> Pile<T, H> {
    /// Returns the number of items in the pile.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the pile holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the operations this pile permits.
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Returns the attached hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Returns the attached hooks mutably.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    fn require(&self, operation: Capability) -> Result<(), PileError> {
        if self.capabilities.permits(operation) {
            Ok(())
        } else {
            trace!(%operation, "Capability denied");
            Err(PileError::denied(operation))
        }
    }
}

/// Converts a top-based position in `0..=len` to a buffer offset.
fn offset(len: usize, position: usize) -> usize {
    len - position
}

/// Checks `index` against `0..=upper` and converts it.
fn bounded(index: isize, upper: usize, kind: IndexKind) -> Result<usize, PileError> {
    let index = usize::try_from(index)
        .map_err(|_| PileError::out_of_range(kind, IndexFault::Negative))?;
    if index > upper {
        return Err(PileError::out_of_range(kind, IndexFault::TooHigh));
    }
    Ok(index)
}

// ─────────────────────────────────────────────────────────────
//  Gated operations
// ─────────────────────────────────────────────────────────────

impl<T, H: PileHooks<T>> Pile<T, H> {
    /// Returns every item, top first, without removing anything.
    pub fn browse(&self) -> Result<impl ExactSizeIterator<Item = &T> + DoubleEndedIterator, PileError> {
        self.require(Capability::Browse)?;
        Ok(self.items.iter().rev())
    }

    /// Removes every item.
    #[instrument(skip(self), fields(len = self.items.len()))]
    pub fn clear(&mut self) -> Result<(), PileError> {
        self.require(Capability::Clear)?;
        self.items.clear();
        debug!("Cleared pile");
        Ok(())
    }

    /// Moves the items above `index` to the bottom.
    ///
    /// `[0..index) ++ [index..len)` becomes `[index..len) ++ [0..index)`.
    /// `cut(0)` and `cut(len)` leave the order unchanged.
    #[instrument(skip(self), fields(len = self.items.len()))]
    pub fn cut(&mut self, index: isize) -> Result<(), PileError> {
        self.require(Capability::Cut)?;
        let index = bounded(index, self.items.len(), IndexKind::Cut)?;
        // Rotating the top-first order left is rotating the stored order right.
        self.items.rotate_right(index);
        Ok(())
    }

    /// Removes and returns the top item.
    pub fn draw(&mut self) -> Result<T, PileError> {
        self.require(Capability::Draw)?;
        let item = self.items.pop().ok_or(PileError::PileEmpty)?;
        self.after_removal();
        Ok(item)
    }

    /// Removes and returns the bottom item.
    pub fn draw_bottom(&mut self) -> Result<T, PileError> {
        self.require(Capability::DrawBottom)?;
        if self.items.is_empty() {
            return Err(PileError::PileEmpty);
        }
        let item = self.items.remove(0);
        self.after_removal();
        Ok(item)
    }

    /// Places `item` so that it ends up at `index`; `index == len` places it
    /// on the bottom.
    #[instrument(skip(self, item), fields(len = self.items.len()))]
    pub fn insert_at(&mut self, index: isize, item: T) -> Result<(), PileError> {
        self.require(Capability::Insert)?;
        let len = self.items.len();
        let index = bounded(index, len, IndexKind::Insert)?;
        self.items.insert(offset(len, index), item);
        Ok(())
    }

    /// Returns the top `amount` items, top first, without removing them.
    pub fn peek(&self, amount: isize) -> Result<impl ExactSizeIterator<Item = &T> + DoubleEndedIterator, PileError> {
        self.require(Capability::Peek)?;
        let len = self.items.len();
        let amount = bounded(amount, len, IndexKind::Peek)?;
        Ok(self.items[offset(len, amount)..].iter().rev())
    }

    /// Places `item` on top.
    pub fn put(&mut self, item: T) -> Result<(), PileError> {
        self.require(Capability::Put)?;
        self.items.push(item);
        let top = self.items.len() - 1;
        self.hooks.on_put(&self.items[top]);
        Ok(())
    }

    /// Places `item` on the bottom.
    pub fn put_bottom(&mut self, item: T) -> Result<(), PileError> {
        self.require(Capability::PutBottom)?;
        self.items.insert(0, item);
        self.hooks.on_put(&self.items[0]);
        Ok(())
    }

    /// Removes and returns the item at `index`.
    #[instrument(skip(self), fields(len = self.items.len()))]
    pub fn take_at(&mut self, index: isize) -> Result<T, PileError> {
        self.require(Capability::Take)?;
        let len = self.items.len();
        let index = usize::try_from(index)
            .map_err(|_| PileError::out_of_range(IndexKind::Take, IndexFault::Negative))?;
        if index >= len {
            return Err(PileError::out_of_range(IndexKind::Take, IndexFault::TooHigh));
        }
        let item = self.items.remove(offset(len, index) - 1);
        self.after_removal();
        Ok(item)
    }

    fn after_removal(&mut self) {
        if self.items.is_empty() {
            trace!("Last item removed");
            self.hooks.on_last_removed();
        }
    }
}

/// Returns `true` if `order` holds each of `0..len` exactly once.
fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order.iter().all(|&i| i < len && !std::mem::replace(&mut seen[i], true))
}

impl<T: Clone, H: PileHooks<T>> Pile<T, H> {
    /// Shuffles the pile uniformly at random.
    #[instrument(skip(self), fields(len = self.items.len()))]
    pub fn shuffle(&mut self) -> Result<(), PileError> {
        self.shuffle_with(|len| {
            let mut order: Vec<usize> = (0..len).collect();
            order.shuffle(&mut rand::rng());
            order
        })
    }

    /// Reorders the pile with a caller-supplied algorithm.
    ///
    /// The algorithm receives the pile's length and returns the new order as
    /// top-first positions into the current order: `order[0]` names the item
    /// that becomes the new top. Anything other than a permutation of
    /// `0..len` is refused with [`PileError::NotAPermutation`] and leaves the
    /// pile untouched.
    pub fn shuffle_with(&mut self, algorithm: impl FnOnce(usize) -> Vec<usize>) -> Result<(), PileError> {
        self.require(Capability::Shuffle)?;
        let len = self.items.len();
        let order = algorithm(len);
        if !is_permutation(&order, len) {
            warn!(len, returned = order.len(), "Shuffle algorithm did not return a permutation");
            return Err(PileError::NotAPermutation);
        }
        let before: Vec<T> = self.items.iter().rev().cloned().collect();
        let after: Vec<T> = order.iter().map(|&i| before[i].clone()).collect();
        self.items.clear();
        self.items.extend(after.iter().rev().cloned());
        self.hooks.on_shuffle(&before, &after);
        Ok(())
    }
}

impl<T, H> Drop for Pile<T, H> {
    fn drop(&mut self) {
        self.strategy.release(std::mem::take(&mut self.items));
    }
}

impl<T: std::fmt::Debug, H> std::fmt::Debug for Pile<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pile")
            .field("items", &self.items)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
