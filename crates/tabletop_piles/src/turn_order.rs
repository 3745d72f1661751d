//! Circular turn order.
//!
//! Players sit in a ring in join order: `head` joined first and `tail` last.
//! A cursor marks whose turn it is. Before the first turn the cursor may sit
//! on a "before head" position whose only move is onto `head`.
//!
//! The ring is a doubly-linked list stored in a `Vec`, with links held as
//! indices. Removing a node swaps the last node into its slot and patches the
//! indices that pointed at the moved node.

use crate::TurnOrderError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

/// Where the cursor sits before the first `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStart {
    /// The first player already holds the turn.
    #[default]
    Head,
    /// No one holds the turn; the first `advance` lands on the first player.
    BeforeHead,
}

/// Where a player joining mid-game is seated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPosition {
    /// The newcomer becomes the new head.
    BeforeHead,
    /// The newcomer becomes the new tail.
    AfterTail,
}

/// Per-game policy for a [`CircularTurnOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnOrderOptions {
    /// Initial cursor position.
    #[serde(default)]
    pub start: TurnStart,
    /// Seat for mid-game joins; `None` forbids joining after the start.
    #[serde(default)]
    pub join: Option<JoinPosition>,
    /// Whether players may be removed after the start.
    #[serde(default)]
    pub allow_removal: bool,
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    next: usize,
    prev: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeHead,
    At(usize),
}

/// A ring of players with a cursor on the player whose turn it is.
#[derive(Debug, Clone)]
pub struct CircularTurnOrder<T> {
    nodes: Vec<Node<T>>,
    head: usize,
    tail: usize,
    cursor: Cursor,
    same: fn(&T, &T) -> bool,
    options: TurnOrderOptions,
}

impl<T: PartialEq> CircularTurnOrder<T> {
    /// Builds a ring from players in join order, comparing players with `==`.
    ///
    /// # Errors
    ///
    /// Returns [`TurnOrderError::EmptyTurnOrder`] if `players` is empty.
    pub fn new(
        players: impl IntoIterator<Item = T>,
        options: TurnOrderOptions,
    ) -> Result<Self, TurnOrderError> {
        Self::with_identity(players, options, |a, b| a == b)
    }
}

impl<T> CircularTurnOrder<T> {
    /// Builds a ring from players in join order, comparing players with
    /// `same`.
    ///
    /// # Errors
    ///
    /// Returns [`TurnOrderError::EmptyTurnOrder`] if `players` is empty.
    #[instrument(skip_all, fields(options = ?options))]
    pub fn with_identity(
        players: impl IntoIterator<Item = T>,
        options: TurnOrderOptions,
        same: fn(&T, &T) -> bool,
    ) -> Result<Self, TurnOrderError> {
        let values: Vec<T> = players.into_iter().collect();
        let n = values.len();
        if n == 0 {
            return Err(TurnOrderError::EmptyTurnOrder);
        }
        let nodes = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                next: (i + 1) % n,
                prev: (i + n - 1) % n,
            })
            .collect();
        let cursor = match options.start {
            TurnStart::Head => Cursor::At(0),
            TurnStart::BeforeHead => Cursor::BeforeHead,
        };
        debug!(players = n, "Built turn order");
        Ok(Self {
            nodes,
            head: 0,
            tail: n - 1,
            cursor,
            same,
            options,
        })
    }

    /// Returns the number of seated players.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; a turn order holds at least one player.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the policy this ring was built with.
    pub fn options(&self) -> TurnOrderOptions {
        self.options
    }

    /// Returns the first player by join order.
    pub fn head(&self) -> &T {
        &self.nodes[self.head].value
    }

    /// Returns the last player by join order.
    pub fn tail(&self) -> &T {
        &self.nodes[self.tail].value
    }

    /// Returns the player whose turn it is, or `None` before the first turn.
    pub fn current(&self) -> Option<&T> {
        match self.cursor {
            Cursor::BeforeHead => None,
            Cursor::At(i) => Some(&self.nodes[i].value),
        }
    }

    /// Moves the turn one seat clockwise, wrapping from tail to head, and
    /// returns the player now holding it.
    pub fn advance(&mut self) -> &T {
        let next = match self.cursor {
            Cursor::BeforeHead => self.head,
            Cursor::At(i) => self.nodes[i].next,
        };
        self.cursor = Cursor::At(next);
        trace!(seat = next, "Advanced turn");
        &self.nodes[next].value
    }

    /// Returns `true` if the current player is the head.
    pub fn is_first(&self) -> bool {
        self.current()
            .is_some_and(|current| (self.same)(current, self.head()))
    }

    /// Returns `true` if the current player is the tail.
    pub fn is_last(&self) -> bool {
        self.current()
            .is_some_and(|current| (self.same)(current, self.tail()))
    }

    /// Returns `true` if `player` is seated.
    pub fn contains(&self, player: &T) -> bool {
        self.position(player).is_some()
    }

    /// Iterates players from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut seat = self.head;
        (0..self.nodes.len()).map(move |_| {
            let node = &self.nodes[seat];
            seat = node.next;
            &node.value
        })
    }

    fn position(&self, player: &T) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| (self.same)(&node.value, player))
    }

    /// Seats a player joining mid-game without moving the cursor.
    ///
    /// # Errors
    ///
    /// - [`TurnOrderError::JoinNotPermitted`] if the game does not allow it
    /// - [`TurnOrderError::AlreadySeated`] if the player is already seated
    #[instrument(skip_all, fields(players = self.nodes.len()))]
    pub fn insert(&mut self, player: T) -> Result<(), TurnOrderError> {
        let Some(seat) = self.options.join else {
            return Err(TurnOrderError::JoinNotPermitted);
        };
        if self.contains(&player) {
            return Err(TurnOrderError::AlreadySeated);
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            value: player,
            next: self.head,
            prev: self.tail,
        });
        let (head, tail) = (self.head, self.tail);
        self.nodes[tail].next = index;
        self.nodes[head].prev = index;
        match seat {
            JoinPosition::BeforeHead => self.head = index,
            JoinPosition::AfterTail => self.tail = index,
        }
        debug!(?seat, players = self.nodes.len(), "Seated player mid-game");
        Ok(())
    }

    /// Unseats a player and returns it.
    ///
    /// If the player held the turn, the turn passes to their successor.
    ///
    /// # Errors
    ///
    /// - [`TurnOrderError::RemovalNotPermitted`] if the game does not allow it
    /// - [`TurnOrderError::PlayerNotFound`] if the player is not seated
    /// - [`TurnOrderError::EmptyTurnOrderRemoval`] if the player is the last one
    #[instrument(skip_all, fields(players = self.nodes.len()))]
    pub fn remove(&mut self, player: &T) -> Result<T, TurnOrderError> {
        if !self.options.allow_removal {
            return Err(TurnOrderError::RemovalNotPermitted);
        }
        let index = self
            .position(player)
            .ok_or(TurnOrderError::PlayerNotFound)?;
        if self.nodes.len() == 1 {
            return Err(TurnOrderError::EmptyTurnOrderRemoval);
        }

        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        if self.head == index {
            self.head = next;
        }
        if self.tail == index {
            self.tail = prev;
        }
        if self.cursor == Cursor::At(index) {
            self.cursor = Cursor::At(next);
        }

        let last = self.nodes.len() - 1;
        let removed = self.nodes.swap_remove(index);
        if index != last {
            self.relink_moved(last, index);
        }
        debug!(players = self.nodes.len(), "Removed player");
        Ok(removed.value)
    }

    /// Patches every index that pointed at `from` after the node there moved
    /// to `to`.
    fn relink_moved(&mut self, from: usize, to: usize) {
        let remap = |seat: usize| if seat == from { to } else { seat };
        let (prev, next) = (remap(self.nodes[to].prev), remap(self.nodes[to].next));
        self.nodes[to].prev = prev;
        self.nodes[to].next = next;
        self.nodes[prev].next = to;
        self.nodes[next].prev = to;
        self.head = remap(self.head);
        self.tail = remap(self.tail);
        if let Cursor::At(seat) = self.cursor {
            self.cursor = Cursor::At(remap(seat));
        }
    }
}
