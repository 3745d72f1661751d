//! Per-player queue of direct messages that could not be delivered.

use crate::{DeliveryError, UserId};
use async_trait::async_trait;
use derive_getters::Getters;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A file sent along with a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Attachment {
    /// File name shown to the recipient.
    file_name: String,
    /// File contents.
    bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// A direct message to one player.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct OutgoingMessage {
    /// Message text.
    content: String,
    /// Optional file.
    attachment: Option<Attachment>,
}

impl OutgoingMessage {
    /// Creates a text-only message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }

    /// Creates a message carrying a file.
    pub fn with_attachment(content: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            content: content.into(),
            attachment: Some(attachment),
        }
    }
}

/// Delivers direct messages through the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `message` to `recipient`.
    async fn deliver(&self, recipient: &UserId, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// Decides when a player with undeliverable messages should be removed.
pub trait KickPolicy: Send + Sync + std::fmt::Debug {
    /// Returns `true` if a player with `pending` queued messages should be
    /// kicked. Defaults to never.
    fn should_auto_kick(&self, pending: usize) -> bool {
        let _ = pending;
        false
    }
}

/// Never kicks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverKick;

impl KickPolicy for NeverKick {}

/// Kicks once this many messages are waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickAfter(pub usize);

impl KickPolicy for KickAfter {
    fn should_auto_kick(&self, pending: usize) -> bool {
        pending >= self.0
    }
}

/// What happened to a message passed to [`PlayerOutbox::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message and everything queued before it were delivered.
    Delivered,
    /// The message was queued for a later retry.
    Queued {
        /// Messages now waiting, this one included.
        pending: usize,
        /// Whether the kick policy says to remove the player.
        kick: bool,
    },
}

/// Direct messages waiting for one player.
///
/// The queue only shrinks when a retry delivers its front message or when the
/// player is removed and the outbox is cleared.
#[derive(Debug)]
pub struct PlayerOutbox {
    owner: UserId,
    pending: VecDeque<OutgoingMessage>,
    policy: Arc<dyn KickPolicy>,
}

impl PlayerOutbox {
    /// Creates an empty outbox that never asks for a kick.
    #[instrument(fields(owner = %owner))]
    pub fn new(owner: UserId) -> Self {
        Self::with_policy(owner, Arc::new(NeverKick))
    }

    /// Creates an empty outbox with the given kick policy.
    #[instrument(skip(policy), fields(owner = %owner))]
    pub fn with_policy(owner: UserId, policy: Arc<dyn KickPolicy>) -> Self {
        debug!(?policy, "Creating outbox");
        Self {
            owner,
            pending: VecDeque::new(),
            policy,
        }
    }

    /// Returns the player this outbox belongs to.
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Returns the queued messages, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &OutgoingMessage> {
        self.pending.iter()
    }

    /// Returns the number of queued messages.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queues a message whose delivery failed.
    #[instrument(skip(self, message), fields(owner = %self.owner))]
    pub fn enqueue(&mut self, message: OutgoingMessage) {
        self.pending.push_back(message);
        debug!(pending = self.pending.len(), "Queued undelivered message");
    }

    /// Redelivers queued messages oldest first.
    ///
    /// Stops at the first failure and leaves that message and everything after
    /// it queued in order. A message leaves the queue only after it was
    /// delivered, so cancelling this future mid-delivery loses nothing.
    ///
    /// # Errors
    ///
    /// Returns the first [`DeliveryError`]; returns the number delivered
    /// otherwise.
    #[instrument(skip(self, messenger), fields(owner = %self.owner, pending = self.pending.len()))]
    pub async fn retry_all<M>(&mut self, messenger: &M) -> Result<usize, DeliveryError>
    where
        M: Messenger + ?Sized,
    {
        let mut delivered = 0;
        while let Some(message) = self.pending.front() {
            if let Err(error) = messenger.deliver(&self.owner, message).await {
                warn!(%error, delivered, remaining = self.pending.len(), "Retry stopped");
                return Err(error);
            }
            self.pending.pop_front();
            delivered += 1;
        }
        if delivered > 0 {
            info!(delivered, "Outbox drained");
        }
        Ok(delivered)
    }

    /// Sends a message, queueing it if it cannot go out now.
    ///
    /// Anything already queued is retried first so the player receives
    /// messages in the order they were sent.
    #[instrument(skip(self, messenger, message), fields(owner = %self.owner))]
    pub async fn send<M>(&mut self, messenger: &M, message: OutgoingMessage) -> SendOutcome
    where
        M: Messenger + ?Sized,
    {
        let delivered = match self.retry_all(messenger).await {
            Ok(_) => messenger.deliver(&self.owner, &message).await,
            Err(error) => Err(error),
        };
        match delivered {
            Ok(()) => SendOutcome::Delivered,
            Err(error) => {
                debug!(%error, "Delivery failed, queueing");
                self.enqueue(message);
                SendOutcome::Queued {
                    pending: self.pending.len(),
                    kick: self.should_auto_kick(),
                }
            }
        }
    }

    /// Asks the kick policy about the current queue length.
    pub fn should_auto_kick(&self) -> bool {
        self.policy.should_auto_kick(self.pending.len())
    }

    /// Drops every queued message; used when the player is removed.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub fn clear(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        debug!(dropped, "Cleared outbox");
    }
}
