//! Concurrent lifecycle rehearsal behind `tabletop stress`.
//!
//! Every channel opens, takes a burst of concurrent joins, races two starts,
//! plays one round with a deck and turn order, and ends its game. The report
//! counts lost joins and double starts, both of which must stay at zero.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tabletop_piles::{CapabilitySet, CircularTurnOrder, Pile, PileError, Pooled, TurnOrderError};
use tabletop_sessions::{
    ChannelKey, DeliveryError, EndSignal, GameSetup, Messenger, OutgoingMessage, Phase,
    PlayerOutbox, SendOutcome, SessionRegistry, TabletopConfig, UserId,
};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Polls before a channel that should be idle is reported as stuck.
const IDLE_POLLS: usize = 400;

/// Minimal game: a shuffled deck, a turn order, and an outbox per player.
struct RehearsalGame {
    turns: CircularTurnOrder<UserId>,
    deck: Pile<u32>,
    outboxes: HashMap<UserId, PlayerOutbox>,
    end: Option<EndSignal>,
}

impl RehearsalGame {
    fn build(
        setup: GameSetup,
        config: &TabletopConfig,
        pool: &Pooled<u32>,
    ) -> Result<Self, TurnOrderError> {
        let GameSetup { players, end, .. } = setup;
        let outboxes = players
            .iter()
            .map(|p| (p.clone(), PlayerOutbox::with_policy(p.clone(), config.kick_policy())))
            .collect();
        let turns = CircularTurnOrder::new(players, *config.turn_order())?;
        let mut deck = Pile::with_items(
            CapabilitySet::SHUFFLE | CapabilitySet::DRAW,
            config.buffer_strategy(pool),
            1..=52,
        );
        if let Err(error) = deck.shuffle() {
            warn!(%error, "Deck refused to shuffle");
        }
        Ok(Self {
            turns,
            deck,
            outboxes,
            end: Some(end),
        })
    }

    /// Deals one card per seat, then ends the game. Returns the number of
    /// messages left queued.
    async fn play_round<M: Messenger>(&mut self, messenger: &M) -> usize {
        let mut kicks = Vec::new();
        for _ in 0..self.turns.len() {
            let player = self.turns.advance().clone();
            let card = match self.deck.draw() {
                Ok(card) => card,
                Err(PileError::PileEmpty) => break,
                Err(error) => {
                    warn!(%error, "Draw refused");
                    break;
                }
            };
            let Some(outbox) = self.outboxes.get_mut(&player) else {
                continue;
            };
            let message = OutgoingMessage::text(format!("You drew card {card}"));
            if let SendOutcome::Queued { kick: true, .. } = outbox.send(messenger, message).await {
                kicks.push(player);
            }
        }
        for player in kicks {
            match self.turns.remove(&player) {
                Ok(_) => {
                    if let Some(mut outbox) = self.outboxes.remove(&player) {
                        outbox.clear();
                    }
                }
                Err(error) => debug!(%player, %error, "Kick not applied"),
            }
        }
        if let Some(end) = self.end.take() {
            end.fire();
        }
        self.outboxes.values().map(PlayerOutbox::len).sum()
    }
}

/// Rejects every user whose id ends in `0`, standing in for closed DMs.
struct FlakyMessenger;

#[async_trait]
impl Messenger for FlakyMessenger {
    async fn deliver(&self, recipient: &UserId, _message: &OutgoingMessage) -> Result<(), DeliveryError> {
        if recipient.to_string().ends_with('0') {
            Err(DeliveryError::new(recipient.clone(), "direct messages closed"))
        } else {
            Ok(())
        }
    }
}

/// Totals across every rehearsed channel.
#[derive(Debug, Default)]
pub struct StressReport {
    /// Channels rehearsed.
    pub channels: usize,
    /// Joins that were refused, or accepted but missing afterwards.
    pub lost_joins: usize,
    /// Channels where more than one start succeeded.
    pub double_starts: usize,
    /// Channels where no start succeeded.
    pub failed_starts: usize,
    /// Messages still queued when games ended.
    pub queued_messages: usize,
}

impl std::fmt::Display for StressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "channels={} lost_joins={} double_starts={} failed_starts={} queued_messages={}",
            self.channels, self.lost_joins, self.double_starts, self.failed_starts, self.queued_messages
        )
    }
}

struct ChannelOutcome {
    lost_joins: usize,
    started: usize,
    queued: usize,
}

/// Rehearses `channels` channels with `players` joins each.
#[instrument(skip(config))]
pub async fn run(config: TabletopConfig, channels: usize, players: usize) -> Result<StressReport> {
    let registry = Arc::new(SessionRegistry::<RehearsalGame>::new());
    let pool = Pooled::new();
    let mut tasks = JoinSet::new();
    for index in 0..channels {
        tasks.spawn(run_channel(
            Arc::clone(&registry),
            config.clone(),
            pool.clone(),
            index,
            players,
        ));
    }

    let mut report = StressReport::default();
    while let Some(outcome) = tasks.join_next().await {
        let outcome = outcome??;
        report.channels += 1;
        report.lost_joins += outcome.lost_joins;
        report.queued_messages += outcome.queued;
        match outcome.started {
            0 => report.failed_starts += 1,
            1 => {}
            _ => report.double_starts += 1,
        }
    }
    info!(%report, pooled_buffers = pool.idle(), "Rehearsal finished");
    Ok(report)
}

async fn run_channel(
    registry: Arc<SessionRegistry<RehearsalGame>>,
    config: TabletopConfig,
    pool: Pooled<u32>,
    index: usize,
    players: usize,
) -> Result<ChannelOutcome> {
    let channel = ChannelKey::from(format!("channel-{index}"));
    if !registry.try_open(&channel) {
        bail!("channel {channel} failed to open");
    }

    let mut joins = JoinSet::new();
    for seat in 0..players {
        let registry = Arc::clone(&registry);
        let channel = channel.clone();
        let user = UserId::from(format!("{channel}-user-{seat}"));
        joins.spawn(async move { registry.add_player(&channel, &user) });
    }
    let mut accepted: usize = 0;
    while let Some(joined) = joins.join_next().await {
        if joined? {
            accepted += 1;
        }
    }
    let seated = registry.current_players(&channel).len();
    let lost_joins = accepted.abs_diff(seated) + players.abs_diff(accepted);

    let mut starts = JoinSet::new();
    for _ in 0..2 {
        let registry = Arc::clone(&registry);
        let channel = channel.clone();
        let config = config.clone();
        let pool = pool.clone();
        starts.spawn(async move {
            registry
                .try_start(&channel, |setup| RehearsalGame::build(setup, &config, &pool))
                .ok()
        });
    }
    let mut handles = Vec::new();
    while let Some(started) = starts.join_next().await {
        handles.extend(started?);
    }

    let queued = match handles.first() {
        Some(handle) => handle.lock().await.play_round(&FlakyMessenger).await,
        None => 0,
    };
    let started = handles.len();
    drop(handles);

    if started > 0 {
        wait_for_idle(&registry, &channel).await?;
    } else {
        registry.cancel(&channel);
    }
    Ok(ChannelOutcome {
        lost_joins,
        started,
        queued,
    })
}

async fn wait_for_idle(registry: &SessionRegistry<RehearsalGame>, channel: &ChannelKey) -> Result<()> {
    for _ in 0..IDLE_POLLS {
        if registry.phase(channel) == Phase::Idle {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bail!("channel {channel} never returned to idle")
}
