//! The arena event loop.
//!
//! One actor per arena serializes every event source (joins, moves, timer
//! fires, finalize requests) over a single mailbox. The actor drives the
//! pure state machine and the game engine, persists each transition through
//! the CAS store, and owes the scheduler exactly the timer work each
//! transition names. Per-event failures are logged and answered; an
//! invariant violation freezes this arena without touching the rest of the
//! fleet.

use crate::arena::ingress::{ArenaEvent, ArenaMailbox, FinalizeOutcome};
use crate::arena::machine::{self, CloseOutcome, JoinEffect, Timings};
use crate::backoff::RetryPolicy;
use crate::chain::ChainAdapter;
use crate::clock::Clock;
use crate::scheduler::{SchedulerHandle, TimerKey, TimerKind};
use crate::signer::{self, SigningService};
use crate::store::{ArenaStore, PayoutRecord, RefundIntent};
use claw_engine::{Game, GameError, Move, MoveOutcome, RoundOutcome};
use claw_types::{
    economy, Address, Arena, ArenaError, FinalizeError, GameStatus, StoreError, Tier, U256,
};
use futures::channel::mpsc;
use futures::StreamExt;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MAILBOX_SIZE: usize = 64;

/// Fleet-level notifications consumed by the service and the host agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArenaNotice {
    /// Registration closed with a viable lobby (the tier "filled").
    Closed { arena: Address, tier: Tier },
    /// Reaped or expired under-filled (the tier "failed to fill").
    Cancelled { arena: Address, tier: Tier },
    Finalized { arena: Address, at_ms: u64 },
}

/// Injected collaborators, shared by every arena actor.
pub struct ArenaDeps {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn ArenaStore>,
    pub chain: Arc<dyn ChainAdapter>,
    pub signer: Arc<dyn SigningService>,
    pub scheduler: SchedulerHandle,
    pub notices: mpsc::UnboundedSender<ArenaNotice>,
    pub chain_id: u64,
    pub timings: Timings,
}

pub struct ArenaActor {
    arena: Arena,
    version: u64,
    game: Option<Game>,
    deps: Arc<ArenaDeps>,
    mailbox: mpsc::Receiver<ArenaEvent>,
}

impl ArenaActor {
    pub fn new(arena: Arena, version: u64, deps: Arc<ArenaDeps>) -> (Self, ArenaMailbox) {
        let (sender, mailbox) = mpsc::channel(MAILBOX_SIZE);
        (
            Self {
                arena,
                version,
                game: None,
                deps,
                mailbox,
            },
            ArenaMailbox::new(sender),
        )
    }

    pub fn spawn(arena: Arena, version: u64, deps: Arc<ArenaDeps>) -> (ArenaMailbox, JoinHandle<()>) {
        let (actor, mailbox) = Self::new(arena, version, deps);
        let handle = tokio::spawn(actor.run());
        (mailbox, handle)
    }

    fn key(&self, kind: TimerKind) -> TimerKey {
        TimerKey {
            arena: self.arena.address,
            kind,
        }
    }

    fn tier(&self) -> Tier {
        Tier::classify(self.arena.config.entry_fee)
    }

    fn notify(&self, notice: ArenaNotice) {
        let _ = self.deps.notices.unbounded_send(notice);
    }

    pub async fn run(mut self) {
        self.arm_initial_timers();
        debug!(arena = %format!("{:#x}", self.arena.address), "arena actor online");

        while let Some(event) = self.mailbox.next().await {
            match event {
                ArenaEvent::Join {
                    player,
                    deadline_ms,
                    response,
                } => {
                    let result = self.handle_join(player, deadline_ms).await;
                    let _ = response.send(result);
                }
                ArenaEvent::SubmitMove {
                    player,
                    mv,
                    deadline_ms,
                    response,
                } => {
                    let result = self.handle_submit(player, mv, deadline_ms).await;
                    let _ = response.send(result);
                }
                ArenaEvent::TimerFired { kind } => self.handle_timer(kind).await,
                ArenaEvent::Finalize { response } => {
                    let result = self.process_winners().await;
                    let _ = response.send(result);
                }
                ArenaEvent::Snapshot { response } => {
                    let _ = response.send(self.arena.clone());
                }
                ArenaEvent::Shutdown => break,
            }
        }
        debug!(arena = %format!("{:#x}", self.arena.address), "arena actor stopped");
    }

    /// Timers owed by the arena's state at spawn: the idle-reap window for
    /// an under-filled open lobby, and the registration deadline if set.
    fn arm_initial_timers(&self) {
        if self.arena.frozen || self.arena.is_terminal() || self.arena.is_closed {
            return;
        }
        let now = self.deps.clock.now_ms();
        if self.arena.player_count() <= 1 {
            self.deps.scheduler.schedule(
                self.key(TimerKind::IdleReap),
                now + self.deps.timings.idle_reap_ms,
            );
        }
        if let Some(deadline) = self.arena.config.registration_deadline_ms {
            // Rides the round-deadline slot; no game exists before close, so
            // the kinds cannot collide.
            self.deps
                .scheduler
                .schedule(self.key(TimerKind::RoundDeadline), deadline.max(now));
        }
    }

    async fn handle_join(&mut self, player: Address, deadline_ms: u64) -> Result<u32, ArenaError> {
        let now = self.deps.clock.now_ms();
        if now > deadline_ms {
            return Err(ArenaError::DeadlineExceeded);
        }

        // Pre-join sanity check against the escrow. Advisory: adapter
        // outages must not block registration.
        match self
            .deps
            .chain
            .has_player_joined(&self.arena.address, &player)
        {
            Ok(true) => {}
            Ok(false) => return Err(ArenaError::NotPaidIn),
            Err(err) => warn!(%err, "escrow pre-join check unavailable; continuing"),
        }

        let mut next = self.arena.clone();
        let effect = machine::apply_join(&mut next, player, now, &self.deps.timings)?;
        self.commit(next).await?;

        if let Err(err) = self
            .deps
            .store
            .update_leaderboard(&player, 0, U256::zero(), 1)
        {
            warn!(%err, "leaderboard games-played update failed");
        }

        match effect {
            JoinEffect::FirstJoin { reap_at_ms } => {
                self.deps
                    .scheduler
                    .schedule(self.key(TimerKind::IdleReap), reap_at_ms);
            }
            JoinEffect::LobbyFull { countdown_at_ms } => {
                self.deps.scheduler.cancel(self.key(TimerKind::IdleReap));
                self.deps.scheduler.cancel(self.key(TimerKind::RoundDeadline));
                self.deps
                    .scheduler
                    .schedule(self.key(TimerKind::GameStartCountdown), countdown_at_ms);
                self.notify(ArenaNotice::Closed {
                    arena: self.arena.address,
                    tier: self.tier(),
                });
                info!(
                    arena = %format!("{:#x}", self.arena.address),
                    players = self.arena.player_count(),
                    "lobby full, countdown scheduled"
                );
            }
            JoinEffect::None => {}
        }
        Ok(self.arena.player_count())
    }

    async fn handle_submit(
        &mut self,
        player: Address,
        mv: Move,
        deadline_ms: u64,
    ) -> Result<MoveOutcome, ArenaError> {
        let now = self.deps.clock.now_ms();
        if now > deadline_ms {
            return Err(ArenaError::DeadlineExceeded);
        }
        if self.arena.frozen {
            return Err(ArenaError::Frozen);
        }
        if self.arena.game_status != GameStatus::Active {
            return Err(ArenaError::GameNotActive(self.arena.game_status.as_str()));
        }
        let game = self
            .game
            .as_mut()
            .ok_or(ArenaError::GameNotActive("missing"))?;

        let outcome = game.submit_move(player, mv).map_err(map_game_error)?;
        if outcome.round_resolved {
            self.deps.scheduler.cancel(self.key(TimerKind::RoundDeadline));
            self.advance_round(now).await;
        }
        Ok(outcome)
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        if self.arena.frozen {
            return;
        }
        let now = self.deps.clock.now_ms();
        match kind {
            TimerKind::IdleReap => {
                let mut next = self.arena.clone();
                match machine::apply_idle_reap(&mut next, now) {
                    Ok(outcome) => self.apply_close_outcome(next, outcome, now).await,
                    Err(err) => warn!(%err, "idle reap rejected"),
                }
            }
            TimerKind::GameStartCountdown => self.start_learning(now).await,
            TimerKind::RoundDeadline => match self.arena.game_status {
                // Before close, this slot carries the registration deadline.
                GameStatus::None => {
                    let mut next = self.arena.clone();
                    match machine::apply_registration_deadline(&mut next, now, &self.deps.timings) {
                        Ok(outcome) => self.apply_close_outcome(next, outcome, now).await,
                        Err(err) => warn!(%err, "registration deadline rejected"),
                    }
                }
                GameStatus::Learning => self.start_round_one(now).await,
                GameStatus::Active => self.advance_round(now).await,
                _ => debug!(kind = kind.as_str(), "stale timer ignored"),
            },
            TimerKind::AgentCycle => {
                warn!("agent cycle timer routed to an arena actor");
            }
        }
    }

    async fn apply_close_outcome(&mut self, next: Arena, outcome: CloseOutcome, now: u64) {
        match outcome {
            CloseOutcome::Lapsed => {}
            CloseOutcome::CancelledEmpty => {
                if self.commit(next).await.is_ok() {
                    self.cancel_all_timers();
                    self.notify(ArenaNotice::Cancelled {
                        arena: self.arena.address,
                        tier: self.tier(),
                    });
                    info!(arena = %format!("{:#x}", self.arena.address), "empty lobby cancelled");
                }
            }
            CloseOutcome::CancelledRefund { player } => {
                if self.commit(next).await.is_ok() {
                    self.cancel_all_timers();
                    self.issue_refund(player, now);
                    self.notify(ArenaNotice::Cancelled {
                        arena: self.arena.address,
                        tier: self.tier(),
                    });
                    info!(
                        arena = %format!("{:#x}", self.arena.address),
                        player = %format!("{player:#x}"),
                        "sole-player lobby cancelled with refund"
                    );
                }
            }
            CloseOutcome::Closed { countdown_at_ms } => {
                if self.commit(next).await.is_ok() {
                    self.deps.scheduler.cancel(self.key(TimerKind::IdleReap));
                    self.deps
                        .scheduler
                        .schedule(self.key(TimerKind::GameStartCountdown), countdown_at_ms);
                    self.notify(ArenaNotice::Closed {
                        arena: self.arena.address,
                        tier: self.tier(),
                    });
                }
            }
        }
    }

    fn cancel_all_timers(&self) {
        for kind in [
            TimerKind::IdleReap,
            TimerKind::GameStartCountdown,
            TimerKind::RoundDeadline,
        ] {
            self.deps.scheduler.cancel(self.key(kind));
        }
    }

    /// Refund intent: an off-chain record plus a request to the chain
    /// adapter. The escrow owns execution.
    fn issue_refund(&self, player: Address, now: u64) {
        let amount = self.arena.config.entry_fee;
        if let Err(err) = self.deps.store.append_refund_intent(RefundIntent {
            arena: self.arena.address,
            player,
            amount,
            recorded_at_ms: now,
        }) {
            warn!(%err, "refund intent not persisted");
        }
        if let Err(err) = self.deps.chain.request_refund(&self.arena.address, &player, amount) {
            warn!(%err, "refund request not delivered to chain adapter");
        }
    }

    /// Countdown fired: create the game and enter the learning phase.
    async fn start_learning(&mut self, now: u64) {
        if self.arena.game_status != GameStatus::Waiting || self.game.is_some() {
            debug!("countdown fired out of phase; ignored");
            return;
        }
        let game = Game::new(
            self.arena.address,
            self.arena.config.game_type,
            &self.arena.players,
            now,
        );
        let mut next = self.arena.clone();
        let learning_end =
            match machine::apply_countdown(&mut next, game.id.clone(), now, &self.deps.timings) {
                Ok(end) => end,
                Err(err) => {
                    warn!(%err, "countdown rejected");
                    return;
                }
            };
        if self.commit(next).await.is_err() {
            return;
        }
        let mut game = game;
        if let Err(err) = game.begin_learning() {
            error!(%err, "freshly created game refused learning phase");
            return;
        }
        info!(
            arena = %format!("{:#x}", self.arena.address),
            game = %game.id,
            game_type = %game.game_type,
            players = game.join_order.len(),
            "learning phase started"
        );
        self.game = Some(game);
        self.deps
            .scheduler
            .schedule(self.key(TimerKind::RoundDeadline), learning_end);
    }

    /// Learning window elapsed: activate the game and arm round one.
    async fn start_round_one(&mut self, now: u64) {
        let Some(game) = self.game.as_mut() else {
            warn!("learning deadline with no game");
            return;
        };
        let deadline = match game.activate(now) {
            Ok(deadline) => deadline,
            Err(err) => {
                warn!(%err, "activation rejected");
                return;
            }
        };
        let mut next = self.arena.clone();
        if let Err(err) = next.begin_active(now) {
            warn!(%err, "arena refused activation");
            return;
        }
        if self.commit(next).await.is_ok() {
            let deadline = self.deps.timings.cap_round_deadline(now, deadline);
            self.deps
                .scheduler
                .schedule(self.key(TimerKind::RoundDeadline), deadline);
        }
    }

    /// Round deadline passed or all moves are in: resolve, then either arm
    /// the next round or finish and run the winner pipeline.
    async fn advance_round(&mut self, now: u64) {
        let deadline_key = self.key(TimerKind::RoundDeadline);
        let Some(game) = self.game.as_mut() else {
            warn!("round deadline with no game");
            return;
        };
        match game.resolve_round(now) {
            Ok(RoundOutcome::Advanced { deadline_ms, .. }) => {
                let deadline_ms = self.deps.timings.cap_round_deadline(now, deadline_ms);
                self.deps
                    .scheduler
                    .schedule(deadline_key, deadline_ms);
            }
            Ok(RoundOutcome::Finished { winners }) => {
                self.deps.scheduler.cancel(deadline_key);
                let results = game.results();
                let mut next = self.arena.clone();
                if let Err(err) = next.finish(winners, results, now) {
                    warn!(%err, "arena refused finish");
                    return;
                }
                if self.commit(next).await.is_err() {
                    return;
                }
                info!(
                    arena = %format!("{:#x}", self.arena.address),
                    winners = ?self.arena.winners,
                    "game finished"
                );
                if let Err(err) = self.process_winners().await {
                    warn!(%err, "winner processing failed");
                }
            }
            Err(err) => warn!(%err, "round resolution rejected"),
        }
    }

    /// The `process_winners` pipeline: payout split → validation → digest →
    /// signature → record. At most one finalize ever succeeds per arena.
    async fn process_winners(&mut self) -> Result<FinalizeOutcome, FinalizeError> {
        if self.arena.frozen {
            return Err(FinalizeError::ArenaNotClosed);
        }
        let winners = self.arena.winners.clone();
        let nonce = self.arena.used_nonce + 1;

        let split = match economy::split(
            self.arena.config.entry_fee,
            self.arena.player_count(),
            self.arena.config.protocol_fee_bps,
            winners.len().max(1),
            self.arena.config.payout_scheme,
        ) {
            Ok(split) => split,
            Err(violation) => {
                self.freeze(&violation.to_string()).await;
                return Err(FinalizeError::PayoutExceedsEscrow);
            }
        };
        let amounts = split.payouts.clone();

        signer::validate_finalize(&self.arena, &winners, &amounts, nonce)?;

        let digest = signer::finalize_digest(
            self.deps.chain_id,
            &self.arena.address,
            &winners,
            &amounts,
            nonce,
        );
        let signature = self.sign_with_retry(digest).await?;

        if signer::recover_operator(digest, &signature) != Some(self.deps.signer.operator()) {
            self.freeze("finalize signature does not recover to the operator")
                .await;
            return Err(FinalizeError::SigningServiceUnavailable);
        }

        let now = self.deps.clock.now_ms();
        let mut next = self.arena.clone();
        next.record_finalization(amounts.clone(), signature.to_vec(), nonce, now)
            .map_err(|_| FinalizeError::AlreadyFinalized)?;
        if let Err(violation) = next.check_invariants() {
            self.freeze(&violation.to_string()).await;
            return Err(FinalizeError::InvalidWinner);
        }
        self.commit(next)
            .await
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?;

        for (winner, amount) in winners.iter().zip(amounts.iter()) {
            if let Err(err) = self.deps.store.append_payout_record(PayoutRecord {
                arena: self.arena.address,
                winner: *winner,
                amount: *amount,
                recorded_at_ms: now,
            }) {
                warn!(%err, "payout record not persisted");
            }
            if let Err(err) = self.deps.store.update_leaderboard(winner, 1, *amount, 0) {
                warn!(%err, "leaderboard win update failed");
            }
        }

        self.notify(ArenaNotice::Finalized {
            arena: self.arena.address,
            at_ms: now,
        });
        info!(
            arena = %format!("{:#x}", self.arena.address),
            nonce,
            pool = %split.pool,
            fee = %split.fee,
            winners = winners.len(),
            "finalize authorization signed"
        );

        Ok(FinalizeOutcome {
            winners,
            payouts: self.arena.payouts.clone(),
            nonce,
            signature: signature.to_vec(),
        })
    }

    async fn sign_with_retry(
        &self,
        digest: claw_types::H256,
    ) -> Result<signer::RecoverableSignature, FinalizeError> {
        let policy = RetryPolicy::transient();
        let mut rng = StdRng::from_entropy();
        for attempt in 0..policy.max_attempts {
            match self.deps.signer.sign_digest(digest) {
                Ok(signature) => return Ok(signature),
                Err(err) => {
                    if attempt + 1 == policy.max_attempts {
                        error!(%err, attempt, "signing service exhausted retries");
                        break;
                    }
                    let delay = policy.jittered_delay(attempt, &mut rng);
                    warn!(%err, attempt, ?delay, "signing failed; backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(FinalizeError::SigningServiceUnavailable)
    }

    /// Persist `next` through the CAS store and adopt it on success.
    /// Conflicts mean the leadership assumption was broken; the actor logs,
    /// adopts the store's version counter and retries so the document
    /// converges on this actor's view.
    async fn commit(&mut self, next: Arena) -> Result<(), ArenaError> {
        let policy = RetryPolicy::transient();
        let mut rng = StdRng::from_entropy();
        let mut expected = self.version;
        for attempt in 0..policy.max_attempts {
            match self
                .deps
                .store
                .update_arena(&self.arena.address, expected, &next)
            {
                Ok(version) => {
                    self.arena = next;
                    self.version = version;
                    return Ok(());
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    error!(
                        arena = %format!("{:#x}", self.arena.address),
                        expected, actual,
                        "version conflict: concurrent writer on a led arena"
                    );
                    expected = actual;
                }
                Err(StoreError::NotFound) => {
                    return Err(ArenaError::NotFound);
                }
                Err(StoreError::Backend(reason)) => {
                    if attempt + 1 == policy.max_attempts {
                        return Err(ArenaError::Storage(reason));
                    }
                    let delay = policy.jittered_delay(attempt, &mut rng);
                    warn!(%reason, attempt, ?delay, "store write failed; backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(ArenaError::Storage("update retries exhausted".into()))
    }

    async fn freeze(&mut self, reason: &str) {
        error!(
            arena = %format!("{:#x}", self.arena.address),
            reason,
            "invariant violation; freezing arena"
        );
        self.arena.freeze();
        let frozen = self.arena.clone();
        if let Err(err) = self.commit(frozen).await {
            error!(%err, "frozen arena could not be persisted");
        }
        self.cancel_all_timers();
    }
}

fn map_game_error(err: GameError) -> ArenaError {
    match err {
        GameError::NotActive(phase) => ArenaError::GameNotActive(phase),
        GameError::NotAParticipant(player) => ArenaError::NotAParticipant(player),
        GameError::MoveAlreadySubmitted
        | GameError::AttemptsExhausted
        | GameError::HandComplete => ArenaError::MoveAlreadySubmitted,
        GameError::NoChallenge => ArenaError::GameNotActive("active"),
        GameError::WrongMoveType { expected } => {
            ArenaError::InvalidMove(format!("expected a {expected} move"))
        }
        GameError::InvalidMove(reason) => ArenaError::InvalidMove(reason),
    }
}
