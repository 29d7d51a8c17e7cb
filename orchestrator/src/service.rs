//! Fleet service: actor registry, timer routing, agent driving, shutdown.
//!
//! `ArenaService` owns the scheduler, a mailbox per live arena, and the
//! host agent. Timer fires are routed to the owning arena's mailbox (the
//! agent's cycle timer rides a reserved zero key); fleet notices flow back
//! to feed the agent's fill statistics and the next-tournament countdown.

use crate::agent::HostAgent;
use crate::arena::{ArenaActor, ArenaDeps, ArenaMailbox, ArenaNotice, FinalizeOutcome, Timings};
use crate::chain::ChainAdapter;
use crate::clock::Clock;
use crate::scheduler::{self, SchedulerHandle, TimerKey, TimerKind};
use crate::signer::SigningService;
use crate::store::ArenaStore;
use claw_engine::{Move, MoveOutcome};
use claw_types::arena::ArenaConfig;
use claw_types::constants::SCHEDULER_TICK_MS;
use claw_types::{synthetic_address, Address, Arena, ArenaError, FinalizeError, StoreError, Tier};
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Timer routing key for the host agent's cycle; the zero address is
/// reserved and never hosts an arena.
fn agent_key() -> TimerKey {
    TimerKey {
        arena: Address::zero(),
        kind: TimerKind::AgentCycle,
    }
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub chain_id: u64,
    pub timings: Timings,
    pub tick_ms: u64,
    /// Mailbox drain allowance on shutdown.
    pub grace_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            chain_id: 10_143,
            timings: Timings::default(),
            tick_ms: SCHEDULER_TICK_MS,
            grace_ms: 10_000,
        }
    }
}

struct Registry {
    mailboxes: HashMap<Address, ArenaMailbox>,
    actors: Vec<JoinHandle<()>>,
}

pub struct ArenaService {
    deps: Arc<ArenaDeps>,
    config: ServiceConfig,
    registry: Mutex<Registry>,
    agent: Mutex<HostAgent>,
    scheduler: SchedulerHandle,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ArenaService {
    /// Wire the fleet and start the scheduler, timer router and notice
    /// loop. Arenas already in the store are re-adopted as live actors.
    pub fn start(
        clock: Arc<dyn Clock>,
        store: Arc<dyn ArenaStore>,
        chain: Arc<dyn ChainAdapter>,
        signer: Arc<dyn SigningService>,
        agent: HostAgent,
        config: ServiceConfig,
    ) -> Result<Arc<Self>, StoreError> {
        let (fired_tx, fired_rx) = mpsc::unbounded();
        let (scheduler, scheduler_task) = scheduler::spawn(clock.clone(), config.tick_ms, fired_tx);
        let (notices_tx, notices_rx) = mpsc::unbounded();

        let deps = Arc::new(ArenaDeps {
            clock,
            store,
            chain,
            signer,
            scheduler: scheduler.clone(),
            notices: notices_tx,
            chain_id: config.chain_id,
            timings: config.timings,
        });

        let service = Arc::new(Self {
            deps: deps.clone(),
            config,
            registry: Mutex::new(Registry {
                mailboxes: HashMap::new(),
                actors: Vec::new(),
            }),
            agent: Mutex::new(agent),
            scheduler,
            background: Mutex::new(vec![scheduler_task]),
        });

        // Re-adopt persisted arenas that are still in flight.
        for arena in deps.store.list_arenas()? {
            if arena.counts_as_active() {
                service.adopt(arena);
            }
        }

        let router = tokio::spawn(Self::route_timers(service.clone(), fired_rx));
        let notices = tokio::spawn(Self::consume_notices(service.clone(), notices_rx));
        service.background.lock().expect("tasks lock").extend([router, notices]);

        // First agent cycle fires immediately; each cycle re-arms the next.
        let now = service.deps.clock.now_ms();
        service.scheduler.schedule(agent_key(), now);

        Ok(service)
    }

    fn adopt(&self, arena: Arena) -> ArenaMailbox {
        let address = arena.address;
        let version = self
            .deps
            .store
            .load_arena(&address)
            .map(|(_, version)| version)
            .unwrap_or(1);
        let (mailbox, handle) = ArenaActor::spawn(arena, version, self.deps.clone());
        let mut registry = self.registry.lock().expect("registry lock");
        registry.mailboxes.insert(address, mailbox.clone());
        registry.actors.push(handle);
        mailbox
    }

    fn mailbox(&self, arena: &Address) -> Result<ArenaMailbox, ArenaError> {
        self.registry
            .lock()
            .expect("registry lock")
            .mailboxes
            .get(arena)
            .cloned()
            .ok_or(ArenaError::NotFound)
    }

    /// Create an arena from an admin or agent command. The address is the
    /// escrow address when one exists; otherwise a synthesized one.
    pub fn create_arena(&self, config: ArenaConfig) -> Result<Address, ArenaError> {
        config.validate()?;
        let now = self.deps.clock.now_ms();
        let address = synthetic_address(&config.name, now);
        let arena = Arena::new(address, config, now)?;
        self.deps
            .store
            .insert_arena(&arena)
            .map_err(|err| ArenaError::Storage(err.to_string()))?;
        info!(
            arena = %format!("{address:#x}"),
            name = %arena.config.name,
            entry_fee = %arena.config.entry_fee,
            max_players = arena.config.max_players,
            game_type = %arena.config.game_type,
            created_by = ?arena.config.created_by,
            reason = arena.config.creation_reason.as_deref().unwrap_or("-"),
            "arena created"
        );
        self.adopt(arena);
        Ok(address)
    }

    pub async fn join(
        &self,
        arena: &Address,
        player: Address,
        deadline_ms: u64,
    ) -> Result<u32, ArenaError> {
        self.mailbox(arena)?.join(player, deadline_ms).await
    }

    pub async fn submit_move(
        &self,
        arena: &Address,
        player: Address,
        mv: Move,
        deadline_ms: u64,
    ) -> Result<MoveOutcome, ArenaError> {
        self.mailbox(arena)?.submit_move(player, mv, deadline_ms).await
    }

    pub async fn finalize(&self, arena: &Address) -> Result<FinalizeOutcome, FinalizeError> {
        self.mailbox(arena)
            .map_err(|_| FinalizeError::ArenaNotClosed)?
            .finalize()
            .await
    }

    pub async fn snapshot(&self, arena: &Address) -> Result<Arena, ArenaError> {
        match self.mailbox(arena) {
            Ok(mut mailbox) => mailbox.snapshot().await,
            // Terminal arenas may have been dropped from the registry.
            Err(_) => self
                .deps
                .store
                .load_arena(arena)
                .map(|(arena, _)| arena)
                .map_err(|_| ArenaError::NotFound),
        }
    }

    /// Epoch instant the next agent-created tournament is expected, for
    /// lobby display.
    pub fn next_tournament_at_ms(&self) -> Option<u64> {
        self.agent.lock().expect("agent lock").next_tournament_at_ms()
    }

    async fn route_timers(self: Arc<Self>, mut fired: mpsc::UnboundedReceiver<TimerKey>) {
        while let Some(key) = fired.next().await {
            if key == agent_key() {
                self.run_agent_cycle().await;
                continue;
            }
            match self.mailbox(&key.arena) {
                Ok(mut mailbox) => mailbox.timer_fired(key.kind).await,
                Err(_) => debug!(
                    kind = key.kind.as_str(),
                    "timer for unknown arena dropped"
                ),
            }
        }
    }

    async fn consume_notices(self: Arc<Self>, mut notices: mpsc::UnboundedReceiver<ArenaNotice>) {
        while let Some(notice) = notices.next().await {
            match notice {
                ArenaNotice::Closed { tier, .. } => {
                    self.agent.lock().expect("agent lock").record_fill_outcome(tier, true);
                }
                ArenaNotice::Cancelled { arena, tier } => {
                    self.agent.lock().expect("agent lock").record_fill_outcome(tier, false);
                    self.maybe_trigger_agent(arena).await;
                }
                ArenaNotice::Finalized { arena, at_ms } => {
                    let next_at = self
                        .agent
                        .lock()
                        .expect("agent lock")
                        .publish_next_tournament(at_ms);
                    info!(
                        arena = %format!("{arena:#x}"),
                        next_tournament_at_ms = next_at,
                        "finalized; next tournament countdown published"
                    );
                    self.watch_finalization(arena);
                    self.maybe_trigger_agent(arena).await;
                }
            }
        }
    }

    /// Poll the chain adapter for the finalize transaction after the signed
    /// authorization has been handed off for submission.
    fn watch_finalization(&self, arena: Address) {
        const POLLS: u32 = 10;
        const POLL_INTERVAL_MS: u64 = 3_000;

        let chain = self.deps.chain.clone();
        let task = tokio::spawn(async move {
            for _ in 0..POLLS {
                match chain.observe_finalization(&arena) {
                    Ok(Some(receipt)) => {
                        info!(
                            arena = %format!("{arena:#x}"),
                            tx_hash = ?receipt.tx_hash,
                            success = receipt.success,
                            "finalization observed on-chain"
                        );
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%err, "finalization poll failed"),
                }
                tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            debug!(arena = %format!("{arena:#x}"), "finalization not observed in poll window");
        });
        self.background.lock().expect("tasks lock").push(task);
    }

    /// Terminal arenas shrink the open depth; pull the next agent cycle
    /// forward when we drop below the minimum.
    async fn maybe_trigger_agent(&self, _arena: Address) {
        let min_active = self.agent.lock().expect("agent lock").settings().min_active;
        match self.deps.store.list_arenas() {
            Ok(arenas) => {
                let active = arenas.iter().filter(|a| a.counts_as_active()).count();
                if active < min_active {
                    self.scheduler.schedule(agent_key(), self.deps.clock.now_ms());
                }
            }
            Err(err) => warn!(%err, "could not count active arenas"),
        }
    }

    async fn run_agent_cycle(&self) {
        let now = self.deps.clock.now_ms();
        let arenas = match self.deps.store.list_arenas() {
            Ok(arenas) => arenas,
            Err(err) => {
                error!(%err, "agent cycle aborted: store unavailable");
                self.rearm_agent(now);
                return;
            }
        };

        let (configs, retry_spacing_ms, create_retries) = {
            let mut agent = self.agent.lock().expect("agent lock");
            let configs = agent.on_cycle(now, &arenas);
            let settings = agent.settings();
            (configs, settings.retry_spacing_ms, settings.create_retries)
        };

        for config in configs {
            let mut created = false;
            for attempt in 0..=create_retries {
                match self.create_arena(config.clone()) {
                    Ok(_) => {
                        created = true;
                        break;
                    }
                    Err(err) => {
                        warn!(%err, attempt, name = %config.name, "arena creation failed");
                        if attempt < create_retries {
                            tokio::time::sleep(Duration::from_millis(retry_spacing_ms)).await;
                        }
                    }
                }
            }
            if !created {
                error!(name = %config.name, "arena creation abandoned after retries");
            }
        }

        self.rearm_agent(now);
    }

    fn rearm_agent(&self, now: u64) {
        let interval = self.agent.lock().expect("agent lock").settings().interval_ms;
        self.scheduler.schedule(agent_key(), now + interval);
    }

    /// Graceful shutdown: stop accepting timers, drain arena mailboxes for
    /// the grace period, then abort whatever is left in flight.
    pub async fn shutdown(&self) {
        info!("shutting down: draining arena mailboxes");
        self.scheduler.shutdown();

        let (mailboxes, actors) = {
            let mut registry = self.registry.lock().expect("registry lock");
            (
                registry.mailboxes.drain().collect::<Vec<_>>(),
                std::mem::take(&mut registry.actors),
            )
        };
        for (_, mut mailbox) in mailboxes {
            mailbox.shutdown().await;
        }

        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.grace_ms);
        let mut aborted = 0usize;
        for mut actor in actors {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut actor).await.is_err() {
                actor.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            warn!(aborted, "grace period elapsed; aborted in-flight arena work");
        }

        for task in self.background.lock().expect("tasks lock").drain(..) {
            task.abort();
        }
        info!("shutdown complete");
    }

    /// Test/ops hook: tier pause visibility.
    pub fn tier_paused(&self, tier: Tier) -> bool {
        self.agent.lock().expect("agent lock").is_paused(tier)
    }
}
