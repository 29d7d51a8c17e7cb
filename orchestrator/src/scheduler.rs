//! Deadline scheduler.
//!
//! A single timer wheel drives every deadline in the fleet: lobby
//! countdowns, idle reaping, round deadlines and the host agent's cycle.
//! The pure [`SchedulerCore`] owns the ordering logic: a min-heap on
//! `fires_at` plus a live-generation map so that re-scheduling a
//! `(arena, kind)` key replaces the prior entry and a cancelled or replaced
//! entry never fires. The async shell is a lone dispatcher task that sleeps
//! to the earliest deadline (bounded by the tick resolution) and enqueues
//! fired keys; it never mutates arena state directly.

use crate::clock::Clock;
use claw_types::Address;
use futures::channel::mpsc;
use futures::StreamExt;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    GameStartCountdown,
    IdleReap,
    RoundDeadline,
    AgentCycle,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::GameStartCountdown => "game_start_countdown",
            TimerKind::IdleReap => "idle_reap",
            TimerKind::RoundDeadline => "round_deadline",
            TimerKind::AgentCycle => "agent_cycle",
        }
    }
}

/// At most one live timer exists per key; scheduling again replaces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub arena: Address,
    pub kind: TimerKind,
}

/// Heap entries are lapsed rather than removed: each schedule bumps the
/// key's generation, and only the entry carrying the live generation fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    fires_at_ms: u64,
    generation: u64,
    key: TimerKey,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fires_at_ms
            .cmp(&other.fires_at_ms)
            .then(self.generation.cmp(&other.generation))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Pure timer wheel.
#[derive(Debug, Default)]
pub struct SchedulerCore {
    heap: BinaryHeap<Reverse<Entry>>,
    live: HashMap<TimerKey, (u64, u64)>, // key → (generation, fires_at_ms)
    next_generation: u64,
}

impl SchedulerCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `fires_at_ms`, replacing any prior entry
    /// for the same key.
    pub fn schedule(&mut self, key: TimerKey, fires_at_ms: u64) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.live.insert(key, (generation, fires_at_ms));
        self.heap.push(Reverse(Entry {
            fires_at_ms,
            generation,
            key,
        }));
    }

    /// Remove a pending timer. Idempotent.
    pub fn cancel(&mut self, key: &TimerKey) {
        self.live.remove(key);
    }

    /// Earliest live deadline, pruning lapsed heap heads on the way.
    pub fn next_deadline(&mut self) -> Option<u64> {
        while let Some(Reverse(entry)) = self.heap.peek() {
            match self.live.get(&entry.key) {
                Some((generation, _)) if *generation == entry.generation => {
                    return Some(entry.fires_at_ms)
                }
                _ => {
                    self.heap.pop();
                }
            }
        }
        None
    }

    /// Pop every key whose live deadline has been reached, in firing order.
    /// A popped key is consumed: it will not fire again unless rescheduled.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<TimerKey> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.fires_at_ms > now_ms {
                break;
            }
            let entry = self.heap.pop().expect("peeked").0;
            match self.live.get(&entry.key) {
                Some((generation, _)) if *generation == entry.generation => {
                    self.live.remove(&entry.key);
                    due.push(entry.key);
                }
                _ => {} // lapsed by reschedule or cancel
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.live.len()
    }
}

pub enum SchedulerCommand {
    Schedule { key: TimerKey, fires_at_ms: u64 },
    Cancel { key: TimerKey },
    Shutdown,
}

/// Cloneable handle feeding the dispatcher.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn schedule(&self, key: TimerKey, fires_at_ms: u64) {
        if self
            .sender
            .unbounded_send(SchedulerCommand::Schedule { key, fires_at_ms })
            .is_err()
        {
            warn!(kind = key.kind.as_str(), "scheduler is gone; timer dropped");
        }
    }

    pub fn cancel(&self, key: TimerKey) {
        let _ = self.sender.unbounded_send(SchedulerCommand::Cancel { key });
    }

    /// Stop accepting timers and end the dispatcher.
    pub fn shutdown(&self) {
        let _ = self.sender.unbounded_send(SchedulerCommand::Shutdown);
    }
}

/// Spawn the dispatcher task. Fired keys are delivered on `fired`; the
/// receiver routes them to arena mailboxes.
pub fn spawn(
    clock: Arc<dyn Clock>,
    tick_ms: u64,
    fired: mpsc::UnboundedSender<TimerKey>,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::unbounded();
    let handle = SchedulerHandle { sender };

    let task = tokio::spawn(async move {
        let mut core = SchedulerCore::new();
        loop {
            let now = clock.now_ms();
            let sleep_ms = match core.next_deadline() {
                Some(deadline) => deadline.saturating_sub(now).min(tick_ms),
                None => tick_ms,
            };

            tokio::select! {
                command = receiver.next() => match command {
                    Some(SchedulerCommand::Schedule { key, fires_at_ms }) => {
                        debug!(kind = key.kind.as_str(), fires_at_ms, "timer scheduled");
                        core.schedule(key, fires_at_ms);
                    }
                    Some(SchedulerCommand::Cancel { key }) => core.cancel(&key),
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
                _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {
                    for key in core.pop_due(clock.now_ms()) {
                        if fired.unbounded_send(key).is_err() {
                            return; // router is gone, nothing left to drive
                        }
                    }
                }
            }
        }
        debug!(pending = core.pending(), "scheduler stopped");
    });

    (handle, task)
}
