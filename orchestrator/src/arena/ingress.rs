//! Arena actor mailbox.
//!
//! Every source of arena events (external commands, timer callbacks, the
//! finalize pipeline) funnels through one mailbox per arena, so events for
//! a single arena are handled strictly sequentially. Request/response
//! commands carry a `oneshot` reply; timer fires are fire-and-forget.

use crate::scheduler::TimerKind;
use claw_engine::{Move, MoveOutcome};
use claw_types::{Address, Arena, ArenaError, FinalizeError, U256};
use futures::channel::{mpsc, oneshot};
use futures::SinkExt;

/// The result of a successful finalize: everything the escrow submission
/// needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub winners: Vec<Address>,
    pub payouts: Vec<U256>,
    pub nonce: u64,
    pub signature: Vec<u8>,
}

pub enum ArenaEvent {
    Join {
        player: Address,
        /// Absolute cutoff; the actor rejects the command unprocessed once
        /// past it.
        deadline_ms: u64,
        response: oneshot::Sender<Result<u32, ArenaError>>,
    },
    SubmitMove {
        player: Address,
        mv: Move,
        deadline_ms: u64,
        response: oneshot::Sender<Result<MoveOutcome, ArenaError>>,
    },
    TimerFired {
        kind: TimerKind,
    },
    Finalize {
        response: oneshot::Sender<Result<FinalizeOutcome, FinalizeError>>,
    },
    Snapshot {
        response: oneshot::Sender<Arena>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct ArenaMailbox {
    sender: mpsc::Sender<ArenaEvent>,
}

impl ArenaMailbox {
    pub(crate) fn new(sender: mpsc::Sender<ArenaEvent>) -> Self {
        Self { sender }
    }

    pub async fn join(&mut self, player: Address, deadline_ms: u64) -> Result<u32, ArenaError> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(ArenaEvent::Join {
                player,
                deadline_ms,
                response,
            })
            .await
            .map_err(|_| ArenaError::NotFound)?;
        receiver.await.map_err(|_| ArenaError::NotFound)?
    }

    pub async fn submit_move(
        &mut self,
        player: Address,
        mv: Move,
        deadline_ms: u64,
    ) -> Result<MoveOutcome, ArenaError> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(ArenaEvent::SubmitMove {
                player,
                mv,
                deadline_ms,
                response,
            })
            .await
            .map_err(|_| ArenaError::NotFound)?;
        receiver.await.map_err(|_| ArenaError::NotFound)?
    }

    /// Timers enqueue rather than mutate. The send waits for mailbox room:
    /// a lost round deadline would stall its game for good.
    pub async fn timer_fired(&mut self, kind: TimerKind) {
        let _ = self.sender.send(ArenaEvent::TimerFired { kind }).await;
    }

    pub async fn finalize(&mut self) -> Result<FinalizeOutcome, FinalizeError> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(ArenaEvent::Finalize { response })
            .await
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?;
        receiver
            .await
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?
    }

    pub async fn snapshot(&mut self) -> Result<Arena, ArenaError> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(ArenaEvent::Snapshot { response })
            .await
            .map_err(|_| ArenaError::NotFound)?;
        receiver.await.map_err(|_| ArenaError::NotFound)
    }

    pub async fn shutdown(&mut self) {
        let _ = self.sender.send(ArenaEvent::Shutdown).await;
    }
}
