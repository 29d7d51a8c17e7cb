//! Claw Arena tournament orchestrator.
//!
//! The off-chain half of a wagered tournament platform: fills lobbies,
//! times every phase of the arena lifecycle, drives the game engine through
//! rounds, splits prize pools, and produces the EIP-712 finalize
//! authorization the on-chain escrow verifies. Funds are never custodied
//! here and no transactions are executed; persistence, the chain and the
//! signing key sit behind injected traits.
//!
//! ## Shape
//!
//! - [`clock`] / [`scheduler`]: injected time and the single timer wheel
//!   all deadlines ride on.
//! - [`arena`]: one actor per arena, a mailbox serializing joins, moves,
//!   timer fires and finalization, over a pure transition machine.
//! - [`signer`]: finalize validation, canonical digest, signing boundary.
//! - [`agent`]: the autonomous host that keeps lobbies stocked.
//! - [`store`] / [`chain`]: external collaborator contracts with
//!   in-memory stand-ins.
//! - [`service`]: wiring, routing and graceful shutdown.

pub mod agent;
pub mod arena;
pub mod backoff;
pub mod chain;
pub mod clock;
pub mod scheduler;
pub mod service;
pub mod signer;
pub mod store;

pub use agent::{AgentSettings, HostAgent};
pub use arena::{ArenaMailbox, FinalizeOutcome, Timings};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use service::{ArenaService, ServiceConfig};
