//! Error taxonomy.
//!
//! Three classes, per the orchestrator's propagation policy:
//! - validation errors ([`ArenaError`], [`FinalizeError`]) are surfaced to the
//!   caller and never mutate state;
//! - transient infrastructure errors ([`StoreError::Conflict`], signer
//!   unavailability) are retried with bounded backoff before surfacing;
//! - [`InvariantViolation`] is fatal for the affected arena: the arena is
//!   frozen and a diagnostic persisted, but the fleet keeps running.

use crate::address::Address;
use thiserror::Error;

/// Validation errors for arena commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena not found")]
    NotFound,
    #[error("player {0:#x} already joined")]
    AlreadyJoined(Address),
    #[error("player has not paid into the escrow")]
    NotPaidIn,
    #[error("arena is full ({max_players} players)")]
    ArenaFull { max_players: u32 },
    #[error("arena registration is closed")]
    RegistrationClosed,
    #[error("registration deadline has passed")]
    DeadlinePassed,
    #[error("arena is already finalized")]
    AlreadyFinalized,
    #[error("arena is cancelled")]
    Cancelled,
    #[error("game is not active (status: {0})")]
    GameNotActive(&'static str),
    #[error("player {0:#x} is not a participant")]
    NotAParticipant(Address),
    #[error("move already submitted for this round")]
    MoveAlreadySubmitted,
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error("arena is frozen after an invariant violation")]
    Frozen,
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Finalize-signer failures. The variant names are the wire-level error codes
/// the escrow tooling expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    #[error("arena_not_closed")]
    ArenaNotClosed,
    #[error("already_finalized")]
    AlreadyFinalized,
    #[error("invalid_winner")]
    InvalidWinner,
    #[error("payout_exceeds_escrow")]
    PayoutExceedsEscrow,
    #[error("nonce_reused")]
    NonceReused,
    #[error("signing_service_unavailable")]
    SigningServiceUnavailable,
}

/// Persistence-layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("arena document not found")]
    NotFound,
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// An internal consistency failure. Fatal for the arena it names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violated: {0}")]
pub struct InvariantViolation(pub String);
