//! Domain model for the Claw Arena tournament orchestrator.
//!
//! This crate holds the pure data layer shared by the game engine and the
//! orchestrator: the arena aggregate, game-type metadata, payout arithmetic,
//! the tier policy table, and the error taxonomy. Nothing here performs I/O
//! or reads a clock; all timestamps are caller-supplied millisecond values.

pub mod address;
pub mod arena;
pub mod constants;
pub mod economy;
pub mod error;
pub mod game;
pub mod tier;

pub use address::{format_address, parse_address, synthetic_address, Address};
pub use arena::{Arena, ArenaConfig, CreatedBy, GameResults, GameStatus, Network, PayoutScheme};
pub use economy::PayoutSplit;
pub use error::{ArenaError, FinalizeError, InvariantViolation, StoreError};
pub use game::GameType;
pub use tier::Tier;

pub use primitive_types::{H256, U256};
