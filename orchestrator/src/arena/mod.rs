//! Per-arena actors: one mailbox and one sequential event loop per arena.

pub mod actor;
pub mod ingress;
pub mod machine;

pub use actor::{ArenaActor, ArenaDeps, ArenaNotice};
pub use ingress::{ArenaEvent, ArenaMailbox, FinalizeOutcome};
pub use machine::Timings;
