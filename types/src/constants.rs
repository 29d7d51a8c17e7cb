//! Lifecycle timings and protocol constants.

/// Countdown between a lobby filling (or its deadline passing with enough
/// players) and the learning phase starting.
pub const COUNTDOWN_SECONDS: u64 = 10;

/// Fixed learning-phase duration; rules are displayed and no moves count.
pub const LEARNING_SECONDS: u64 = 60;

/// How long a lobby may sit at zero or one player before it is reaped.
pub const IDLE_REAP_SECONDS: u64 = 20;

/// Scheduler tick resolution in milliseconds.
pub const SCHEDULER_TICK_MS: u64 = 1_000;

/// Default per-round move timeout when a challenge does not carry its own.
pub const MOVE_TIMEOUT_DEFAULT_MS: u64 = 10_000;

/// Basis-point denominator for protocol fees.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Protocol fee ceiling (10%).
pub const MAX_PROTOCOL_FEE_BPS: u16 = 1_000;

/// Arena participation bounds.
pub const MIN_PLAYERS: u32 = 2;
pub const MAX_PLAYERS: u32 = 64;

/// Autonomous host agent: target depth of open arenas.
pub const MIN_ACTIVE_ARENAS: usize = 2;
pub const MAX_ACTIVE_ARENAS: usize = 5;

/// Default spacing between agent cycles.
pub const AGENT_INTERVAL_SECS: u64 = 30 * 60;

/// Peak hours in UTC, inclusive start / exclusive end.
pub const PEAK_HOURS_UTC: (u32, u32) = (14, 23);

/// EIP-712 domain for finalize authorizations.
pub const DOMAIN_NAME: &str = "ClawArena";
pub const DOMAIN_VERSION: &str = "1";
