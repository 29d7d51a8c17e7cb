//! Autonomous host agent.
//!
//! Keeps a target depth of 2–5 open arenas. Each cycle it reads the fleet,
//! classifies the moment (peak hours, weekend), weighs tiers by recent fill
//! rate under the tier policy table, and decides whether to create new
//! tournaments and with which parameters. Decision logic is pure and seeded
//! so tests can pin its choices; the service executes the creation commands
//! it emits.

use claw_types::arena::{ArenaConfig, CreatedBy, Network, PayoutScheme};
use claw_types::constants::{MAX_ACTIVE_ARENAS, MIN_ACTIVE_ARENAS, PEAK_HOURS_UTC};
use claw_types::tier::TierSignals;
use claw_types::{Address, Arena, GameType, Tier, U256};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info};

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_DAY: u64 = 86_400_000;
/// 1970-01-01 was a Thursday: offset into a Monday-0 week.
const EPOCH_WEEKDAY_MON0: u64 = 3;

/// Window for fill-rate analysis.
const FILL_WINDOW_MS: u64 = 24 * MS_PER_HOUR;

/// A tier is paused for this many cycles after three straight failed fills.
const PAUSE_CYCLES: u32 = 2;
const FAILED_FILLS_TO_PAUSE: u32 = 3;

/// Per-tier flair for generated lobby names.
fn name_templates(tier: Tier) -> &'static [&'static str] {
    match tier {
        Tier::Micro => &["Micro Mayhem", "Starter Showdown", "Beginner's Brawl", "Entry Arena"],
        Tier::Small => &["Rising Stars", "Challenger Cup", "Arena Clash", "Battle Royale"],
        Tier::Medium => &["Champions League", "Elite Showdown", "Grand Arena", "Premier Battle"],
        Tier::Large => &["High Stakes", "Diamond League", "Masters Tournament", "Prestige Cup"],
        Tier::Whale => &["Whale Wars", "Titan's Arena", "Ultimate Showdown", "Legendary Battle"],
    }
}

/// Snapshot of demand, derived once per cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketAnalysis {
    pub hour_utc: u32,
    pub weekday_mon0: u32,
    pub peak: bool,
    pub weekend: bool,
    pub active_count: usize,
    pub overall_fill: f64,
    pub small_fill_24h: f64,
    pub tier_fill: BTreeMap<Tier, f64>,
    pub confidence: f64,
}

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub network: Network,
    pub treasury: Address,
    pub min_active: usize,
    pub max_active: usize,
    /// Spacing between cycles.
    pub interval_ms: u64,
    /// Spacing between creation retries (60 s in production).
    pub retry_spacing_ms: u64,
    pub create_retries: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            treasury: Address::zero(),
            min_active: MIN_ACTIVE_ARENAS,
            max_active: MAX_ACTIVE_ARENAS,
            interval_ms: claw_types::constants::AGENT_INTERVAL_SECS * 1_000,
            retry_spacing_ms: 60_000,
            create_retries: 3,
        }
    }
}

pub struct HostAgent {
    settings: AgentSettings,
    rng: StdRng,
    lobby_counter: u64,
    /// Consecutive failed fills per tier (reset on any successful fill).
    failed_fills: BTreeMap<Tier, u32>,
    /// Cycles a tier remains paused.
    paused: BTreeMap<Tier, u32>,
    /// Published countdown to the next tournament, epoch ms.
    next_tournament_at_ms: Option<u64>,
}

impl HostAgent {
    pub fn new(settings: AgentSettings, seed: u64) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
            lobby_counter: 0,
            failed_fills: BTreeMap::new(),
            paused: BTreeMap::new(),
            next_tournament_at_ms: None,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn next_tournament_at_ms(&self) -> Option<u64> {
        self.next_tournament_at_ms
    }

    /// Classify the moment and measure fill rates over the trailing window.
    pub fn analyze(&self, now_ms: u64, arenas: &[Arena]) -> MarketAnalysis {
        let hour_utc = ((now_ms % MS_PER_DAY) / MS_PER_HOUR) as u32;
        let weekday_mon0 = ((now_ms / MS_PER_DAY + EPOCH_WEEKDAY_MON0) % 7) as u32;
        let peak = hour_utc >= PEAK_HOURS_UTC.0 && hour_utc < PEAK_HOURS_UTC.1;
        let weekend = weekday_mon0 >= 5;

        let active_count = arenas.iter().filter(|a| a.counts_as_active()).count();

        let window_start = now_ms.saturating_sub(FILL_WINDOW_MS);
        let mut tier_samples: BTreeMap<Tier, (f64, usize)> = BTreeMap::new();
        let mut overall = (0.0, 0usize);
        for arena in arenas {
            if arena.created_at_ms < window_start {
                continue;
            }
            let tier = Tier::classify(arena.config.entry_fee);
            let fill = arena.fill_rate();
            let slot = tier_samples.entry(tier).or_insert((0.0, 0));
            slot.0 += fill;
            slot.1 += 1;
            overall.0 += fill;
            overall.1 += 1;
        }
        // With no recent data, assume middling demand rather than none.
        let overall_fill = if overall.1 == 0 {
            0.5
        } else {
            overall.0 / overall.1 as f64
        };
        let tier_fill: BTreeMap<Tier, f64> = tier_samples
            .iter()
            .map(|(tier, (sum, n))| (*tier, sum / *n as f64))
            .collect();
        let small_fill_24h = tier_fill.get(&Tier::Small).copied().unwrap_or(0.0);

        let mut confidence: f64 = match (peak, weekend) {
            (true, true) => 0.8,
            (true, false) => 0.7,
            (false, true) => 0.6,
            (false, false) => 0.5,
        };
        if overall_fill < 0.3 {
            confidence *= 0.8;
        } else if overall_fill > 0.8 {
            confidence *= 1.1;
        }
        confidence = confidence.min(1.0);

        MarketAnalysis {
            hour_utc,
            weekday_mon0,
            peak,
            weekend,
            active_count,
            overall_fill,
            small_fill_24h,
            tier_fill,
            confidence,
        }
    }

    /// One agent cycle: decrement pauses, decide how many arenas to create,
    /// and emit their configurations.
    pub fn on_cycle(&mut self, now_ms: u64, arenas: &[Arena]) -> Vec<ArenaConfig> {
        for remaining in self.paused.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.paused.retain(|_, remaining| *remaining > 0);

        let analysis = self.analyze(now_ms, arenas);
        info!(
            hour = analysis.hour_utc,
            weekday = analysis.weekday_mon0,
            peak = analysis.peak,
            weekend = analysis.weekend,
            active = analysis.active_count,
            overall_fill = format!("{:.2}", analysis.overall_fill),
            confidence = format!("{:.2}", analysis.confidence),
            "agent cycle"
        );

        let needed = self.creations_needed(&analysis);
        (0..needed)
            .filter_map(|_| self.generate_config(&analysis))
            .collect()
    }

    /// The creation ladder: top up below the minimum depth, lean in during
    /// peak, add one speculative lobby on high confidence.
    fn creations_needed(&self, analysis: &MarketAnalysis) -> usize {
        let active = analysis.active_count;
        if active >= self.settings.max_active {
            return 0;
        }
        let mut needed = self.settings.min_active.saturating_sub(active);
        if analysis.peak && active < self.settings.max_active - 1 {
            needed = needed.max(1);
        }
        if needed == 0 && analysis.confidence >= 0.7 {
            needed = 1;
        }
        needed.min(self.settings.max_active - active)
    }

    /// Pick a tier (fill-weighted among available, non-paused tiers) and
    /// sample arena parameters from its row of the policy table.
    fn generate_config(&mut self, analysis: &MarketAnalysis) -> Option<ArenaConfig> {
        let signals = TierSignals {
            peak: analysis.peak,
            weekend: analysis.weekend,
            small_fill_24h: analysis.small_fill_24h,
            overall_fill: analysis.overall_fill,
        };
        let candidates: Vec<Tier> = Tier::ALL
            .into_iter()
            .filter(|tier| tier.is_available(&signals))
            .filter(|tier| !self.paused.contains_key(tier))
            .collect();
        if candidates.is_empty() {
            debug!("no tier available this cycle");
            return None;
        }

        // Weight toward tiers that have been filling recently.
        let weights: Vec<f64> = candidates
            .iter()
            .map(|tier| 1.0 + 2.0 * analysis.tier_fill.get(tier).copied().unwrap_or(0.0))
            .collect();
        let total: f64 = weights.iter().sum();
        let mut roll = self.rng.gen_range(0.0..total);
        let mut chosen = candidates[candidates.len() - 1];
        for (tier, weight) in candidates.iter().zip(weights.iter()) {
            if roll < *weight {
                chosen = *tier;
                break;
            }
            roll -= weight;
        }

        let fee_options = chosen.fee_options();
        let entry_fee: U256 = fee_options[self.rng.gen_range(0..fee_options.len())];
        let player_options = chosen.player_options();
        let max_players = player_options[self.rng.gen_range(0..player_options.len())];
        let game_type = self.pick_game_type(max_players);

        self.lobby_counter += 1;
        let templates = name_templates(chosen);
        let template = templates[self.rng.gen_range(0..templates.len())];
        let name = format!("{template} #{}", self.lobby_counter);

        let mut reasons: Vec<String> = Vec::new();
        if analysis.peak {
            reasons.push("peak hours".into());
        }
        if analysis.weekend {
            reasons.push("weekend boost".into());
        }
        if analysis.overall_fill > 0.7 {
            reasons.push("high engagement".into());
        }
        reasons.push(format!("{:.0}% confidence", analysis.confidence * 100.0));

        Some(ArenaConfig {
            name,
            entry_fee,
            max_players,
            protocol_fee_bps: chosen.protocol_fee_bps(),
            treasury: self.settings.treasury,
            registration_deadline_ms: None,
            game_type,
            network: self.settings.network,
            created_by: CreatedBy::Agent,
            creation_reason: Some(reasons.join(", ")),
            payout_scheme: PayoutScheme::EqualSplit,
        })
    }

    /// Any protocol whose player bounds admit the lobby size.
    fn pick_game_type(&mut self, max_players: u32) -> GameType {
        let suitable: Vec<GameType> = GameType::ALL
            .into_iter()
            .filter(|gt| {
                let (min, max) = gt.player_bounds();
                max_players >= min && max_players <= max
            })
            .collect();
        if suitable.is_empty() {
            return GameType::Prediction;
        }
        suitable[self.rng.gen_range(0..suitable.len())]
    }

    /// Safety rail bookkeeping: three straight failed fills pause the tier
    /// for the next two cycles.
    pub fn record_fill_outcome(&mut self, tier: Tier, filled: bool) {
        if filled {
            self.failed_fills.remove(&tier);
            return;
        }
        let failures = self.failed_fills.entry(tier).or_insert(0);
        *failures += 1;
        if *failures >= FAILED_FILLS_TO_PAUSE {
            info!(%tier, "tier paused after repeated failed fills");
            self.paused.insert(tier, PAUSE_CYCLES);
            self.failed_fills.remove(&tier);
        }
    }

    pub fn is_paused(&self, tier: Tier) -> bool {
        self.paused.contains_key(&tier)
    }

    /// On every finalize: publish when the next tournament is expected.
    /// `U[5,15]` minutes during peak, `U[15,30]` off-peak.
    pub fn publish_next_tournament(&mut self, now_ms: u64) -> u64 {
        let hour_utc = ((now_ms % MS_PER_DAY) / MS_PER_HOUR) as u32;
        let peak = hour_utc >= PEAK_HOURS_UTC.0 && hour_utc < PEAK_HOURS_UTC.1;
        let minutes = if peak {
            self.rng.gen_range(5..=15u64)
        } else {
            self.rng.gen_range(15..=30u64)
        };
        let at = now_ms + minutes * 60_000;
        self.next_tournament_at_ms = Some(at);
        at
    }
}
