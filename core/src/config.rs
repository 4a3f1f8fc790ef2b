//! Environment configuration (SPEC_FULL.md §6).
//!
//! Loaded once at process start via [`CoreConfig::from_env`]. `dotenvy` is
//! used to optionally pull a `.env` file into the process environment before
//! reading it, matching the pack's convention for local development; nothing
//! here reaches out to a config *service* — this is out of scope (§1).

use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("bps value for {name} must be in [0, {max}], got {value}")]
    BpsOutOfRange { name: &'static str, value: i64, max: i64 },
}

/// Four-way basis-point split, renormalized to sum to 10_000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourWaySplitBps {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
}

impl FourWaySplitBps {
    /// Renormalize four raw weights so they sum to exactly 10_000, preserving
    /// their relative proportions. The remainder from integer division is
    /// assigned to the first (largest-weighted ties broken by position) slot
    /// so the total never drifts from 10_000.
    fn renormalize(raw: [i64; 4]) -> [i64; 4] {
        let total: i64 = raw.iter().sum();
        if total <= 0 {
            return [5000, 2500, 1500, 1000]; // default town/ops/pvp/insurance split
        }
        let mut out = [0i64; 4];
        let mut assigned = 0i64;
        for i in 0..4 {
            out[i] = raw[i] * 10_000 / total;
            assigned += out[i];
        }
        out[0] += 10_000 - assigned;
        out
    }

    fn from_env(names: [&'static str; 4], defaults: [i64; 4]) -> Self {
        let raw = [
            env_i64(names[0], defaults[0]),
            env_i64(names[1], defaults[1]),
            env_i64(names[2], defaults[2]),
            env_i64(names[3], defaults[3]),
        ];
        let norm = Self::renormalize(raw);
        Self {
            a: norm[0],
            b: norm[1],
            c: norm[2],
            d: norm[3],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EconomyConfig {
    pub init_reserve: i64,
    pub init_arena: i64,
    pub fee_bps: i64,
    /// town / ops / pvp / insurance
    pub claim_split_bps: FourWaySplitBps,
    /// town / ops / pvp / insurance
    pub build_split_bps: FourWaySplitBps,
    /// Fraction of the per-swap fee routed to `insurance`; remainder to `ops`.
    pub fee_insurance_bps: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub economy: EconomyConfig,
    pub poker_max_hands: u32,
    pub disable_wheel: bool,
    pub enable_test_utils: bool,
    pub test_utils_key: Option<String>,
    pub monad_rpc_url: Option<String>,
    pub arena_token_address: Option<String>,
}

impl CoreConfig {
    /// Load configuration from the process environment, optionally seeded by
    /// a `.env` file (missing file is not an error).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let fee_bps = env_i64("ECONOMY_FEE_BPS", 30);
        if !(0..=1000).contains(&fee_bps) {
            return Err(ConfigError::BpsOutOfRange {
                name: "ECONOMY_FEE_BPS",
                value: fee_bps,
                max: 1000,
            });
        }

        let fee_insurance_bps = env_i64("ECONOMY_FEE_INSURANCE_BPS", 4000);
        if !(0..=10_000).contains(&fee_insurance_bps) {
            return Err(ConfigError::BpsOutOfRange {
                name: "ECONOMY_FEE_INSURANCE_BPS",
                value: fee_insurance_bps,
                max: 10_000,
            });
        }

        let economy = EconomyConfig {
            init_reserve: env_i64("ECONOMY_INIT_RESERVE", 1_000_000),
            init_arena: env_i64("ECONOMY_INIT_ARENA", 1_000_000),
            fee_bps,
            claim_split_bps: FourWaySplitBps::from_env(
                [
                    "ECONOMY_CLAIM_TOWN_BPS",
                    "ECONOMY_CLAIM_OPS_BPS",
                    "ECONOMY_CLAIM_PVP_BPS",
                    "ECONOMY_CLAIM_INSURANCE_BPS",
                ],
                [5000, 2500, 1500, 1000],
            ),
            build_split_bps: FourWaySplitBps::from_env(
                [
                    "ECONOMY_BUILD_TOWN_BPS",
                    "ECONOMY_BUILD_OPS_BPS",
                    "ECONOMY_BUILD_PVP_BPS",
                    "ECONOMY_BUILD_INSURANCE_BPS",
                ],
                [5000, 2500, 1500, 1000],
            ),
            fee_insurance_bps,
        };

        Ok(Self {
            economy,
            poker_max_hands: env_i64("POKER_MAX_HANDS", 5).max(1) as u32,
            disable_wheel: env_bool("DISABLE_WHEEL", false),
            enable_test_utils: env_bool("ENABLE_TEST_UTILS", false),
            test_utils_key: env::var("TEST_UTILS_KEY").ok(),
            monad_rpc_url: env::var("MONAD_RPC_URL").ok(),
            arena_token_address: env::var("ARENA_TOKEN_ADDRESS").ok(),
        })
    }
}

fn env_i64(name: &'static str, default: i64) -> i64 {
    match env::var(name) {
        Ok(v) => v.trim().parse::<i64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_bool(name: &'static str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
