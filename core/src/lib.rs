//! `town_arena_core` — the concurrent orchestration core for an AI Town +
//! Arena simulation: agent decision loops, an AMM token market, 1v1 wagered
//! match engines, an operator command queue, crew orders, and the
//! schedulers that drive them. See SPEC_FULL.md for the module map.

pub mod agent_loop;
pub mod amm;
pub mod arena;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod crew;
pub mod error;
pub mod external;
pub mod games;
pub mod goals;
pub mod llm;
pub mod models;
pub mod rng;
pub mod schedulers;
pub mod social;
pub mod store;
pub mod time;
pub mod town;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
