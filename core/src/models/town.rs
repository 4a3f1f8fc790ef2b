//! Town aggregate (SPEC_FULL.md §8 scenario 3 "Town lifecycle").
//!
//! The distilled spec only gives the plot min-call table; this expansion's
//! town service (see `crate::town`) supplements the full claim/build/work
//! lifecycle, grounded in the teacher's two-queue `SimulationState`
//! bookkeeping style.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TownStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub id: String,
    pub name: String,
    pub num_plots: u32,
    pub status: TownStatus,
}

impl Town {
    pub fn new(id: String, name: String, num_plots: u32) -> Self {
        Self {
            id,
            name,
            num_plots,
            status: TownStatus::Active,
        }
    }

    pub fn completion_pct(&self, built_plots: u32) -> f64 {
        if self.num_plots == 0 {
            return 100.0;
        }
        (built_plots as f64 / self.num_plots as f64) * 100.0
    }
}
