//! Plot (town build-unit) model.

use serde::{Deserialize, Serialize};

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Residential,
    Commercial,
    Civic,
    Industrial,
    Entertainment,
}

impl Zone {
    /// Minimum `apiCallsUsed` before a plot in this zone can reach BUILT.
    pub fn min_calls(self) -> u32 {
        match self {
            Zone::Residential => 3,
            Zone::Commercial => 4,
            Zone::Civic => 5,
            Zone::Industrial => 4,
            Zone::Entertainment => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotStatus {
    Empty,
    Claimed,
    UnderConstruction,
    Built,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plot {
    pub town_id: String,
    pub plot_index: u32,
    pub zone: Zone,
    pub status: PlotStatus,
    pub owner_id: Option<AgentId>,
    pub builder_id: Option<AgentId>,
    pub building_type: Option<String>,
    pub building_name: Option<String>,
    pub api_calls_used: u32,
    pub total_invested: i64,
    pub quality_score: f64,
}

impl Plot {
    pub fn empty(town_id: String, plot_index: u32, zone: Zone) -> Self {
        Self {
            town_id,
            plot_index,
            zone,
            status: PlotStatus::Empty,
            owner_id: None,
            builder_id: None,
            building_type: None,
            building_name: None,
            api_calls_used: 0,
            total_invested: 0,
            quality_score: 0.0,
        }
    }

    /// Invariant check used by tests and by the Store before/after a
    /// transaction commits: BUILT implies enough work was done.
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            PlotStatus::Claimed => self.owner_id.is_some(),
            PlotStatus::UnderConstruction => {
                self.builder_id.is_some() && self.builder_id == self.owner_id
            }
            PlotStatus::Built => self.api_calls_used >= self.zone.min_calls(),
            PlotStatus::Empty => true,
        }
    }
}
