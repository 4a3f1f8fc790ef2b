//! Town service (SPEC_FULL.md §4.10 supplement) — the claim/build/work
//! lifecycle the distilled spec only partially specifies, grounded in the
//! teacher's two-queue `SimulationState` mutation style: each operation
//! reads the plot, checks its precondition, and writes the whole row back.

use thiserror::Error;

use crate::config::FourWaySplitBps;
use crate::models::{EconomyPool, Plot, PlotStatus};
use crate::store::{Store, StoreError};

#[derive(Debug, Error, PartialEq)]
pub enum TownError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("plot {town_id}/{plot_index} is not EMPTY")]
    NotEmpty { town_id: String, plot_index: u32 },
    #[error("plot {town_id}/{plot_index} is not CLAIMED")]
    NotClaimed { town_id: String, plot_index: u32 },
    #[error("plot {town_id}/{plot_index} is not UNDER_CONSTRUCTION")]
    NotUnderConstruction { town_id: String, plot_index: u32 },
    #[error("agent {agent_id} does not own plot {town_id}/{plot_index}")]
    NotOwner {
        town_id: String,
        plot_index: u32,
        agent_id: String,
    },
    #[error("plot {town_id}/{plot_index} needs {required} calls, has {actual}")]
    InsufficientWork {
        town_id: String,
        plot_index: u32,
        required: u32,
        actual: u32,
    },
}

impl TownError {
    pub fn code(&self) -> &'static str {
        match self {
            TownError::Store(e) => e.code(),
            TownError::NotEmpty { .. }
            | TownError::NotClaimed { .. }
            | TownError::NotUnderConstruction { .. }
            | TownError::InsufficientWork { .. } => "PRECONDITION",
            TownError::NotOwner { .. } => "VALIDATION",
        }
    }
}

fn get_plot(store: &Store, town_id: &str, plot_index: u32) -> Result<Plot, StoreError> {
    store
        .plots
        .get(&(town_id.to_string(), plot_index))
        .map(|p| p.clone())
        .ok_or_else(|| StoreError::NotFound(format!("plot {town_id}/{plot_index}")))
}

pub fn claim_plot(store: &Store, town_id: &str, plot_index: u32, agent_id: &str) -> Result<Plot, TownError> {
    let mut plot = get_plot(store, town_id, plot_index)?;
    if plot.status != PlotStatus::Empty {
        return Err(TownError::NotEmpty {
            town_id: town_id.to_string(),
            plot_index,
        });
    }
    plot.status = PlotStatus::Claimed;
    plot.owner_id = Some(agent_id.to_string());
    store.plots.insert((town_id.to_string(), plot_index), plot.clone());
    Ok(plot)
}

pub fn start_build(
    store: &Store,
    town_id: &str,
    plot_index: u32,
    agent_id: &str,
    building_type: String,
    building_name: String,
) -> Result<Plot, TownError> {
    let mut plot = get_plot(store, town_id, plot_index)?;
    if plot.status != PlotStatus::Claimed {
        return Err(TownError::NotClaimed {
            town_id: town_id.to_string(),
            plot_index,
        });
    }
    if plot.owner_id.as_deref() != Some(agent_id) {
        return Err(TownError::NotOwner {
            town_id: town_id.to_string(),
            plot_index,
            agent_id: agent_id.to_string(),
        });
    }
    plot.status = PlotStatus::UnderConstruction;
    plot.builder_id = Some(agent_id.to_string());
    plot.building_type = Some(building_type);
    plot.building_name = Some(building_name);
    store.plots.insert((town_id.to_string(), plot_index), plot.clone());
    Ok(plot)
}

/// Increment work progress and route the investment into the AMM claim
/// contribution budget split (SPEC_FULL.md §4.2, §4.10). Returns the
/// updated plot; caller applies `invested` to the pool's budget buckets
/// under the same transaction.
pub fn do_work(
    store: &Store,
    town_id: &str,
    plot_index: u32,
    agent_id: &str,
    invested: i64,
) -> Result<Plot, TownError> {
    let mut plot = get_plot(store, town_id, plot_index)?;
    if plot.status != PlotStatus::UnderConstruction {
        return Err(TownError::NotUnderConstruction {
            town_id: town_id.to_string(),
            plot_index,
        });
    }
    if plot.builder_id.as_deref() != Some(agent_id) {
        return Err(TownError::NotOwner {
            town_id: town_id.to_string(),
            plot_index,
            agent_id: agent_id.to_string(),
        });
    }
    plot.api_calls_used += 1;
    plot.total_invested += invested;
    store.plots.insert((town_id.to_string(), plot_index), plot.clone());
    Ok(plot)
}

/// Apply `invested`'s contribution to the pool's build budget buckets per
/// `split`, mirroring [`crate::amm::apply_swap`]'s fee-split shape.
pub fn route_build_contribution(pool: &mut EconomyPool, invested: i64, split: FourWaySplitBps) {
    if invested <= 0 {
        return;
    }
    let ops = invested * split.b / 10_000;
    let pvp = invested * split.c / 10_000;
    let insurance = invested * split.d / 10_000;
    let town = invested - ops - pvp - insurance;
    pool.budget_ops += ops + town;
    pool.budget_pvp += pvp;
    pool.budget_insurance += insurance;
}

/// Transition UNDER_CONSTRUCTION -> BUILT once `api_calls_used` meets the
/// zone minimum, computing `quality_score` from the ratio of calls
/// invested over the minimum, clamped to `[0.5, 2.0]`.
pub fn complete_build(store: &Store, town_id: &str, plot_index: u32) -> Result<Plot, TownError> {
    let mut plot = get_plot(store, town_id, plot_index)?;
    if plot.status != PlotStatus::UnderConstruction {
        return Err(TownError::NotUnderConstruction {
            town_id: town_id.to_string(),
            plot_index,
        });
    }
    let required = plot.zone.min_calls();
    if plot.api_calls_used < required {
        return Err(TownError::InsufficientWork {
            town_id: town_id.to_string(),
            plot_index,
            required,
            actual: plot.api_calls_used,
        });
    }
    plot.status = PlotStatus::Built;
    plot.quality_score = (plot.api_calls_used as f64 / required as f64).clamp(0.5, 2.0);
    store.plots.insert((town_id.to_string(), plot_index), plot.clone());
    Ok(plot)
}
