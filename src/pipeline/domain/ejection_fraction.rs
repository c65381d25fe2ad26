use serde::{Deserialize, Serialize};

use crate::error::EfError;
use crate::pipeline::domain::cardiac_cycle::CardiacCycleResult;

/// Fractional area change between end-diastole and end-systole, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfResult {
    pub percentage: f64,
    pub ed_area: u64,
    pub es_area: u64,
}

impl EfResult {
    /// False only if the area relationship was violated upstream. Never clamp instead.
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.percentage)
    }
}

/// `AFC = (ed_area - es_area) / ed_area * 100`, unclamped.
pub fn compute_afc(ed_area: u64, es_area: u64) -> Result<f64, EfError> {
    if ed_area == 0 {
        return Err(EfError::DivisionByZero);
    }
    if es_area > ed_area {
        return Err(EfError::InvalidAreaRelationship { ed_area, es_area });
    }
    Ok((ed_area - es_area) as f64 * 100.0 / ed_area as f64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EfEngine;

impl EfEngine {
    pub fn evaluate(&self, cycle: &CardiacCycleResult) -> Result<EfResult, EfError> {
        let percentage = compute_afc(cycle.ed_area, cycle.es_area)?;
        Ok(EfResult {
            percentage,
            ed_area: cycle.ed_area,
            es_area: cycle.es_area,
        })
    }
}
