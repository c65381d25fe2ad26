pub mod area;
pub mod cardiac_cycle;
pub mod ejection_fraction;

pub use area::{AreaComputer, AreaSample};
pub use cardiac_cycle::{CardiacCycleAnalyzer, CardiacCycleResult, CycleAnalysis};
pub use ejection_fraction::{compute_afc, EfEngine, EfResult};
