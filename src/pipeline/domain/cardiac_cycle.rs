use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CycleError;
use crate::pipeline::context::{MaskBatch, MaskSlot};
use crate::pipeline::domain::area::{AreaComputer, AreaSample};

/// End-diastolic (largest) and end-systolic (smallest) frames of the clip.
///
/// Always satisfies `ed_area >= es_area` and `ed_index != es_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardiacCycleResult {
    pub ed_index: usize,
    pub es_index: usize,
    pub ed_area: u64,
    pub es_area: u64,
}

/// Cycle extrema plus the per-frame area trace they were picked from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleAnalysis {
    pub cycle: CardiacCycleResult,
    pub samples: Vec<AreaSample>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CardiacCycleAnalyzer {
    area: AreaComputer,
}

impl CardiacCycleAnalyzer {
    pub fn new(area: AreaComputer) -> Self {
        Self { area }
    }

    /// Measures every `Present` mask. Pending and absent slots produce no sample.
    pub fn area_samples(&self, batch: &MaskBatch) -> Vec<AreaSample> {
        batch
            .slots()
            .iter()
            .enumerate()
            .filter_map(|(frame_index, slot)| match slot {
                MaskSlot::Present(mask) => Some(match self.area.compute_area(mask) {
                    Ok(area) => AreaSample::Valid { frame_index, area },
                    Err(e) => {
                        warn!("Frame {} mask rejected: {}", frame_index, e);
                        AreaSample::Invalid {
                            frame_index,
                            reason: e.to_string(),
                        }
                    }
                }),
                MaskSlot::Pending | MaskSlot::Absent(_) => None,
            })
            .collect()
    }

    pub fn identify_ed_and_es(&self, batch: &MaskBatch) -> Result<CardiacCycleResult, CycleError> {
        Self::select_extrema(&self.area_samples(batch))
    }

    pub fn analyze(&self, batch: &MaskBatch) -> Result<CycleAnalysis, CycleError> {
        let samples = self.area_samples(batch);
        let cycle = Self::select_extrema(&samples)?;
        Ok(CycleAnalysis { cycle, samples })
    }

    fn select_extrema(samples: &[AreaSample]) -> Result<CardiacCycleResult, CycleError> {
        let candidates: Vec<(usize, u64)> = samples
            .iter()
            .filter_map(|sample| match sample {
                AreaSample::Valid { frame_index, area } if *area > 0 => Some((*frame_index, *area)),
                _ => None,
            })
            .collect();

        if candidates.len() < 2 {
            return Err(CycleError::InsufficientMasks {
                candidates: candidates.len(),
            });
        }

        // Candidates are in frame order, so strict comparisons keep the lowest index on ties.
        let mut ed = candidates[0];
        let mut es = candidates[0];
        for &(index, area) in &candidates[1..] {
            if area > ed.1 {
                ed = (index, area);
            }
            if area < es.1 {
                es = (index, area);
            }
        }

        if ed.0 == es.0 || ed.1 < es.1 {
            return Err(CycleError::DegenerateCycle {
                ed_index: ed.0,
                es_index: es.0,
            });
        }

        debug!(
            "Cycle from {} candidates: ED frame {} ({}px), ES frame {} ({}px)",
            candidates.len(),
            ed.0,
            ed.1,
            es.0,
            es.1
        );

        Ok(CardiacCycleResult {
            ed_index: ed.0,
            es_index: es.0,
            ed_area: ed.1,
            es_area: es.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SegmentationMask;
    use crate::error::SegmentationError;
    use crate::pipeline::epoch::PipelineEpoch;

    /// A 10-pixel-wide mask whose foreground covers exactly `area` pixels.
    fn mask_with_area(area: u32) -> SegmentationMask {
        let width = 10;
        let height = 10;
        let data = (0..width * height)
            .map(|i| if i < area { 255 } else { 0 })
            .collect();
        SegmentationMask::from_raw(width, height, data).unwrap()
    }

    fn batch(outcomes: Vec<Option<u32>>) -> MaskBatch {
        MaskBatch::from_outcomes(
            PipelineEpoch::default(),
            outcomes.into_iter().map(|area| match area {
                Some(area) => Ok(mask_with_area(area)),
                None => Err(SegmentationError::BackendFailure("model error".into())),
            }),
        )
    }

    #[test]
    fn failed_frame_is_excluded_from_candidacy() {
        let batch = batch(vec![Some(80), Some(60), None, Some(90), Some(70)]);
        let result = CardiacCycleAnalyzer::default()
            .identify_ed_and_es(&batch)
            .unwrap();
        assert_eq!(
            result,
            CardiacCycleResult {
                ed_index: 3,
                es_index: 1,
                ed_area: 90,
                es_area: 60,
            }
        );
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let batch = batch(vec![Some(50), Some(90), Some(20), Some(90), Some(20)]);
        let result = CardiacCycleAnalyzer::default()
            .identify_ed_and_es(&batch)
            .unwrap();
        assert_eq!((result.ed_index, result.es_index), (1, 2));
    }

    #[test]
    fn zero_area_masks_are_not_candidates() {
        let batch = batch(vec![Some(0), Some(40), Some(0), None]);
        assert_eq!(
            CardiacCycleAnalyzer::default().identify_ed_and_es(&batch),
            Err(CycleError::InsufficientMasks { candidates: 1 })
        );
    }

    #[test]
    fn empty_batch_has_no_candidates() {
        let batch = MaskBatch::new(PipelineEpoch::default(), 0);
        assert_eq!(
            CardiacCycleAnalyzer::default().identify_ed_and_es(&batch),
            Err(CycleError::InsufficientMasks { candidates: 0 })
        );
    }

    #[test]
    fn single_distinct_area_is_degenerate() {
        let batch = batch(vec![Some(30), Some(30), Some(30)]);
        assert_eq!(
            CardiacCycleAnalyzer::default().identify_ed_and_es(&batch),
            Err(CycleError::DegenerateCycle {
                ed_index: 0,
                es_index: 0,
            })
        );
    }

    #[test]
    fn unreadable_masks_become_invalid_samples() {
        let mut batch = MaskBatch::new(PipelineEpoch::default(), 3);
        batch.resolve(0, Ok(SegmentationMask::filled(0, 0, 255)));
        batch.resolve(1, Ok(mask_with_area(40)));
        batch.resolve(2, Ok(mask_with_area(20)));

        let analysis = CardiacCycleAnalyzer::default().analyze(&batch).unwrap();
        assert!(matches!(
            analysis.samples[0],
            AreaSample::Invalid { frame_index: 0, .. }
        ));
        assert_eq!(analysis.samples.len(), 3);
        assert_eq!((analysis.cycle.ed_index, analysis.cycle.es_index), (1, 2));
    }

    #[test]
    fn pending_slots_produce_no_samples() {
        let mut batch = MaskBatch::new(PipelineEpoch::default(), 3);
        batch.resolve(2, Ok(mask_with_area(10)));
        let samples = CardiacCycleAnalyzer::default().area_samples(&batch);
        assert_eq!(
            samples,
            vec![AreaSample::Valid {
                frame_index: 2,
                area: 10
            }]
        );
    }
}
