use crate::common::SegmentationMask;
use crate::error::SegmentationError;
use crate::pipeline::epoch::PipelineEpoch;

/// Segmentation outcome for one frame index.
///
/// A slot leaves `Pending` at most once and never returns to it.
#[derive(Debug, Clone)]
pub enum MaskSlot {
    Pending,
    Present(SegmentationMask),
    Absent(SegmentationError),
}

impl MaskSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, MaskSlot::Pending)
    }

    pub fn mask(&self) -> Option<&SegmentationMask> {
        match self {
            MaskSlot::Present(mask) => Some(mask),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&SegmentationError> {
        match self {
            MaskSlot::Absent(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    Written,
    /// The slot was already resolved; the write was ignored.
    AlreadyResolved,
    OutOfRange,
}

/// Fixed-length, frame-ordered masks for one epoch. Slot `i` belongs to frame `i`.
#[derive(Debug, Clone)]
pub struct MaskBatch {
    epoch: PipelineEpoch,
    slots: Box<[MaskSlot]>,
}

impl MaskBatch {
    pub fn new(epoch: PipelineEpoch, len: usize) -> Self {
        Self {
            epoch,
            slots: vec![MaskSlot::Pending; len].into_boxed_slice(),
        }
    }

    /// Builds an already-resolved batch, mostly useful for analysis in isolation.
    pub fn from_outcomes(
        epoch: PipelineEpoch,
        outcomes: impl IntoIterator<Item = Result<SegmentationMask, SegmentationError>>,
    ) -> Self {
        let slots: Vec<MaskSlot> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Ok(mask) => MaskSlot::Present(mask),
                Err(reason) => MaskSlot::Absent(reason),
            })
            .collect();
        Self {
            epoch,
            slots: slots.into_boxed_slice(),
        }
    }

    pub fn epoch(&self) -> PipelineEpoch {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&MaskSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[MaskSlot] {
        &self.slots
    }

    pub fn resolve(
        &mut self,
        index: usize,
        outcome: Result<SegmentationMask, SegmentationError>,
    ) -> SlotWrite {
        let Some(slot) = self.slots.get_mut(index) else {
            return SlotWrite::OutOfRange;
        };
        if !slot.is_pending() {
            return SlotWrite::AlreadyResolved;
        }
        *slot = match outcome {
            Ok(mask) => MaskSlot::Present(mask),
            Err(reason) => MaskSlot::Absent(reason),
        };
        SlotWrite::Written
    }

    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|s| s.mask().is_some()).count()
    }

    pub fn absent_count(&self) -> usize {
        self.slots.iter().filter(|s| s.failure().is_some()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_pending()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_batch_is_all_pending() {
        let batch = MaskBatch::new(PipelineEpoch::default(), 3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.pending_count(), 3);
        assert!(!batch.is_complete());
    }

    #[test]
    fn slot_resolves_at_most_once() {
        let mut batch = MaskBatch::new(PipelineEpoch::default(), 2);
        assert_eq!(
            batch.resolve(1, Err(SegmentationError::UnknownFailure)),
            SlotWrite::Written
        );
        assert_eq!(
            batch.resolve(1, Ok(SegmentationMask::filled(2, 2, 255))),
            SlotWrite::AlreadyResolved
        );
        assert!(matches!(
            batch.slot(1),
            Some(MaskSlot::Absent(SegmentationError::UnknownFailure))
        ));
        assert!(batch.slot(0).unwrap().is_pending());
    }

    #[test]
    fn out_of_range_write_leaves_length_untouched() {
        let mut batch = MaskBatch::new(PipelineEpoch::default(), 1);
        assert_eq!(
            batch.resolve(5, Ok(SegmentationMask::filled(1, 1, 255))),
            SlotWrite::OutOfRange
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn counts_follow_slot_states() {
        let mut batch = MaskBatch::new(PipelineEpoch::default(), 3);
        batch.resolve(0, Ok(SegmentationMask::filled(1, 1, 255)));
        batch.resolve(2, Err(SegmentationError::BackendFailure("oom".into())));
        assert_eq!(batch.present_count(), 1);
        assert_eq!(batch.absent_count(), 1);
        assert_eq!(batch.pending_count(), 1);
    }
}
