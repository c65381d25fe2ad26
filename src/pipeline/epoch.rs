use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Generation counter isolating one pipeline run from a superseded one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PipelineEpoch(u64);

impl PipelineEpoch {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PipelineEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}

/// Shared source of truth for the active epoch.
///
/// Only the controller advances it; everything else holds an `EpochWatch`.
#[derive(Debug, Clone)]
pub struct EpochClock {
    tx: Arc<watch::Sender<PipelineEpoch>>,
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochClock {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PipelineEpoch::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> PipelineEpoch {
        *self.tx.borrow()
    }

    pub fn is_current(&self, epoch: PipelineEpoch) -> bool {
        self.current() == epoch
    }

    /// Moves to a fresh epoch and returns it. Every outstanding watch becomes stale.
    pub fn advance(&self) -> PipelineEpoch {
        let mut advanced = PipelineEpoch::default();
        self.tx.send_modify(|epoch| {
            *epoch = epoch.next();
            advanced = *epoch;
        });
        advanced
    }

    pub fn watch(&self, epoch: PipelineEpoch) -> EpochWatch {
        EpochWatch {
            epoch,
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes whether the epoch a piece of work was issued under is still active.
#[derive(Debug, Clone)]
pub struct EpochWatch {
    epoch: PipelineEpoch,
    rx: watch::Receiver<PipelineEpoch>,
}

impl EpochWatch {
    pub fn epoch(&self) -> PipelineEpoch {
        self.epoch
    }

    pub fn is_stale(&self) -> bool {
        *self.rx.borrow() != self.epoch
    }

    /// Resolves once the clock has moved past this watch's epoch.
    pub async fn superseded(&mut self) {
        loop {
            if self.is_stale() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Clock dropped: nothing can supersede us any more.
                futures::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn advance_is_monotonic() {
        let clock = EpochClock::new();
        let e1 = clock.advance();
        let e2 = clock.advance();
        assert!(e2 > e1);
        assert!(clock.is_current(e2));
        assert!(!clock.is_current(e1));
    }

    #[test]
    fn watch_goes_stale_after_advance() {
        let clock = EpochClock::new();
        let e1 = clock.advance();
        let watch = clock.watch(e1);
        assert!(!watch.is_stale());
        clock.advance();
        assert!(watch.is_stale());
    }

    #[tokio::test]
    async fn superseded_wakes_on_advance() {
        let clock = EpochClock::new();
        let e1 = clock.advance();
        let mut watch = clock.watch(e1);

        let waiter = tokio::spawn(async move {
            watch.superseded().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        clock.advance();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("watch was not woken")
            .unwrap();
    }
}
