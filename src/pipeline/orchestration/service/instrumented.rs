use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Future;
use tower::Service;
use tower_layer::Layer;
use tracing::{debug, warn, Instrument};

use crate::common::Frame;

/// Wraps a per-frame service with a tracing span and timing logs
#[derive(Debug, Clone)]
pub struct InstrumentedLayer {
    stage: Arc<str>,
}

impl InstrumentedLayer {
    pub fn new(stage: impl Into<Arc<str>>) -> Self {
        Self {
            stage: stage.into(),
        }
    }
}

impl<S> Layer<S> for InstrumentedLayer {
    type Service = Instrumented<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Instrumented {
            inner,
            stage: self.stage.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrumented<S> {
    inner: S,
    stage: Arc<str>,
}

impl<S> Service<Frame> for Instrumented<S>
where
    S: Service<Frame>,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, frame: Frame) -> Self::Future {
        let span = tracing::debug_span!("frame", stage = %self.stage, index = frame.index());
        let index = frame.index();
        let start = Instant::now();
        let future = self.inner.call(frame);

        Box::pin(
            async move {
                let result = future.await;
                let duration_us = start.elapsed().as_micros() as u64;
                match &result {
                    Ok(_) => debug!("Frame {} completed in {}us", index, duration_us),
                    Err(e) => warn!("Frame {} failed after {}us: {}", index, duration_us, e),
                }
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tower::{service_fn, BoxError, ServiceExt};

    use crate::test_support::marker_frame;

    #[tokio::test]
    async fn passes_results_through() {
        let service = InstrumentedLayer::new("test").layer(service_fn(|frame: Frame| async move {
            if frame.index() == 0 {
                Ok::<_, BoxError>(frame.index())
            } else {
                Err::<usize, BoxError>("odd frame".into())
            }
        }));

        assert_eq!(service.clone().oneshot(marker_frame(0, 1)).await.unwrap(), 0);
        let error = service.oneshot(marker_frame(1, 1)).await.unwrap_err();
        assert_eq!(error.to_string(), "odd frame");
    }

    #[tokio::test]
    async fn readiness_is_delegated() {
        let limited = tower::limit::ConcurrencyLimit::new(
            service_fn(|_frame: Frame| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok::<_, BoxError>(())
            }),
            1,
        );
        let mut service = InstrumentedLayer::new("test").layer(limited);
        service.ready().await.unwrap();
        service.call(marker_frame(0, 1)).await.unwrap();
    }
}
