use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::common::Frame;
use crate::error::ExtractionError;
use crate::intake::frame_source::{FrameSource, VideoHandle};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Treats a directory of already-decoded frame images as a video.
///
/// Files are ordered by name and assumed to be `source_fps` apart.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    source_fps: f64,
}

impl ImageSequenceSource {
    pub fn new(source_fps: f64) -> Self {
        Self { source_fps }
    }

    fn sampling_step(&self, sampling_rate_hz: f64) -> usize {
        if sampling_rate_hz >= self.source_fps {
            return 1;
        }
        ((self.source_fps / sampling_rate_hz).round() as usize).max(1)
    }

    fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ExtractionError::DecodeFailure(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ExtractionError::DecodeFailure(e.to_string()))?
                .path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    #[instrument(skip(self, video), fields(video = %video))]
    async fn extract(
        &self,
        video: &VideoHandle,
        sampling_rate_hz: f64,
    ) -> Result<Vec<Frame>, ExtractionError> {
        if !sampling_rate_hz.is_finite() || sampling_rate_hz <= 0.0 {
            return Err(ExtractionError::DecodeFailure(format!(
                "invalid sampling rate {}",
                sampling_rate_hz
            )));
        }
        if !self.source_fps.is_finite() || self.source_fps <= 0.0 {
            return Err(ExtractionError::DecodeFailure(format!(
                "invalid source frame rate {}",
                self.source_fps
            )));
        }

        let dir = video.path().to_path_buf();
        let step = self.sampling_step(sampling_rate_hz);
        let source_fps = self.source_fps;

        let frames = tokio::task::spawn_blocking(move || {
            let paths = Self::list_frames(&dir)?;
            paths
                .iter()
                .enumerate()
                .step_by(step)
                .enumerate()
                .map(|(index, (position, path))| {
                    let image = image::open(path).map_err(|e| {
                        ExtractionError::DecodeFailure(format!("{}: {}", path.display(), e))
                    })?;
                    let timestamp = Duration::from_secs_f64(position as f64 / source_fps);
                    Ok(Frame::new(index, image, timestamp))
                })
                .collect::<Result<Vec<_>, ExtractionError>>()
        })
        .await
        .map_err(|e| ExtractionError::DecodeFailure(format!("decoder task failed: {}", e)))??;

        debug!("Sampled {} frames (every {} source frame)", frames.len(), step);
        Ok(frames)
    }
}
