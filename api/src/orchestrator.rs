//! Prediction orchestration
//!
//! Persists an upload, samples it into a batch matching the classifier's
//! input shape, runs inference and maps the outcome to a [`Prediction`] or a
//! [`PredictionError`]. The uploaded file is removed on every exit path.

use anyhow::anyhow;
use axum::http::StatusCode;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{BatchAssembler, BatchError};
use crate::classifier::{Classifier, PredictionMode};
use crate::constants::{PROCESSING_FAILED, STORE_FAILED};
use crate::sampler::{EmptyReason, FrameSampler, Sampled, SamplerError};
use crate::upload::TempUpload;
use crate::video::{DecodeError, VideoBackend};

/// A single label for a one-window clip, otherwise one label per window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Single(String),
    Batch(Vec<String>),
}

impl Prediction {
    fn from_labels(mut labels: Vec<String>) -> Self {
        if labels.len() == 1 {
            Prediction::Single(labels.remove(0))
        } else {
            Prediction::Batch(labels)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("failed to store upload: {0}")]
    Persist(#[source] io::Error),
    #[error("{0} model not loaded")]
    ModeUnavailable(PredictionMode),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("nothing to classify: {0}")]
    Empty(EmptyReason),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("inference failed: {0}")]
    Inference(anyhow::Error),
}

impl PredictionError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictionError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message; internal details stay in the server log
    pub fn user_message(&self) -> &'static str {
        match self {
            PredictionError::Persist(_) => STORE_FAILED,
            _ => PROCESSING_FAILED,
        }
    }

    fn log(&self, filename: &str) {
        match self {
            PredictionError::Empty(_) => log::warn!("[predict] {}: {}", filename, self),
            _ => log::error!("[predict] {}: {}", filename, self),
        }
    }
}

/// Drives upload -> sampling -> batching -> inference for one request at a time.
/// Holds no per-request state, so one instance serves all requests.
pub struct PredictionOrchestrator {
    classifier: Arc<dyn Classifier>,
    backend: Arc<dyn VideoBackend>,
    upload_dir: PathBuf,
    stride: usize,
}

impl PredictionOrchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        backend: Arc<dyn VideoBackend>,
        upload_dir: impl Into<PathBuf>,
        stride: usize,
    ) -> Self {
        Self {
            classifier,
            backend,
            upload_dir: upload_dir.into(),
            stride,
        }
    }

    pub fn ensure_upload_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Persist a validated upload, classify it and delete it again.
    pub fn handle_upload(
        &self,
        filename: &str,
        data: &[u8],
        mode: PredictionMode,
    ) -> Result<Prediction, PredictionError> {
        let upload =
            TempUpload::create(&self.upload_dir, filename, data).map_err(PredictionError::Persist);
        let result = upload.and_then(|upload| self.predict_from_video(upload.path(), mode));

        match &result {
            Ok(prediction) => log::info!("[predict] {} ({}): {:?}", filename, mode, prediction),
            Err(e) => e.log(filename),
        }
        result
    }

    pub fn predict_from_video(
        &self,
        path: &Path,
        mode: PredictionMode,
    ) -> Result<Prediction, PredictionError> {
        if self.classifier.output_labels(mode).is_none() {
            return Err(PredictionError::ModeUnavailable(mode));
        }

        let contract = self.classifier.input_shape();
        log::debug!(
            "prediction_from_video: {:?}",
            path.file_name().unwrap_or_default()
        );
        log::debug!("input_shape: {}", contract);

        let sampler = FrameSampler::for_contract(&contract, self.stride)?;
        let windows = match sampler.sample_file(self.backend.as_ref(), path)? {
            Sampled::Windows(windows) => windows,
            Sampled::Empty(reason) => return Err(PredictionError::Empty(reason)),
        };

        let batch = BatchAssembler::assemble(&windows)?;
        contract.verify(&batch)?;

        let labels = self
            .classifier
            .classify(&batch, mode)
            .map_err(PredictionError::Inference)?;
        if labels.len() != batch.len() {
            return Err(PredictionError::Inference(anyhow!(
                "expected {} labels, got {}",
                batch.len(),
                labels.len()
            )));
        }

        Ok(Prediction::from_labels(labels))
    }
}
