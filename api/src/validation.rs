//! Upload request validation
//!
//! Checks run in a fixed order and stop at the first failure, whose message
//! is returned to the client verbatim.

use bytes::Bytes;

use crate::classifier::PredictionMode;
use crate::constants::ALLOWED_EXTENSIONS;

/// A file part from the multipart form
#[derive(Debug, Clone)]
pub struct UploadedVideo {
    pub filename: Option<String>,
    pub data: Bytes,
}

/// Raw form fields as received
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub video: Option<UploadedVideo>,
    pub prediction_type: Option<String>,
}

/// An upload that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub filename: String,
    pub data: Bytes,
    pub mode: PredictionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("No file found")]
    NoFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("No prediction type found")]
    NoPredictionType,
    #[error("Invalid prediction type")]
    InvalidPredictionType,
}

/// True if the text after the last `.` is an allowed video extension
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    /// When false, a missing `prediction_type` defaults to binary
    pub require_mode: bool,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self { require_mode: true }
    }
}

impl RequestValidator {
    pub fn validate(&self, form: UploadForm) -> Result<ValidatedUpload, Rejection> {
        let video = form.video.ok_or(Rejection::NoFile)?;

        let filename = match video.filename {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Rejection::NoFile),
        };

        if !allowed_file(&filename) {
            return Err(Rejection::InvalidFileType);
        }

        let mode = match form.prediction_type {
            Some(value) => value
                .parse::<PredictionMode>()
                .map_err(|_| Rejection::InvalidPredictionType)?,
            None if self.require_mode => return Err(Rejection::NoPredictionType),
            None => PredictionMode::Binary,
        };

        Ok(ValidatedUpload {
            filename,
            data: video.data,
            mode,
        })
    }
}
