use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use crate::batch::{FrameBatch, ShapeContract};

/// Which trained head (and label vocabulary) handles a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionMode {
    Binary,
    MultiClass,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Binary => "binary",
            PredictionMode::MultiClass => "multi-class",
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown prediction mode: {0}")]
pub struct UnknownMode(String);

impl FromStr for PredictionMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(PredictionMode::Binary),
            "multi-class" => Ok(PredictionMode::MultiClass),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Video clip classifier, loaded once and shared read-only between requests.
///
/// Implementations must be safe to call concurrently.
pub trait Classifier: Send + Sync {
    /// Input shape every batch must match
    fn input_shape(&self) -> ShapeContract;

    /// Label vocabulary for a mode, `None` if that head is not loaded
    fn output_labels(&self, mode: PredictionMode) -> Option<&[String]>;

    /// One label per window, in batch order
    fn classify(&self, batch: &FrameBatch, mode: PredictionMode) -> Result<Vec<String>>;
}

mod candle;

pub use candle::{CandleClassifier, HeadSpec, ModelSource};
