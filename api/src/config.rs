//! Startup configuration from environment variables

use std::env;
use std::path::PathBuf;

use crate::classifier::{HeadSpec, ModelSource};
use crate::constants::{
    DEFAULT_BINARY_LABELS, DEFAULT_FRAME_STRIDE, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_PORT,
    DEFAULT_UPLOAD_FOLDER,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_BINARY_MODEL_DIR: &str = "assets/binary";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_folder: PathBuf,
    pub binary_model: HeadSpec,
    /// None disables multi-class prediction
    pub multi_model: Option<HeadSpec>,
    pub frame_stride: usize,
    pub max_upload_size: usize,
    pub require_prediction_type: bool,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let binary_source = match var("BINARY_MODEL_REPO") {
            Some(repo) => ModelSource::Hub(repo),
            None => ModelSource::Local(
                var("BINARY_MODEL_DIR")
                    .unwrap_or_else(|| DEFAULT_BINARY_MODEL_DIR.to_string())
                    .into(),
            ),
        };
        let binary_labels = var("BINARY_LABELS")
            .map(|s| parse_labels(&s))
            .filter(|labels| !labels.is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY_LABELS.iter().map(|s| s.to_string()).collect());

        let multi_source = var("MULTI_MODEL_REPO")
            .map(ModelSource::Hub)
            .or_else(|| var("MULTI_MODEL_DIR").map(|dir| ModelSource::Local(dir.into())));
        let multi_model = multi_source.map(|source| HeadSpec {
            source,
            labels: var("MULTI_LABELS")
                .map(|s| parse_labels(&s))
                .filter(|labels| !labels.is_empty()),
        });

        Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: positive(var("PORT"), DEFAULT_PORT),
            upload_folder: var("UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string())
                .into(),
            binary_model: HeadSpec {
                source: binary_source,
                labels: Some(binary_labels),
            },
            multi_model,
            frame_stride: positive(var("FRAME_STRIDE"), DEFAULT_FRAME_STRIDE),
            max_upload_size: positive(var("MAX_UPLOAD_SIZE"), DEFAULT_MAX_UPLOAD_SIZE),
            require_prediction_type: var("REQUIRE_PREDICTION_TYPE")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn positive<T>(value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value
        .and_then(|s| s.trim().parse().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

fn parse_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
