//! Application constants

/// Video extensions accepted for upload (compared lowercase)
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// Default upload directory, relative to the working directory
pub const DEFAULT_UPLOAD_FOLDER: &str = "tmp/videos";

/// Maximum upload size (200 MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Keep every second frame: 30fps sources are sampled at 15fps
pub const DEFAULT_FRAME_STRIDE: usize = 2;

pub const DEFAULT_PORT: u16 = 8080;

/// Labels of the bundled binary model
pub const DEFAULT_BINARY_LABELS: [&str; 2] = ["normal", "violence"];

pub const STATUS_OK: &str = "ok";

pub const PROCESSING_FAILED: &str = "Video processing failed";
pub const STORE_FAILED: &str = "Failed to store upload";
pub const FILE_TOO_LARGE: &str = "File too large";

/// Multipart field carrying the clip
pub const VIDEO_FIELD: &str = "video";
/// Multipart field selecting binary or multi-class prediction
pub const PREDICTION_TYPE_FIELD: &str = "prediction_type";
