//! Video-to-window sampling
//!
//! Decodes a clip and turns it into fixed-length windows of fixed-size RGB
//! frames scaled to [0, 1]. Frames are strided (every `stride`-th frame is
//! kept), area-resized and collected in a rolling buffer; every time the
//! buffer fills, a copy is emitted as a window and the oldest frame is evicted.
//!
//! The number of collection passes is `frame_count / window_length`. The keep
//! counter is shared across passes and is not advanced by the frame that
//! completes a window, so after the first window each pass usually consumes a
//! single frame and the windows slide forward one frame at a time.

mod resize;
mod ring;

use std::fmt;
use std::path::Path;

use crate::batch::{FrameWindow, ShapeContract};
use crate::video::{DecodeError, VideoBackend, VideoSource};

pub use resize::resize_area_normalized;
pub use ring::WindowBuffer;

const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub target_height: usize,
    pub target_width: usize,
    /// Keep every `stride`-th frame (2 takes a 30fps clip down to 15fps)
    pub stride: usize,
    /// Frames per window
    pub window_length: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid sampler configuration: {0}")]
pub struct SamplerError(String);

/// Why sampling produced no windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// No video was supplied
    NoSource,
    /// Fewer frames than one window
    TooShort {
        frame_count: usize,
        window_length: usize,
    },
    /// Decoding ended before any window filled
    NoCompleteWindow { frame_count: usize },
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoSource => write!(f, "no video supplied"),
            EmptyReason::TooShort {
                frame_count,
                window_length,
            } => write!(
                f,
                "{} frames is shorter than one {}-frame window",
                frame_count, window_length
            ),
            EmptyReason::NoCompleteWindow { frame_count } => {
                write!(f, "no complete window in {} frames", frame_count)
            }
        }
    }
}

/// Outcome of a successful decode
#[derive(Debug)]
pub enum Sampled {
    Empty(EmptyReason),
    Windows(Vec<FrameWindow>),
}

pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Result<Self, SamplerError> {
        if config.target_height == 0 || config.target_width == 0 {
            return Err(SamplerError(format!(
                "target size must be positive, got {}x{}",
                config.target_height, config.target_width
            )));
        }
        if config.stride == 0 {
            return Err(SamplerError("stride must be at least 1".into()));
        }
        if config.window_length == 0 {
            return Err(SamplerError("window length must be at least 1".into()));
        }
        Ok(Self { config })
    }

    /// Sampler producing windows for the given classifier input shape.
    pub fn for_contract(contract: &ShapeContract, stride: usize) -> Result<Self, SamplerError> {
        Self::new(SamplerConfig {
            target_height: contract.height,
            target_width: contract.width,
            stride,
            window_length: contract.frames,
        })
    }

    #[cfg(test)]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Open `path` with `backend` and sample it. The decoder is released
    /// before this returns, whatever the outcome.
    pub fn sample_file(&self, backend: &dyn VideoBackend, path: &Path) -> Result<Sampled, DecodeError> {
        let mut source = backend.open(path)?;
        self.sample(Some(source.as_mut()))
    }

    pub fn sample<S: VideoSource + ?Sized>(&self, source: Option<&mut S>) -> Result<Sampled, DecodeError> {
        let Some(source) = source else {
            return Ok(Sampled::Empty(EmptyReason::NoSource));
        };

        let SamplerConfig {
            target_height,
            target_width,
            stride,
            window_length,
        } = self.config;

        let frame_count = source.frame_count();
        let passes = frame_count / window_length;
        if passes == 0 {
            return Ok(Sampled::Empty(EmptyReason::TooShort {
                frame_count,
                window_length,
            }));
        }

        let frame_len = target_height * target_width * CHANNELS;
        let mut buffer = WindowBuffer::new(window_length, frame_len);
        let mut windows = Vec::new();
        let mut counter = 0usize;

        'passes: for _ in 0..passes {
            loop {
                let Some(frame) = source.next_frame()? else {
                    break 'passes;
                };
                if counter % stride != 0 {
                    counter += 1;
                    continue;
                }

                let rgb = frame.to_rgb()?;
                buffer.push_with(|slot| {
                    resize_area_normalized(&rgb, target_width, target_height, slot);
                    Ok::<_, DecodeError>(())
                })?;

                if buffer.is_full() {
                    let window = buffer
                        .snapshot(target_height, target_width, CHANNELS)
                        .map_err(|e| DecodeError::InvalidFrame(e.to_string()))?;
                    windows.push(window);
                    buffer.evict_oldest();
                    break;
                }

                counter += 1;
            }
        }

        log::debug!(
            "[sampler] {} frames, {} passes, {} windows",
            frame_count,
            passes,
            windows.len()
        );

        if windows.is_empty() {
            return Ok(Sampled::Empty(EmptyReason::NoCompleteWindow { frame_count }));
        }
        Ok(Sampled::Windows(windows))
    }
}
