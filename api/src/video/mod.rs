//! Video decoding abstraction
//!
//! The sampler only needs a frame count and a sequential stream of decoded
//! frames, so decoding sits behind a small pair of traits. The production
//! backend shells out to ffmpeg; tests plug in synthetic sources.

use image::RgbImage;
use std::path::Path;

mod ffmpeg;
#[cfg(test)]
pub mod synthetic;

pub use ffmpeg::FfmpegBackend;

/// Channel order of a decoder's interleaved 8-bit output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOrder {
    Rgb,
    #[cfg(test)]
    Bgr,
}

/// A single decoded frame in the decoder's native channel order
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub order: PixelOrder,
    pub data: Vec<u8>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, order: PixelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            order,
            data,
        }
    }

    /// Convert to an RGB image, reordering channels when the decoder emits BGR.
    pub fn to_rgb(&self) -> Result<RgbImage, DecodeError> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(DecodeError::InvalidFrame(format!(
                "{}x{} frame has {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                expected
            )));
        }

        let data = match self.order {
            PixelOrder::Rgb => self.data.clone(),
            #[cfg(test)]
            PixelOrder::Bgr => {
                let mut rgb = Vec::with_capacity(self.data.len());
                for px in self.data.chunks_exact(3) {
                    rgb.push(px[2]); // R
                    rgb.push(px[1]); // G
                    rgb.push(px[0]); // B
                }
                rgb
            }
        };

        RgbImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| DecodeError::InvalidFrame("invalid frame dimensions".into()))
    }
}

/// An opened, sequentially decodable video stream.
///
/// Implementations release their decoder when dropped.
pub trait VideoSource {
    /// Total frame count reported by the container
    fn frame_count(&self) -> usize;

    /// Decode the next frame, `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, DecodeError>;
}

/// Opens video files for decoding
pub trait VideoBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("video not found: {0}")]
    NotFound(String),
    #[error("failed to probe video: {0}")]
    Probe(String),
    #[error("decoder failed: {0}")]
    Decoder(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("decoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}
