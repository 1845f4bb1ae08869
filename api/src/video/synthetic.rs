//! Deterministic in-memory video sources for tests

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{DecodeError, DecodedFrame, PixelOrder, VideoBackend, VideoSource};

/// Solid-colour frames whose intensity encodes the frame index (`index % 256`).
pub struct SyntheticSource {
    pub frame_count: usize,
    /// Frames actually decodable; may be fewer than the reported count
    pub decodable: usize,
    pub fail_at: Option<usize>,
    pub width: u32,
    pub height: u32,
    pub order: PixelOrder,
    /// Channel that carries the intensity, `None` for all three
    pub channel: Option<usize>,
    next: usize,
    released: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            decodable: frame_count,
            fail_at: None,
            width: 8,
            height: 6,
            order: PixelOrder::Rgb,
            channel: None,
            next: 0,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set when the source is dropped
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    /// Frames decoded so far
    pub fn decoded(&self) -> usize {
        self.next
    }
}

impl VideoSource for SyntheticSource {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, DecodeError> {
        if self.fail_at == Some(self.next) {
            return Err(DecodeError::Decoder(format!("corrupt packet at frame {}", self.next)));
        }
        if self.next >= self.decodable {
            return Ok(None);
        }

        let value = (self.next % 256) as u8;
        let pixel = match self.channel {
            None => [value; 3],
            Some(c) => {
                let mut px = [0u8; 3];
                px[c] = value;
                px
            }
        };
        let data = pixel.repeat(self.width as usize * self.height as usize);
        self.next += 1;
        Ok(Some(DecodedFrame::new(self.width, self.height, self.order, data)))
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Backend reading a tiny text descriptor such as `frames=450` or
/// `frames=450;fail_at=20` instead of real video bytes.
#[derive(Default)]
pub struct SyntheticBackend;

impl VideoBackend for SyntheticBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| DecodeError::NotFound(path.display().to_string()))?;

        let mut frames = None;
        let mut fail_at = None;
        for part in text.trim().split(';') {
            match part.split_once('=') {
                Some(("frames", n)) => frames = n.parse::<usize>().ok(),
                Some(("fail_at", n)) => fail_at = n.parse::<usize>().ok(),
                _ => {}
            }
        }

        let frames = frames.ok_or_else(|| DecodeError::Probe("unrecognised video".into()))?;
        let mut source = SyntheticSource::new(frames);
        source.fail_at = fail_at;
        Ok(Box::new(source))
    }
}
