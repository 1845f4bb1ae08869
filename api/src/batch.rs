//! Frame windows, batches and the classifier shape contract

use candle_core::{Device, Tensor};
use std::fmt;

/// An ordered run of sampled frames in `(frames, height, width, channels)` layout,
/// values in [0, 1], RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    frames: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl FrameWindow {
    pub fn from_vec(
        frames: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, BatchError> {
        let expected = frames * height * width * channels;
        if data.len() != expected {
            return Err(BatchError::ShapeMismatch {
                expected: format!("{} values for {:?}", expected, [frames, height, width, channels]),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            frames,
            height,
            width,
            channels,
            data,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.frames, self.height, self.width, self.channels]
    }

    #[cfg(test)]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Pixel values of one frame, `(height, width, channels)` layout
    #[cfg(test)]
    pub fn frame(&self, index: usize) -> &[f32] {
        let len = self.height * self.width * self.channels;
        &self.data[index * len..(index + 1) * len]
    }
}

/// Windows stacked along a leading batch axis: `(n, frames, height, width, channels)`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    shape: [usize; 5],
    data: Vec<f32>,
}

impl FrameBatch {
    pub fn shape(&self) -> [usize; 5] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.shape[0]
    }

    #[cfg(test)]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn to_tensor(&self, device: &Device) -> candle_core::Result<Tensor> {
        Tensor::from_vec(self.data.clone(), self.shape.to_vec(), device)
    }
}

/// Stacks frame windows into a batch
pub struct BatchAssembler;

impl BatchAssembler {
    pub fn assemble(windows: &[FrameWindow]) -> Result<FrameBatch, BatchError> {
        let first = windows.first().ok_or(BatchError::Empty)?;
        let window_shape = first.shape();

        let mut data = Vec::with_capacity(first.data.len() * windows.len());
        for (i, window) in windows.iter().enumerate() {
            if window.shape() != window_shape {
                return Err(BatchError::ShapeMismatch {
                    expected: format!("{:?}", window_shape),
                    actual: format!("window {} has shape {:?}", i, window.shape()),
                });
            }
            data.extend_from_slice(&window.data);
        }

        let [frames, height, width, channels] = window_shape;
        Ok(FrameBatch {
            shape: [windows.len(), frames, height, width, channels],
            data,
        })
    }
}

/// Input shape a classifier accepts: `(batch, frames, height, width, channels)`.
/// A `None` batch dimension accepts any number of windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeContract {
    pub batch: Option<usize>,
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ShapeContract {
    #[cfg(test)]
    pub fn new(frames: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            batch: None,
            frames,
            height,
            width,
            channels,
        }
    }

    /// Parse a Keras-style input shape such as `[null, 15, 75, 75, 3]`.
    pub fn from_dims(dims: &[Option<usize>]) -> Result<Self, BatchError> {
        let invalid = || BatchError::InvalidContract(format!("{:?}", dims));
        let [batch, frames, height, width, channels] = dims else {
            return Err(invalid());
        };
        match (frames, height, width, channels) {
            (Some(f), Some(h), Some(w), Some(c)) if *f > 0 && *h > 0 && *w > 0 && *c > 0 => {
                Ok(Self {
                    batch: *batch,
                    frames: *f,
                    height: *h,
                    width: *w,
                    channels: *c,
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Non-batch dimensions
    pub fn trailing(&self) -> [usize; 4] {
        [self.frames, self.height, self.width, self.channels]
    }

    pub fn verify(&self, batch: &FrameBatch) -> Result<(), BatchError> {
        let [n, trailing @ ..] = batch.shape();
        let batch_ok = self.batch.is_none_or(|b| b == n);
        if !batch_ok || trailing != self.trailing() {
            return Err(BatchError::ShapeMismatch {
                expected: self.to_string(),
                actual: format!("{:?}", batch.shape()),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ShapeContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.batch {
            Some(b) => write!(f, "({}, ", b)?,
            None => write!(f, "(None, ")?,
        }
        write!(
            f,
            "{}, {}, {}, {})",
            self.frames, self.height, self.width, self.channels
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("no windows to assemble")]
    Empty,
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    #[error("invalid input shape: {0}")]
    InvalidContract(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(frames: usize, size: usize, fill: f32) -> FrameWindow {
        FrameWindow::from_vec(frames, size, size, 3, vec![fill; frames * size * size * 3]).unwrap()
    }

    #[test]
    fn assemble_stacks_windows_in_order() {
        let batch = BatchAssembler::assemble(&[window(2, 4, 0.25), window(2, 4, 0.75)]).unwrap();
        assert_eq!(batch.shape(), [2, 2, 4, 4, 3]);
        assert_eq!(batch.len(), 2);
        let half = batch.data().len() / 2;
        assert!(batch.data()[..half].iter().all(|v| *v == 0.25));
        assert!(batch.data()[half..].iter().all(|v| *v == 0.75));
    }

    #[test]
    fn assemble_rejects_empty_input() {
        assert!(matches!(BatchAssembler::assemble(&[]), Err(BatchError::Empty)));
    }

    #[test]
    fn assemble_rejects_inconsistent_windows() {
        let result = BatchAssembler::assemble(&[window(2, 4, 0.0), window(2, 5, 0.0)]);
        assert!(matches!(result, Err(BatchError::ShapeMismatch { .. })));
    }

    #[test]
    fn contract_rejects_different_spatial_size() {
        let contract = ShapeContract::new(15, 75, 75, 3);
        let batch = BatchAssembler::assemble(&[window(15, 64, 0.5)]).unwrap();
        assert!(matches!(
            contract.verify(&batch),
            Err(BatchError::ShapeMismatch { .. })
        ));

        let batch = BatchAssembler::assemble(&[window(15, 75, 0.5), window(15, 75, 0.5)]).unwrap();
        assert!(contract.verify(&batch).is_ok());
    }

    #[test]
    fn fixed_batch_dimension_is_enforced() {
        let contract = ShapeContract {
            batch: Some(1),
            ..ShapeContract::new(2, 4, 4, 3)
        };
        let batch = BatchAssembler::assemble(&[window(2, 4, 0.0), window(2, 4, 0.0)]).unwrap();
        assert!(contract.verify(&batch).is_err());
    }

    #[test]
    fn contract_parses_keras_shape() {
        let contract = ShapeContract::from_dims(&[None, Some(15), Some(75), Some(75), Some(3)]).unwrap();
        assert_eq!(contract, ShapeContract::new(15, 75, 75, 3));
        assert_eq!(contract.to_string(), "(None, 15, 75, 75, 3)");

        assert!(ShapeContract::from_dims(&[None, Some(15), Some(75), Some(75)]).is_err());
        assert!(ShapeContract::from_dims(&[None, None, Some(75), Some(75), Some(3)]).is_err());
    }

    #[test]
    fn batch_converts_to_tensor() {
        let batch = BatchAssembler::assemble(&[window(2, 3, 1.0)]).unwrap();
        let tensor = batch.to_tensor(&Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 2, 3, 3, 3]);
    }
}
