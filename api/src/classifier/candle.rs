use anyhow::{Context, Result, anyhow, bail};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::path::PathBuf;

use super::{Classifier, PredictionMode};
use crate::batch::{FrameBatch, ShapeContract};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";

// mean, standard deviation and frame-to-frame motion per channel
const FEATURES_PER_CHANNEL: usize = 3;

/// Where a head's `config.json` and `model.safetensors` live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl ModelSource {
    fn resolve(&self) -> Result<(PathBuf, PathBuf)> {
        match self {
            ModelSource::Local(dir) => Ok((dir.join(CONFIG_FILE), dir.join(WEIGHTS_FILE))),
            ModelSource::Hub(repo_id) => {
                let api = Api::new()?;
                let repo = api.repo(Repo::new(repo_id.clone(), RepoType::Model));
                Ok((repo.get(CONFIG_FILE)?, repo.get(WEIGHTS_FILE)?))
            }
        }
    }
}

/// Head to load, with optional label override
#[derive(Debug, Clone)]
pub struct HeadSpec {
    pub source: ModelSource,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct HeadConfig {
    /// Keras-style, e.g. `[null, 15, 75, 75, 3]`
    input_shape: Vec<Option<usize>>,
    #[serde(default)]
    labels: Vec<String>,
}

/// Linear classifier over per-channel window statistics
pub struct ClassifierHead {
    linear: Linear,
    labels: Vec<String>,
}

impl ClassifierHead {
    pub fn new(vb: VarBuilder, channels: usize, labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            bail!("No output classes configured");
        }
        let linear = candle_nn::linear(
            FEATURES_PER_CHANNEL * channels,
            labels.len(),
            vb.pp("classifier"),
        )
        .map_err(|e| anyhow!("Target classes do not match model output shape: {}", e))?;

        Ok(Self { linear, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, input: &Tensor) -> Result<Vec<String>> {
        let features = window_features(input)?;
        let logits = self.linear.forward(&features)?;
        let probs = candle_nn::ops::softmax(&logits, 1)?;
        let best: Vec<u32> = probs.argmax(1)?.to_vec1()?;

        best.into_iter()
            .map(|i| {
                self.labels
                    .get(i as usize)
                    .cloned()
                    .ok_or_else(|| anyhow!("Class index {} out of range", i))
            })
            .collect()
    }
}

/// `(n, frames, height, width, channels)` -> `(n, 3 * channels)`
fn window_features(input: &Tensor) -> candle_core::Result<Tensor> {
    let (n, f, h, w, c) = input.dims5()?;

    let flat = input.reshape((n, f * h * w, c))?;
    let mean = flat.mean_keepdim(1)?;
    let std = flat.broadcast_sub(&mean)?.sqr()?.mean(1)?.sqrt()?;

    let motion = if f > 1 {
        let diff = (input.narrow(1, 1, f - 1)? - input.narrow(1, 0, f - 1)?)?.abs()?;
        diff.reshape((n, (f - 1) * h * w, c))?.mean(1)?
    } else {
        Tensor::zeros((n, c), input.dtype(), input.device())?
    };

    Tensor::cat(&[&mean.squeeze(1)?, &std, &motion], 1)
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    let device = Device::new_metal(0).unwrap_or(Device::Cpu);
    #[cfg(not(feature = "metal"))]
    let device = Device::Cpu;
    device
}

fn load_head(name: &str, spec: &HeadSpec, device: &Device) -> Result<(ShapeContract, ClassifierHead)> {
    let (config_path, weights_path) = spec
        .source
        .resolve()
        .with_context(|| format!("Model {}: failed to locate {:?}", name, spec.source))?;

    let config: HeadConfig = serde_json::from_str(
        &std::fs::read_to_string(&config_path)
            .with_context(|| format!("Model {}: failed to read {:?}", name, config_path))?,
    )?;
    let contract = ShapeContract::from_dims(&config.input_shape)?;
    let labels = spec.labels.clone().unwrap_or(config.labels);

    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
    let head = ClassifierHead::new(vb, contract.channels, labels)?;

    log::info!("Model {} : Model loaded", name);
    log::info!("Model {} : Accepting queries of shape: {}", name, contract);
    log::info!("Model {} : Output Shape: {}", name, head.labels.len());
    log::info!("Model {} : Output classes: {:?}", name, head.labels);

    Ok((contract, head))
}

/// Candle-backed classifier with a required binary head and an optional
/// multi-class head. Both heads share one input shape.
pub struct CandleClassifier {
    contract: ShapeContract,
    binary: ClassifierHead,
    multi: Option<ClassifierHead>,
    device: Device,
}

impl CandleClassifier {
    pub fn load(binary: &HeadSpec, multi: Option<&HeadSpec>) -> Result<Self> {
        let device = select_device();
        log::info!("Loading classifier on {:?}", device);

        let (contract, binary_head) = load_head("binary", binary, &device)?;
        let multi_head = match multi {
            Some(spec) => {
                let (multi_contract, head) = load_head("multi", spec, &device)?;
                if multi_contract != contract {
                    bail!(
                        "Multi-class input shape {} differs from binary input shape {}",
                        multi_contract,
                        contract
                    );
                }
                Some(head)
            }
            None => None,
        };

        Ok(Self::from_heads(contract, binary_head, multi_head, device))
    }

    pub fn from_heads(
        contract: ShapeContract,
        binary: ClassifierHead,
        multi: Option<ClassifierHead>,
        device: Device,
    ) -> Self {
        Self {
            contract,
            binary,
            multi,
            device,
        }
    }

    fn head(&self, mode: PredictionMode) -> Option<&ClassifierHead> {
        match mode {
            PredictionMode::Binary => Some(&self.binary),
            PredictionMode::MultiClass => self.multi.as_ref(),
        }
    }
}

impl Classifier for CandleClassifier {
    fn input_shape(&self) -> ShapeContract {
        self.contract
    }

    fn output_labels(&self, mode: PredictionMode) -> Option<&[String]> {
        self.head(mode).map(|h| h.labels())
    }

    fn classify(&self, batch: &FrameBatch, mode: PredictionMode) -> Result<Vec<String>> {
        let head = self
            .head(mode)
            .ok_or_else(|| anyhow!("{} model not loaded", mode))?;
        self.contract.verify(batch)?;

        log::debug!("predict {}: {:?}", mode, batch.shape());
        let input = batch.to_tensor(&self.device)?;
        head.predict(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchAssembler, FrameWindow};
    use std::collections::HashMap;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn head(weight: Vec<f32>, bias: Vec<f32>, names: &[&str]) -> Result<ClassifierHead> {
        let outputs = bias.len();
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "classifier.weight".to_string(),
            Tensor::from_vec(weight, (outputs, 9), &device)?,
        );
        tensors.insert(
            "classifier.bias".to_string(),
            Tensor::from_vec(bias, outputs, &device)?,
        );
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        ClassifierHead::new(vb, 3, labels(names))
    }

    /// Picks "violence" when mean brightness exceeds 0.25
    fn brightness_head() -> ClassifierHead {
        let mut weight = vec![0.0; 18];
        weight[..3].copy_from_slice(&[-1.0, -1.0, -1.0]);
        weight[9..12].copy_from_slice(&[1.0, 1.0, 1.0]);
        head(weight, vec![0.0, -1.5], &["normal", "violence"]).unwrap()
    }

    /// Picks "fight" when frames change between steps
    fn motion_head() -> ClassifierHead {
        let mut weight = vec![0.0; 18];
        weight[15..18].copy_from_slice(&[10.0, 10.0, 10.0]);
        head(weight, vec![0.0, -0.5], &["calm", "fight"]).unwrap()
    }

    fn solid_window(frames: usize, size: usize, value: f32) -> FrameWindow {
        FrameWindow::from_vec(frames, size, size, 3, vec![value; frames * size * size * 3]).unwrap()
    }

    fn flicker_window(frames: usize, size: usize) -> FrameWindow {
        let frame_len = size * size * 3;
        let data = (0..frames)
            .flat_map(|i| std::iter::repeat_n((i % 2) as f32, frame_len))
            .collect();
        FrameWindow::from_vec(frames, size, size, 3, data).unwrap()
    }

    fn classifier(multi: Option<ClassifierHead>) -> CandleClassifier {
        CandleClassifier::from_heads(
            ShapeContract::new(4, 6, 6, 3),
            brightness_head(),
            multi,
            Device::Cpu,
        )
    }

    #[test]
    fn binary_head_labels_each_window() {
        let classifier = classifier(None);
        let batch =
            BatchAssembler::assemble(&[solid_window(4, 6, 0.1), solid_window(4, 6, 0.9)]).unwrap();
        let result = classifier.classify(&batch, PredictionMode::Binary).unwrap();
        assert_eq!(result, labels(&["normal", "violence"]));
    }

    #[test]
    fn multi_class_head_uses_its_own_vocabulary() {
        let classifier = classifier(Some(motion_head()));
        let batch =
            BatchAssembler::assemble(&[solid_window(4, 6, 0.5), flicker_window(4, 6)]).unwrap();
        let result = classifier.classify(&batch, PredictionMode::MultiClass).unwrap();
        assert_eq!(result, labels(&["calm", "fight"]));
        assert_eq!(
            classifier.output_labels(PredictionMode::MultiClass).unwrap(),
            labels(&["calm", "fight"]).as_slice()
        );
    }

    #[test]
    fn missing_multi_head_is_reported() {
        let classifier = classifier(None);
        assert!(classifier.output_labels(PredictionMode::MultiClass).is_none());
        let batch = BatchAssembler::assemble(&[solid_window(4, 6, 0.1)]).unwrap();
        assert!(classifier.classify(&batch, PredictionMode::MultiClass).is_err());
    }

    #[test]
    fn batch_outside_contract_is_rejected() {
        let classifier = classifier(None);
        let batch = BatchAssembler::assemble(&[solid_window(4, 5, 0.1)]).unwrap();
        let err = classifier.classify(&batch, PredictionMode::Binary).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn label_count_must_match_output_width() {
        let result = head(vec![0.0; 18], vec![0.0, 0.0], &["a", "b", "c"]);
        let err = result.err().unwrap();
        assert!(err.to_string().contains("Target classes do not match"));
    }

    #[test]
    fn single_frame_windows_have_no_motion() {
        let input = solid_window(1, 2, 0.5);
        let batch = BatchAssembler::assemble(&[input]).unwrap();
        let features = window_features(&batch.to_tensor(&Device::Cpu).unwrap()).unwrap();
        let values: Vec<f32> = features.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(values, vec![0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
