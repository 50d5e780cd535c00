//! # Model Invocation Module
//!
//! Wraps the pretrained pitch model behind two calls. The model is split in
//! two stages: a constant-Q transform computed from raw audio (fetched in two
//! halves so the work spreads over two audio callbacks), and a combination
//! stage that turns the transform into per-sub-frame labels and uncertainties.
//!
//! The engine itself is opaque and reached through [`InferenceEngine`].

use std::collections::BTreeMap;

use crate::aggregate::PitchFrame;
use crate::pitch::label_to_hz;

/// Number of samples the model takes per analysis window.
pub const SPICE_INPUT_SAMPLES: usize = 3072;

/// Column count of the transform tensors fed to the combination stage.
pub const FINAL_INPUT_COLUMNS: usize = 257;

/// Name of the model's audio input tensor.
pub const INPUT_AUDIO_SAMPLES: &str = "input_audio_samples";

/// Transform outputs fetched in the first partial call.
pub const FIRST_HALF_OUTPUTS: [&str; 6] = ["Real", "Imag", "Real_1", "Imag_1", "Real_2", "Imag_2"];

/// Transform outputs fetched in the second partial call.
pub const SECOND_HALF_OUTPUTS: [&str; 6] =
    ["Real_3", "Imag_3", "Real_4", "Imag_4", "Real_5", "Imag_5"];

/// Named transform outputs collected across the partial calls of one cycle.
pub type ModelOutputMap = BTreeMap<String, Vec<f32>>;

/// Errors raised while talking to the inference engine.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("inference engine error: {0}")]
    Engine(#[from] ort::Error),
    #[error("invalid tensor shape: {0}")]
    Array(#[from] ndarray::ShapeError),
    #[error("output '{name}' holds {len} values, not a multiple of {columns}")]
    Shape {
        name: String,
        len: usize,
        columns: usize,
    },
    #[error("engine returned no output named '{0}'")]
    MissingOutput(String),
    #[error("engine returned {got} outputs, expected at least {expected}")]
    TooFewOutputs { expected: usize, got: usize },
    #[error("{stage} model does not declare {kind} '{name}'")]
    Undeclared {
        stage: &'static str,
        kind: &'static str,
        name: String,
    },
}

/// A named, dense f32 tensor handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }
}

/// The opaque inference engine.
///
/// With `Some(names)` the returned values follow the order of `names`. With
/// `None` the engine runs its default outputs in their declared order.
pub trait InferenceEngine {
    fn execute(
        &mut self,
        inputs: Vec<NamedTensor>,
        outputs: Option<&[&str]>,
    ) -> Result<Vec<Vec<f32>>, ModelError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn execute(
        &mut self,
        inputs: Vec<NamedTensor>,
        outputs: Option<&[&str]>,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        (**self).execute(inputs, outputs)
    }
}

/// Drives the partial/final invocation protocol over an [`InferenceEngine`].
#[derive(Debug)]
pub struct ModelAdapter<E> {
    engine: E,
}

impl<E: InferenceEngine> ModelAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Runs the audio input through the model and fetches `output_names`.
    ///
    /// Windows shorter than [`SPICE_INPUT_SAMPLES`] are not run and yield an
    /// empty map. Longer buffers contribute their most recent window.
    pub fn run_partial(
        &mut self,
        samples: &[f32],
        output_names: &[&str],
    ) -> Result<ModelOutputMap, ModelError> {
        if samples.len() < SPICE_INPUT_SAMPLES {
            log::debug!(
                "Skipping partial call: window holds {} of {} samples",
                samples.len(),
                SPICE_INPUT_SAMPLES
            );
            return Ok(ModelOutputMap::new());
        }

        let window = &samples[samples.len() - SPICE_INPUT_SAMPLES..];
        let input = NamedTensor::new(
            INPUT_AUDIO_SAMPLES,
            vec![SPICE_INPUT_SAMPLES],
            window.to_vec(),
        );
        let values = self.engine.execute(vec![input], Some(output_names))?;
        if values.len() < output_names.len() {
            return Err(ModelError::TooFewOutputs {
                expected: output_names.len(),
                got: values.len(),
            });
        }

        Ok(output_names
            .iter()
            .map(|name| name.to_string())
            .zip(values)
            .collect())
    }

    /// Runs the combination stage on the collected transform outputs.
    ///
    /// Each entry is reshaped to `[-1, 257]`. The engine's first two default
    /// outputs are the uncertainties and the labels, in that order.
    pub fn run_final(&mut self, outputs: &ModelOutputMap) -> Result<PitchFrame, ModelError> {
        let inputs = outputs
            .iter()
            .map(|(name, values)| {
                if values.len() % FINAL_INPUT_COLUMNS != 0 {
                    return Err(ModelError::Shape {
                        name: name.clone(),
                        len: values.len(),
                        columns: FINAL_INPUT_COLUMNS,
                    });
                }
                let rows = values.len() / FINAL_INPUT_COLUMNS;
                Ok(NamedTensor::new(
                    name.clone(),
                    vec![rows, FINAL_INPUT_COLUMNS],
                    values.clone(),
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = self.engine.execute(inputs, None)?;
        let [uncertainties, labels, ..] = values.as_slice() else {
            return Err(ModelError::TooFewOutputs {
                expected: 2,
                got: values.len(),
            });
        };

        Ok(pitch_and_confidence(labels, uncertainties))
    }
}

/// Converts model labels to Hz and uncertainties to confidences.
pub fn pitch_and_confidence(labels: &[f32], uncertainties: &[f32]) -> PitchFrame {
    let len = labels.len().min(uncertainties.len());
    let pitches = labels[..len]
        .iter()
        .map(|&label| label_to_hz(f64::from(label)))
        .collect();
    let confidences = uncertainties[..len]
        .iter()
        .map(|&uncertainty| 1.0 - f64::from(uncertainty))
        .collect();
    PitchFrame::new(pitches, confidences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingEngine {
        calls: Vec<(Vec<NamedTensor>, Option<Vec<String>>)>,
    }

    impl InferenceEngine for RecordingEngine {
        fn execute(
            &mut self,
            inputs: Vec<NamedTensor>,
            outputs: Option<&[&str]>,
        ) -> Result<Vec<Vec<f32>>, ModelError> {
            let names = outputs.map(|names| names.iter().map(|n| n.to_string()).collect());
            let reply = match outputs {
                Some(names) => names
                    .iter()
                    .map(|_| vec![0.5; FINAL_INPUT_COLUMNS * 2])
                    .collect(),
                None => vec![vec![0.1, 0.9, 0.0], vec![0.5, 0.5, 0.25]],
            };
            self.calls.push((inputs, names));
            Ok(reply)
        }
    }

    #[test]
    fn undersized_window_is_not_run() {
        let mut adapter = ModelAdapter::new(RecordingEngine::default());
        let map = adapter
            .run_partial(&vec![0.0; SPICE_INPUT_SAMPLES - 1], &FIRST_HALF_OUTPUTS)
            .unwrap();
        assert!(map.is_empty());
        assert!(adapter.engine().calls.is_empty());
    }

    #[test]
    fn partial_call_feeds_one_window_and_maps_names() {
        let mut adapter = ModelAdapter::new(RecordingEngine::default());
        let mut samples = vec![0.0; 1024];
        samples.extend(std::iter::repeat_n(1.0, SPICE_INPUT_SAMPLES));
        let map = adapter.run_partial(&samples, &SECOND_HALF_OUTPUTS).unwrap();

        assert_eq!(map.len(), 6);
        assert!(map.contains_key("Imag_5"));

        let (inputs, names) = &adapter.engine().calls[0];
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, INPUT_AUDIO_SAMPLES);
        assert_eq!(inputs[0].shape, vec![SPICE_INPUT_SAMPLES]);
        assert!(inputs[0].data.iter().all(|&s| s == 1.0));
        assert_eq!(names.as_ref().map(Vec::len), Some(6));
    }

    #[test]
    fn final_call_reshapes_and_decodes_in_order() {
        let mut adapter = ModelAdapter::new(RecordingEngine::default());
        let mut outputs = ModelOutputMap::new();
        outputs.insert("Real".into(), vec![0.0; FINAL_INPUT_COLUMNS * 3]);

        let frame = adapter.run_final(&outputs).unwrap();
        let (inputs, names) = &adapter.engine().calls[0];
        assert_eq!(inputs[0].shape, vec![3, FINAL_INPUT_COLUMNS]);
        assert!(names.is_none());

        assert_eq!(frame.len(), 3);
        assert!((frame.confidences[0] - 0.9).abs() < 1e-6);
        assert!((frame.confidences[2] - 1.0).abs() < 1e-6);
        assert!((frame.pitches[0] - label_to_hz(0.5)).abs() < 1e-9);
        assert!((frame.pitches[2] - label_to_hz(0.25)).abs() < 1e-9);
    }

    #[test]
    fn final_call_rejects_ragged_outputs() {
        let mut adapter = ModelAdapter::new(RecordingEngine::default());
        let mut outputs = ModelOutputMap::new();
        outputs.insert("Imag".into(), vec![0.0; FINAL_INPUT_COLUMNS + 1]);
        assert!(matches!(
            adapter.run_final(&outputs),
            Err(ModelError::Shape { len, .. }) if len == FINAL_INPUT_COLUMNS + 1
        ));
        assert!(adapter.engine().calls.is_empty());
    }
}
