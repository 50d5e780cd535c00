//! # Inference Engine Module
//!
//! ONNX Runtime backed [`InferenceEngine`] and the lookup that turns a
//! configured model source (local path or URL) into a file on disk.
//!
//! ONNX Runtime only feeds declared graph inputs and only returns declared
//! graph outputs, so the pitch model ships as two graphs: the transform stage
//! (`input_audio_samples` in, `Real`..`Imag_5` out) and the combination stage
//! (those twelve tensors in, uncertainties and labels out). Partial calls go
//! to the transform session and the final call goes to the combination
//! session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ndarray::{ArrayD, IxDyn};
use ort::{GraphOptimizationLevel, Session, Tensor};

use crate::model::{
    FIRST_HALF_OUTPUTS, INPUT_AUDIO_SAMPLES, InferenceEngine, ModelError, NamedTensor,
    SECOND_HALF_OUTPUTS,
};

type Feed = Vec<(String, Tensor<f32>)>;

/// Both stages of the pitch model, loaded from ONNX files.
pub struct OrtEngine {
    transform: Session,
    combine: Session,
    /// Declared outputs of the combination stage, uncertainties first.
    combine_outputs: Vec<String>,
}

impl OrtEngine {
    /// Builds both stage sessions and checks that they speak the
    /// partial/final protocol.
    pub fn from_files(transform: &Path, combine: &Path, intra_threads: usize) -> Result<Self> {
        let transform_session = load_session(transform, intra_threads)?;
        check_transform_stage(
            &input_names(&transform_session),
            &output_names(&transform_session),
        )
        .with_context(|| format!("{} is not a pitch transform model", transform.display()))?;

        let combine_session = load_session(combine, intra_threads)?;
        let combine_outputs = output_names(&combine_session);
        check_combine_stage(&input_names(&combine_session), &combine_outputs)
            .with_context(|| format!("{} is not a pitch combination model", combine.display()))?;

        log::info!(
            "Loaded pitch model stages {} and {} (outputs: {})",
            transform.display(),
            combine.display(),
            combine_outputs.join(", ")
        );

        Ok(Self {
            transform: transform_session,
            combine: combine_session,
            combine_outputs,
        })
    }
}

impl InferenceEngine for OrtEngine {
    fn execute(
        &mut self,
        inputs: Vec<NamedTensor>,
        outputs: Option<&[&str]>,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        let feed = build_feed(inputs)?;
        match outputs {
            Some(names) => run_stage(&self.transform, feed, names),
            None => {
                let names: Vec<&str> = self.combine_outputs.iter().map(String::as_str).collect();
                run_stage(&self.combine, feed, &names)
            }
        }
    }
}

fn load_session(path: &Path, intra_threads: usize) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads.max(1))?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load pitch model from {}", path.display()))
}

fn input_names(session: &Session) -> Vec<String> {
    session.inputs.iter().map(|input| input.name.clone()).collect()
}

fn output_names(session: &Session) -> Vec<String> {
    session.outputs.iter().map(|output| output.name.clone()).collect()
}

fn build_feed(inputs: Vec<NamedTensor>) -> Result<Feed, ModelError> {
    let mut feed = Vec::with_capacity(inputs.len());
    for input in inputs {
        let array = ArrayD::from_shape_vec(IxDyn(&input.shape), input.data)?;
        feed.push((input.name, Tensor::from_array(array)?));
    }
    Ok(feed)
}

/// Runs one session and returns the `names` outputs in that order.
fn run_stage(session: &Session, feed: Feed, names: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
    let results = session.run(feed)?;

    let mut decoded: HashMap<&str, Vec<f32>> = HashMap::new();
    for (&name, value) in results.iter() {
        let tensor = value.try_extract_tensor::<f32>()?;
        decoded.insert(name, tensor.iter().copied().collect());
    }

    names
        .iter()
        .map(|&name| {
            decoded
                .remove(name)
                .ok_or_else(|| ModelError::MissingOutput(name.to_string()))
        })
        .collect()
}

fn transform_outputs() -> impl Iterator<Item = &'static str> {
    FIRST_HALF_OUTPUTS.into_iter().chain(SECOND_HALF_OUTPUTS)
}

fn require_declared<'a>(
    stage: &'static str,
    kind: &'static str,
    declared: &[String],
    required: impl IntoIterator<Item = &'a str>,
) -> Result<(), ModelError> {
    match required
        .into_iter()
        .find(|name| !declared.iter().any(|d| d == name))
    {
        Some(name) => Err(ModelError::Undeclared {
            stage,
            kind,
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// The transform stage takes the audio window and yields all twelve
/// transform tensors.
fn check_transform_stage(inputs: &[String], outputs: &[String]) -> Result<(), ModelError> {
    require_declared("transform", "input", inputs, [INPUT_AUDIO_SAMPLES])?;
    require_declared("transform", "output", outputs, transform_outputs())
}

/// The combination stage takes the twelve transform tensors and yields at
/// least uncertainties and labels.
fn check_combine_stage(inputs: &[String], outputs: &[String]) -> Result<(), ModelError> {
    require_declared("combination", "input", inputs, transform_outputs())?;
    if outputs.len() < 2 {
        return Err(ModelError::TooFewOutputs {
            expected: 2,
            got: outputs.len(),
        });
    }
    Ok(())
}

/// Resolves a model source to a local ONNX file.
///
/// - An existing file path is used directly.
/// - An `http(s)` URL is downloaded once into the model cache directory and
///   re-used on later runs.
pub fn resolve_model_path(source: &str) -> Result<PathBuf> {
    let as_path = Path::new(source);
    if as_path.exists() {
        log::info!("Using pitch model from path: {}", as_path.display());
        return Ok(as_path.to_path_buf());
    }

    if !is_remote(source) {
        return Err(anyhow!(
            "Pitch model '{}' not found. Provide an existing .onnx path or an http(s) URL.",
            source
        ));
    }

    let cached_path = model_cache_dir()?.join(cache_file_name(source));
    if cached_path.exists() {
        log::info!("Using cached pitch model: {}", cached_path.display());
        return Ok(cached_path);
    }

    log::info!("Downloading pitch model from {}...", source);
    download_model(source, &cached_path)?;
    log::info!("Model saved to {}", cached_path.display());

    Ok(cached_path)
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// File name a URL is cached under: its characters with everything but
/// ASCII alphanumerics folded to `_`.
fn cache_file_name(url: &str) -> String {
    let stem: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.ends_with("_onnx") {
        format!("{}.onnx", stem.trim_end_matches("_onnx"))
    } else {
        format!("{stem}.onnx")
    }
}

fn model_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(dirs::home_dir)
        .context("Cannot determine cache directory")?;
    let dir = base.join("spice-tuner").join("models");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model cache dir: {}", dir.display()))?;
    Ok(dir)
}

fn download_model(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download pitch model from {url}"))?;
    let bytes = response
        .bytes()
        .context("Failed to read pitch model response body")?;

    // An interrupted download must never show up as a cached model.
    let partial = dest.with_extension("onnx.part");
    std::fs::write(&partial, &bytes)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move model into {}", dest.display()))?;
    Ok(())
}
