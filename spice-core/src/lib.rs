// spice-core/src/lib.rs

//! The core logic for the SPICE pitch tuner.
//! This crate turns microphone audio into model invocations, aggregated
//! pitches, note names and spectrogram columns. It is completely headless
//! and contains no GUI code.

pub mod aggregate;
pub mod analyzer;
pub mod audio;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod model;
pub mod pitch;
pub mod report;
pub mod session;
pub mod spectrogram;
pub mod staff;

pub use aggregate::{AggregatedPitch, PitchFrame};
pub use coordinator::{CycleResult, Phase, StreamCoordinator};
pub use model::{InferenceEngine, ModelError, NamedTensor};
pub use report::NoteReport;
pub use session::{ChunkOutput, PipelineEvent, Session};
