//! # Session Module
//!
//! One pitch-tracking session: the stream coordinator, the spectrum analyzer
//! and the spectrogram builder, driven once per audio chunk. The session is
//! built once and owned by the analysis thread; nothing else touches its
//! buffers.

use crate::analyzer::SpectrumAnalyzer;
use crate::coordinator::{CycleStats, StreamCoordinator};
use crate::model::InferenceEngine;
use crate::report::NoteReport;
use crate::spectrogram::{SpectrogramBuilder, SpectrogramColumn};

/// Messages sent from the analysis thread to the presentation layer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Plain status text, e.g. a missing microphone.
    Status(String),
    /// Readout of a completed model cycle.
    Note(NoteReport),
    /// Spectrogram column of one audio callback.
    Spectrum(SpectrogramColumn),
}

/// What one audio chunk produced.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    /// Present when this chunk completed a cycle with a full window.
    pub report: Option<NoteReport>,
    pub column: SpectrogramColumn,
}

impl ChunkOutput {
    /// Flattens the output into presentation events, note first.
    pub fn into_events(self) -> impl Iterator<Item = PipelineEvent> {
        self.report
            .map(PipelineEvent::Note)
            .into_iter()
            .chain(std::iter::once(PipelineEvent::Spectrum(self.column)))
    }
}

pub struct Session<E> {
    coordinator: StreamCoordinator<E>,
    analyzer: SpectrumAnalyzer,
    spectrogram: SpectrogramBuilder,
}

impl<E: InferenceEngine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            coordinator: StreamCoordinator::new(engine),
            analyzer: SpectrumAnalyzer::new(),
            spectrogram: SpectrogramBuilder::default(),
        }
    }

    pub fn stats(&self) -> CycleStats {
        self.coordinator.stats()
    }

    pub fn coordinator(&self) -> &StreamCoordinator<E> {
        &self.coordinator
    }

    /// Runs one audio callback.
    ///
    /// A failing inference call only drops this cycle's readout; the
    /// spectrogram column is produced either way.
    pub fn process_chunk(&mut self, chunk: &[f32]) -> ChunkOutput {
        let cycle = match self.coordinator.on_chunk(chunk) {
            Ok(cycle) => cycle,
            Err(e) => {
                log::warn!("Dropping model cycle: {}", e);
                None
            }
        };

        let bins = self.analyzer.byte_frequency_data(chunk);
        let column = self
            .spectrogram
            .column(&bins, cycle.as_ref().map(|c| &c.frame));

        ChunkOutput {
            report: cycle.map(|c| NoteReport::from_pitch(c.aggregated)),
            column,
        }
    }
}
