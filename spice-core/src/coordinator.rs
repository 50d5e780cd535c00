//! # Stream Coordinator Module
//!
//! Turns the continuous stream of fixed-size audio chunks into analysis
//! windows and spreads one model cycle over three consecutive chunks:
//!
//! 1. first half of the transform outputs,
//! 2. second half of the transform outputs,
//! 3. combination call, aggregation, then buffer rotation.
//!
//! While the model works on the active window, incoming chunks collect in the
//! pending buffer, which becomes the next cycle's window.

use crate::aggregate::{AggregatedPitch, PitchFrame, confident_pitch};
use crate::buffer::DoubleBuffer;
use crate::model::{
    FIRST_HALF_OUTPUTS, InferenceEngine, ModelAdapter, ModelError, ModelOutputMap,
    SECOND_HALF_OUTPUTS, SPICE_INPUT_SAMPLES,
};

/// Step of the three-chunk model cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    FirstHalf,
    SecondHalf,
    Combine,
}

impl Phase {
    /// Numeric phase (0, 1 or 2).
    pub fn index(self) -> u8 {
        match self {
            Phase::FirstHalf => 0,
            Phase::SecondHalf => 1,
            Phase::Combine => 2,
        }
    }

    fn next(self) -> Self {
        match self {
            Phase::FirstHalf => Phase::SecondHalf,
            Phase::SecondHalf => Phase::Combine,
            Phase::Combine => Phase::FirstHalf,
        }
    }
}

/// Counters describing what the coordinator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Chunks received.
    pub chunks: u64,
    /// Cycles that reached the combination step.
    pub combine_attempts: u64,
    /// Combination calls actually sent to the engine.
    pub final_calls: u64,
    /// Cycles skipped because the window was not full yet.
    pub skipped_windows: u64,
}

/// Output of one completed model cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub frame: PitchFrame,
    pub aggregated: AggregatedPitch,
}

/// Owns the rolling buffers and transform outputs of the running cycle.
pub struct StreamCoordinator<E> {
    adapter: ModelAdapter<E>,
    buffers: DoubleBuffer,
    outputs: ModelOutputMap,
    phase: Phase,
    stats: CycleStats,
}

impl<E: InferenceEngine> StreamCoordinator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            adapter: ModelAdapter::new(engine),
            buffers: DoubleBuffer::with_capacity(SPICE_INPUT_SAMPLES),
            outputs: ModelOutputMap::new(),
            phase: Phase::default(),
            stats: CycleStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn buffers(&self) -> &DoubleBuffer {
        &self.buffers
    }

    pub fn outputs(&self) -> &ModelOutputMap {
        &self.outputs
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// Handles one audio callback's chunk.
    ///
    /// Returns the cycle's result when this chunk completed a cycle with a
    /// full window. An engine error drops the current step's output, but the
    /// phase still advances and buffers still rotate, so the next cycle
    /// starts clean.
    pub fn on_chunk(&mut self, chunk: &[f32]) -> Result<Option<CycleResult>, ModelError> {
        self.buffers.push(chunk);
        self.stats.chunks += 1;

        let phase = self.phase;
        self.phase = phase.next();

        match phase {
            Phase::FirstHalf => self.run_partial(&FIRST_HALF_OUTPUTS).map(|_| None),
            Phase::SecondHalf => self.run_partial(&SECOND_HALF_OUTPUTS).map(|_| None),
            Phase::Combine => {
                let result = self.combine();
                self.rotate();
                result
            }
        }
    }

    fn run_partial(&mut self, names: &[&str]) -> Result<(), ModelError> {
        let partial = self.adapter.run_partial(self.buffers.active(), names)?;
        self.outputs.extend(partial);
        Ok(())
    }

    fn combine(&mut self) -> Result<Option<CycleResult>, ModelError> {
        self.stats.combine_attempts += 1;

        if self.buffers.active().len() < SPICE_INPUT_SAMPLES {
            log::debug!(
                "Window not ready ({} of {} samples), skipping cycle",
                self.buffers.active().len(),
                SPICE_INPUT_SAMPLES
            );
            self.stats.skipped_windows += 1;
            return Ok(None);
        }

        self.stats.final_calls += 1;
        let frame = self.adapter.run_final(&self.outputs)?;
        let aggregated = confident_pitch(&frame);
        Ok(Some(CycleResult { frame, aggregated }))
    }

    fn rotate(&mut self) {
        self.buffers.rotate();
        self.outputs.clear();
    }
}
