//! # Double Buffer Module
//!
//! Two rolling sample buffers with fixed slots. One is the *active* analysis
//! window the model reads during a cycle, the other is *pending* and collects
//! the incoming audio. At the end of a cycle their roles swap.

/// Two growable sample buffers addressed by an active-slot index.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffer {
    buffers: [Vec<f32>; 2],
    active: usize,
}

impl DoubleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a double buffer whose slots can each hold `capacity` samples
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffers: [Vec::with_capacity(capacity), Vec::with_capacity(capacity)],
            active: 0,
        }
    }

    /// The current analysis window.
    pub fn active(&self) -> &[f32] {
        &self.buffers[self.active]
    }

    /// The samples collected so far for the next window.
    pub fn pending(&self) -> &[f32] {
        &self.buffers[self.pending_slot()]
    }

    /// Slot index (0 or 1) of the active buffer.
    pub fn active_slot(&self) -> usize {
        self.active
    }

    fn pending_slot(&self) -> usize {
        self.active ^ 1
    }

    /// Appends samples to the pending buffer.
    pub fn push(&mut self, samples: &[f32]) {
        let slot = self.pending_slot();
        self.buffers[slot].extend_from_slice(samples);
    }

    /// Makes the pending buffer active and empties the old active buffer,
    /// which becomes the new pending one.
    pub fn rotate(&mut self) {
        self.active = self.pending_slot();
        let slot = self.pending_slot();
        self.buffers[slot].clear();
    }
}
