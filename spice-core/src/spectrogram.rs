//! # Spectrogram Module
//!
//! Builds one display column per audio callback: analyzer bins folded into
//! semitone rows with a gray-blue intensity ramp, plus red marks for the
//! confident pitches of a just-completed model cycle. Drawing is left to the
//! GUI; this module only decides colours and positions.

use crate::aggregate::{CONF_THRESHOLD, PitchFrame};
use crate::analyzer::FREQUENCY_BIN_COUNT;
use crate::pitch::{ANALYZER_MAX_FREQ, frequency_bin_to_semitone, hz_to_semitone, round_semitone};

/// Lowest semitone row drawn.
pub const FIRST_SEMITONE: usize = 36;

/// An RGB colour with alpha in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// One semitone row of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemitoneCell {
    pub semitone: usize,
    /// Vertical position as a fraction of the canvas height, from the bottom.
    pub height: f32,
    pub color: Rgba,
}

/// A detected pitch drawn over recent columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchMark {
    /// Vertical position as a fraction of the canvas height, from the bottom.
    pub height: f32,
    /// Distance from the right edge, in blocks.
    pub blocks_back: f32,
    pub color: Rgba,
}

/// Everything drawn for one audio callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramColumn {
    pub cells: Vec<SemitoneCell>,
    pub marks: Vec<PitchMark>,
}

/// Folds analyzer bins into semitone rows.
#[derive(Debug, Clone)]
pub struct SpectrogramBuilder {
    bin_count: usize,
    max_freq: f64,
    last_semitone: usize,
}

impl SpectrogramBuilder {
    pub fn new(bin_count: usize, max_freq: f64) -> Self {
        let last = round_semitone(frequency_bin_to_semitone(bin_count, bin_count, max_freq));
        Self {
            bin_count,
            max_freq,
            last_semitone: last.max(FIRST_SEMITONE as i32 + 1) as usize,
        }
    }

    /// Highest semitone row, which sits at the top of the canvas.
    pub fn last_semitone(&self) -> usize {
        self.last_semitone
    }

    /// Builds the column for one callback. `frame` is the model output of a
    /// cycle that completed on this callback, if any.
    pub fn column(&self, bins: &[u8], frame: Option<&PitchFrame>) -> SpectrogramColumn {
        let num_semitones = self.last_semitone + 1;
        let mut sums = vec![0u32; num_semitones];
        let mut counts = vec![0u32; num_semitones];

        // Semitones skipped between two neighbouring bins take the upper bin.
        let mut last_note = 0usize;
        for (i, &magnitude) in bins.iter().enumerate() {
            let semitone = frequency_bin_to_semitone(i, self.bin_count, self.max_freq);
            let note = (round_semitone(semitone).max(0) as usize).min(self.last_semitone);
            sums[note] += u32::from(magnitude);
            counts[note] += 1;
            for j in (last_note + 1)..note {
                sums[j] += u32::from(magnitude);
                counts[j] += 1;
            }
            last_note = note;
        }

        let cells = (FIRST_SEMITONE..num_semitones)
            .map(|semitone| {
                let value = f64::from(sums[semitone]) / (f64::from(counts[semitone]) + 1.0);
                SemitoneCell {
                    semitone,
                    height: self.height_of(semitone as f64),
                    color: gray_color(value),
                }
            })
            .collect();

        let marks = frame.map(|frame| self.pitch_marks(frame)).unwrap_or_default();

        SpectrogramColumn { cells, marks }
    }

    fn pitch_marks(&self, frame: &PitchFrame) -> Vec<PitchMark> {
        let len = frame.len();
        frame
            .iter()
            .enumerate()
            .filter(|&(_, (_, conf))| conf >= CONF_THRESHOLD)
            .map(|(i, (pitch, conf))| PitchMark {
                height: self.height_of(hz_to_semitone(pitch)),
                blocks_back: 2.0 + (len - i) as f32 * 0.5,
                color: red_color(conf),
            })
            .collect()
    }

    fn height_of(&self, semitone: f64) -> f32 {
        ((semitone - FIRST_SEMITONE as f64).max(0.0) / self.last_semitone as f64) as f32
    }
}

impl Default for SpectrogramBuilder {
    fn default() -> Self {
        Self::new(FREQUENCY_BIN_COUNT, ANALYZER_MAX_FREQ)
    }
}

/// Louder bins get darker: `(255 - v/2, 255 - v/2, 255)`.
fn gray_color(value: f64) -> Rgba {
    let v = (255.0 - value / 2.0).round().clamp(0.0, 255.0) as u8;
    Rgba::opaque(v, v, 255)
}

/// Fades from transparent red at the threshold to opaque blue at certainty.
fn red_color(confidence: f64) -> Rgba {
    let adjusted = ((confidence - CONF_THRESHOLD).max(0.0) / CONF_THRESHOLD).min(1.0);
    let v = (255.0 * adjusted).round() as u8;
    Rgba {
        r: 255 - v,
        g: 0,
        b: v,
        a: adjusted as f32,
    }
}
