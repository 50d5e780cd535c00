//! # Spectrum Analyzer Module
//!
//! Byte-valued frequency magnitudes for the spectrogram display. This is not
//! used for pitch detection; the model computes its own transform.
//!
//! ## Behaviour
//! - Blackman window over the most recent `FFT_SIZE` samples
//! - Forward FFT using RustFFT
//! - Magnitudes scaled by `1 / FFT_SIZE` and mapped from -100..-30 dB to 0..255
//! - No smoothing between calls

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Samples per analysis frame.
pub const FFT_SIZE: usize = 1024;
/// Number of byte bins produced per frame (0 Hz to Nyquist).
pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Reusable FFT plan and window for byte spectrum frames.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        Self {
            fft,
            window: blackman_window(FFT_SIZE),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; FFT_SIZE],
        }
    }

    /// Computes the byte spectrum of the latest `FFT_SIZE` samples.
    ///
    /// Shorter inputs are treated as if preceded by silence.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> Vec<u8> {
        let recent = &samples[samples.len().saturating_sub(FFT_SIZE)..];
        let offset = FFT_SIZE - recent.len();

        for slot in self.buffer.iter_mut() {
            *slot = Complex { re: 0.0, im: 0.0 };
        }
        for (i, &sample) in recent.iter().enumerate() {
            let n = offset + i;
            self.buffer[n] = Complex {
                re: sample * self.window[n],
                im: 0.0,
            };
        }

        self.fft.process(&mut self.buffer);

        self.buffer
            .iter()
            .take(FREQUENCY_BIN_COUNT)
            .map(|c| magnitude_to_byte(c.norm() / FFT_SIZE as f32))
            .collect()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Classic Blackman window (alpha = 0.16).
fn blackman_window(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42_f32, 0.5_f32, 0.08_f32);
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 / (MAX_DECIBELS - MIN_DECIBELS) * (db - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}
