//! # Audio Capture Module
//!
//! This module handles real-time microphone capture using CPAL (Cross-Platform
//! Audio Library). It opens an input stream at the model's sample rate,
//! downmixes it to mono and hands fixed-size chunks to the analysis thread.
//!
//! ## Features
//! - Default or named input device selection
//! - Mono downmix of multi-channel input
//! - Exact `CHUNK_SIZE` chunks regardless of the driver's callback size

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Sample rate the pitch model expects.
pub const MODEL_SAMPLE_RATE: u32 = 16000;

/// Samples per chunk (64 ms at 16 kHz).
pub const CHUNK_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no audio input device found")]
    NoDevice,
    #[error("no f32 input format supporting {0} Hz")]
    UnsupportedFormat(u32),
    #[error("failed to list input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to query input formats: {0}")]
    Formats(#[from] cpal::SupportedStreamConfigsError),
    #[error("failed to open input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Regroups a stream of mono samples into fixed-size chunks.
#[derive(Debug)]
pub struct ChunkAssembler {
    chunk_size: usize,
    pending: Vec<f32>,
}

impl ChunkAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
        }
    }

    /// Appends samples and returns every chunk that is now complete.
    pub fn push(&mut self, samples: impl IntoIterator<Item = f32>) -> Vec<Vec<f32>> {
        self.pending.extend(samples);

        let mut chunks = Vec::new();
        while self.pending.len() >= self.chunk_size {
            chunks.push(self.pending.drain(..self.chunk_size).collect());
        }
        chunks
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    let channels = channels.max(1);
    data.chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}

/// Starts capture from the configured (or default) input device.
///
/// Chunks of exactly [`CHUNK_SIZE`] mono samples are sent on `sender`. If the
/// channel is full or closed, chunks are dropped.
///
/// # Returns
/// * `Ok(stream)` - The running stream; capture stops when it is dropped
/// * `Err(CaptureError::NoDevice)` - No microphone is available
pub fn start_audio_capture(
    device_name: Option<&str>,
    sender: Sender<Vec<f32>>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(CaptureError::NoDevice)?,
        None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
    };

    log::info!(
        "Using audio input device: {}",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, MODEL_SAMPLE_RATE)
        .ok_or(CaptureError::UnsupportedFormat(MODEL_SAMPLE_RATE))?;

    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(MODEL_SAMPLE_RATE))
        .into();
    let channels = usize::from(config.channels);

    log::info!(
        "Capturing {} channel(s) at {} Hz, {} samples per chunk",
        channels,
        MODEL_SAMPLE_RATE,
        CHUNK_SIZE
    );

    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    let mut assembler = ChunkAssembler::new(CHUNK_SIZE);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for chunk in assembler.push(downmix_to_mono(data, channels)) {
                // Chunks are dropped while the analysis thread is behind.
                let _ = sender.try_send(chunk);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok(stream)
}

/// Picks an f32 input configuration whose sample-rate range contains
/// `target_rate`, preferring the fewest channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}
