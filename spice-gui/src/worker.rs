//! # Analysis Worker
//!
//! Dedicated thread that loads the pitch model, opens the microphone and runs
//! every captured chunk through a [`Session`], forwarding the resulting
//! events to the GUI thread.

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use spice_core::{
    PipelineEvent, Session,
    audio::{self, CaptureError},
    config::Config,
    engine::{self, OrtEngine},
    report::capture_status,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Capacity of the raw chunk queue between the audio callback and the worker.
const RAW_QUEUE_CHUNKS: usize = 64;

/// Settings the worker thread needs, copied out of the config.
#[derive(Debug, Clone)]
struct WorkerSettings {
    transform_source: String,
    combine_source: String,
    intra_threads: usize,
    device: Option<String>,
}

/// Audio worker thread management structure.
#[derive(Debug)]
pub struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Spawns the analysis thread. Events arrive on `events`.
    pub fn spawn(config: &Config, events: Sender<PipelineEvent>) -> Self {
        let settings = WorkerSettings {
            transform_source: config.model.transform.clone(),
            combine_source: config.model.combine.clone(),
            intra_threads: config.model.intra_threads,
            device: config.audio.device_name().map(str::to_owned),
        };
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let spawned = thread::Builder::new()
            .name("audio-analysis".into())
            .spawn(move || {
                log::info!("Analysis thread starting...");
                if let Err(e) = run(settings, &events, &shutdown_rx) {
                    log::error!("Analysis thread stopped: {:#}", e);
                }
                log::info!("Analysis thread finished");
            });

        let thread_handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn analysis thread: {}", e);
                None
            }
        };

        Self {
            shutdown_tx,
            thread_handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        // Model loading can block for a long time; only join a finished thread.
        if let Some(handle) = self.thread_handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn run(
    settings: WorkerSettings,
    events: &Sender<PipelineEvent>,
    shutdown: &Receiver<()>,
) -> Result<()> {
    let engine = match load_engine(&settings) {
        Ok(engine) => engine,
        Err(e) => {
            let _ = events.send(PipelineEvent::Status(format!(
                "Could not load the pitch model: {e:#}"
            )));
            return Err(e);
        }
    };
    let mut session = Session::new(engine);

    let (raw_tx, raw_rx) = crossbeam_channel::bounded::<Vec<f32>>(RAW_QUEUE_CHUNKS);
    let stream = match audio::start_audio_capture(settings.device.as_deref(), raw_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(PipelineEvent::Status(capture_status(&e)));
            if matches!(e, CaptureError::NoDevice) {
                log::warn!("No microphone available, pipeline not started");
                return Ok(());
            }
            return Err(e).context("Failed to start audio capture");
        }
    };
    let _ = events.send(PipelineEvent::Status(String::new()));

    log::info!("Entering audio processing loop...");
    loop {
        let keep_running = crossbeam_channel::select! {
            recv(raw_rx) -> msg => match msg {
                Ok(chunk) => session
                    .process_chunk(&chunk)
                    .into_events()
                    .all(|event| events.send(event).is_ok()),
                Err(_) => {
                    log::warn!("Audio channel closed");
                    false
                }
            },
            recv(shutdown) -> _ => {
                log::info!("Received shutdown signal");
                false
            },
        };
        if !keep_running {
            break;
        }
    }

    let stats = session.stats();
    log::info!(
        "Processed {} chunks, {} model cycles ({} skipped)",
        stats.chunks,
        stats.final_calls,
        stats.skipped_windows
    );

    if let Err(e) = stream.pause() {
        log::warn!("Error pausing stream: {}", e);
    }
    // Give the stream a moment to fully stop
    thread::sleep(Duration::from_millis(50));
    drop(stream);
    Ok(())
}

fn load_engine(settings: &WorkerSettings) -> Result<OrtEngine> {
    let transform = engine::resolve_model_path(&settings.transform_source)?;
    let combine = engine::resolve_model_path(&settings.combine_source)?;
    OrtEngine::from_files(&transform, &combine, settings.intra_threads)
}
