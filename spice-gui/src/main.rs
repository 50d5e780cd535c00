//! # SPICE Tuner - Live Pitch Detection GUI
//!
//! This module contains the main GUI application. It shows the detected
//! frequency, note name and confidence of the microphone signal, a scrolling
//! semitone spectrogram and a staff with recently detected notes.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Analysis Thread**: Loads the model and runs the pitch pipeline
//! - **Communication**: Crossbeam channels for thread-safe data exchange
//! - **Updates**: 60 FPS continuous updates via subscription system

mod ui;
mod worker;

use crossbeam_channel::Receiver;
use iced::{Element, Subscription, Theme};
use spice_core::{
    NoteReport, PipelineEvent,
    config::{self, Config},
    report::NO_FREQUENCY,
    spectrogram::SpectrogramColumn,
    staff::{NoteStaff, StaffNote},
};
use std::collections::VecDeque;
use std::time::Duration;
use ui::main_display::create_main_view;
use worker::AudioWorker;

/// Columns kept for the scrolling spectrogram; wider windows show empty space.
const SPECTROGRAM_HISTORY: usize = 1024;

/// Main entry point for the tuner application.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting SPICE tuner...");
    let result = iced::application("SPICE Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .run();
    log::info!("Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    ToggleSpectrogram,
    ToggleStaff,
    /// Timer tick for real-time updates
    Tick,
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub status: String,
    pub frequency: String,
    pub note_name: String,
    pub confidence: String,

    /// Newest column first.
    pub columns: VecDeque<SpectrogramColumn>,
    pub block_size: f32,

    pub staff_notes: Vec<StaffNote>,
    pub note_lifetime: Duration,

    pub spectrogram_visible: bool,
    pub staff_visible: bool,
}

impl AppDisplayData {
    fn new(config: &Config) -> Self {
        Self {
            status: "Loading SPICE model...".to_string(),
            frequency: NO_FREQUENCY.to_string(),
            note_name: String::new(),
            confidence: String::new(),
            columns: VecDeque::with_capacity(SPECTROGRAM_HISTORY),
            block_size: config.display.block_size,
            staff_notes: Vec::new(),
            note_lifetime: config.display.note_lifetime(),
            spectrogram_visible: true,
            staff_visible: true,
        }
    }

    fn show_report(&mut self, report: &NoteReport) {
        self.frequency.clone_from(&report.frequency);
        self.note_name.clone_from(&report.note_name);
        self.confidence.clone_from(&report.confidence);
    }

    fn push_column(&mut self, column: SpectrogramColumn) {
        self.columns.push_front(column);
        self.columns.truncate(SPECTROGRAM_HISTORY);
    }
}

/// Main application state.
#[derive(Debug)]
struct TunerApp {
    // Kept alive for the lifetime of the window; dropping it stops analysis.
    worker: AudioWorker,
    event_receiver: Receiver<PipelineEvent>,
    staff: NoteStaff,
    display_data: AppDisplayData,
}

impl Default for TunerApp {
    /// Loads the configuration and starts the analysis thread.
    fn default() -> Self {
        let config = config::load_or_default();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let worker = AudioWorker::spawn(&config, event_tx);

        Self {
            worker,
            event_receiver: event_rx,
            staff: NoteStaff::new(config.display.note_lifetime(), config.display.note_decimation),
            display_data: AppDisplayData::new(&config),
        }
    }
}

impl TunerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::ToggleSpectrogram => {
                self.display_data.spectrogram_visible = !self.display_data.spectrogram_visible;
            }
            Message::ToggleStaff => {
                self.display_data.staff_visible = !self.display_data.staff_visible;
            }
            Message::Tick => {
                while let Ok(event) = self.event_receiver.try_recv() {
                    self.process_event(event);
                }
                self.display_data.staff_notes = self.staff.visible_notes();
            }
        }
    }

    /// Applies one event from the analysis thread to the display state.
    fn process_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Status(status) => {
                if !status.is_empty() {
                    log::info!("Status: {}", status);
                }
                self.display_data.status = status;
            }
            PipelineEvent::Note(report) => {
                self.display_data.show_report(&report);
                self.staff.draw_note(report.note);
            }
            PipelineEvent::Spectrum(column) => self.display_data.push_column(column),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.worker.is_running())
    }

    /// Fires every 16ms (60 FPS) to drain the analysis channel.
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
