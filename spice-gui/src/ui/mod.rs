//! # UI Module
//!
//! This module contains all UI components of the tuner window.

pub mod main_display;
pub mod spectrogram;
pub mod staff;
