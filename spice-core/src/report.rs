//! Values handed to the presentation layer once per completed model cycle.

use crate::aggregate::AggregatedPitch;
use crate::audio::CaptureError;
use crate::pitch::{hz_to_semitone, semitone_to_note_name};

/// Status line shown when no capture device exists.
pub const MICROPHONE_NOT_FOUND: &str =
    "Could not find a microphone. Please connect a microphone or use a laptop.";

/// Status line for a capture failure. A missing device gets the fixed
/// [`MICROPHONE_NOT_FOUND`] text.
pub fn capture_status(err: &CaptureError) -> String {
    match err {
        CaptureError::NoDevice => MICROPHONE_NOT_FOUND.to_string(),
        other => format!("Could not open the microphone: {other}"),
    }
}

/// Frequency text shown when the pitch is not confident enough.
pub const NO_FREQUENCY: &str = "-  ";

/// Formatted readout of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReport {
    /// Frequency, e.g. `"440 Hz"`, or [`NO_FREQUENCY`].
    pub frequency: String,
    /// Note name with deviation suffix, e.g. `"  A+"`; empty when not confident.
    pub note_name: String,
    /// Confidence percentage, e.g. `" 93 %"`.
    pub confidence: String,
    /// Continuous semitone value, present only for confident pitches.
    pub note: Option<f64>,
}

impl NoteReport {
    pub fn from_pitch(pitch: AggregatedPitch) -> Self {
        let (frequency, note_name, note) = if pitch.is_confident() {
            let note = hz_to_semitone(pitch.pitch);
            (
                format!("{} Hz", no_digits(pitch.pitch)),
                format!("  {}", semitone_to_note_name(note)),
                Some(note),
            )
        } else {
            (NO_FREQUENCY.to_string(), String::new(), None)
        };

        Self {
            frequency,
            note_name,
            confidence: format!("{} %", no_digits(pitch.confidence * 100.0)),
            note,
        }
    }
}

/// Rounds to an integer, halves up, and right-aligns to three characters.
fn no_digits(value: f64) -> String {
    format!("{:>3.0}", value.round())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_pitch_is_fully_reported() {
        let report = NoteReport::from_pitch(AggregatedPitch {
            pitch: 440.0,
            confidence: 0.93,
        });
        assert_eq!(report.frequency, "440 Hz");
        assert_eq!(report.note_name, "  A");
        assert_eq!(report.confidence, " 93 %");
        assert!(report.note.is_some());
    }

    #[test]
    fn unconfident_pitch_only_reports_confidence() {
        let report = NoteReport::from_pitch(AggregatedPitch {
            pitch: 220.0,
            confidence: 0.5,
        });
        assert_eq!(report.frequency, NO_FREQUENCY);
        assert_eq!(report.note_name, "");
        assert_eq!(report.confidence, " 50 %");
        assert_eq!(report.note, None);
    }

    #[test]
    fn small_values_are_padded() {
        assert_eq!(no_digits(7.4), "  7");
        assert_eq!(no_digits(0.0), "  0");
        assert_eq!(no_digits(1234.0), "1234");
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(no_digits(84.5), " 85");
        assert_eq!(no_digits(0.5), "  1");
        let report = NoteReport::from_pitch(AggregatedPitch {
            pitch: 440.5,
            confidence: 0.9,
        });
        assert_eq!(report.frequency, "441 Hz");
    }

    #[test]
    fn missing_microphone_gets_the_fixed_message() {
        assert_eq!(capture_status(&CaptureError::NoDevice), MICROPHONE_NOT_FOUND);

        let unsupported = capture_status(&CaptureError::UnsupportedFormat(16000));
        assert_ne!(unsupported, MICROPHONE_NOT_FOUND);
        assert!(unsupported.contains("16000 Hz"));
    }
}
