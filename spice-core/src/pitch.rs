//! # Pitch Math Module
//!
//! Pure conversions between the pitch model's label output, frequencies in Hz,
//! continuous semitone positions and displayed note names.
//!
//! Semitones here are counted from `FMIN` (10 Hz) with 12 bins per octave and
//! shifted by half a bin, so semitone 6 lands on an A and the chromatic table
//! below starts at A.

/// Lowest frequency of the model's pitch scale, in Hz.
pub const FMIN: f64 = 10.0;
/// 12 tones per octave.
pub const BINS_PER_OCTAVE: f64 = 12.0;
/// Offset of the label-to-bin regression.
pub const PT_OFFSET: f64 = 25.58;
/// Slope of the label-to-bin regression.
pub const PT_SLOPE: f64 = 63.07;

/// Default upper frequency of the analyzer bins (Nyquist at 16 kHz).
pub const ANALYZER_MAX_FREQ: f64 = 8000.0;

/// Lowest rounded semitone that still maps to a note name.
pub const LOWEST_NOTE_SEMITONE: i32 = 6;

/// A fractional deviation beyond this many semitones gets a `+`/`-` suffix.
const DEVIATION_MARK: f64 = 0.3;

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Converts a raw model label into a frequency in Hz.
pub fn label_to_hz(label: f64) -> f64 {
    let cqt_bin = label * PT_SLOPE + PT_OFFSET;
    FMIN * 2.0_f64.powf(cqt_bin / BINS_PER_OCTAVE)
}

/// Converts a frequency into a continuous semitone position.
///
/// A frequency of exactly zero (no pitch) maps to semitone 0. The extra half
/// semitone centers the value on the middle of its bin.
pub fn hz_to_semitone(freq: f64) -> f64 {
    if freq == 0.0 {
        return 0.0;
    }
    BINS_PER_OCTAVE * (freq / FMIN).log2() + 0.5
}

/// Rounds a semitone to its integer note, following JavaScript's
/// `Math.round` (halves round up, also for negative values).
pub fn round_semitone(semitone: f64) -> i32 {
    (semitone + 0.5).floor() as i32
}

/// Returns the chromatic name for a rounded semitone, or `None` below the floor.
pub fn note_name_index(rounded: i32) -> Option<usize> {
    if rounded < LOWEST_NOTE_SEMITONE {
        return None;
    }
    Some(((rounded - LOWEST_NOTE_SEMITONE) % 12) as usize)
}

/// Formats a semitone position as a note name with a deviation suffix.
///
/// Returns an empty string below the lowest representable note. A `+` is
/// appended when the value is more than 0.3 semitones above its rounded note,
/// a `-` when more than 0.3 below.
pub fn semitone_to_note_name(semitone: f64) -> String {
    let rounded = round_semitone(semitone);
    let Some(index) = note_name_index(rounded) else {
        return String::new();
    };

    let mut name = NOTE_NAMES[index].to_string();
    let delta = semitone - rounded as f64;
    if delta > DEVIATION_MARK {
        name.push('+');
    } else if delta < -DEVIATION_MARK {
        name.push('-');
    }
    name
}

/// Splits a semitone position into the plain note name and its octave number,
/// as used for staff placement. `None` below the lowest note.
pub fn semitone_to_name_and_octave(semitone: f64) -> Option<(&'static str, i32)> {
    let rounded = round_semitone(semitone);
    let index = note_name_index(rounded)?;
    let octave = round_semitone((rounded - LOWEST_NOTE_SEMITONE + 3) as f64 / 12.0) - 1;
    Some((NOTE_NAMES[index], octave))
}

/// Maps an analyzer frequency bin to a semitone position.
///
/// Bins are spaced linearly from 0 Hz to `max_freq` over `total_bins`.
pub fn frequency_bin_to_semitone(bin: usize, total_bins: usize, max_freq: f64) -> f64 {
    let bin_frequency = bin as f64 * max_freq / total_bins as f64;
    hz_to_semitone(bin_frequency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_maps_onto_its_cqt_bin() {
        for &label in &[0.1_f64, 0.25, 0.5, 0.75, 0.9] {
            let semitone = hz_to_semitone(label_to_hz(label));
            let expected = label * PT_SLOPE + PT_OFFSET + 0.5;
            assert!(
                (semitone - expected).abs() < 1e-9,
                "label {label}: {semitone} vs {expected}"
            );
        }
    }

    #[test]
    fn zero_frequency_is_semitone_zero() {
        assert_eq!(hz_to_semitone(0.0), 0.0);
    }

    #[test]
    fn a440_is_named_a() {
        let semitone = hz_to_semitone(440.0);
        assert_eq!(semitone_to_note_name(semitone), "A");
        assert_eq!(semitone_to_name_and_octave(semitone), Some(("A", 4)));
    }

    #[test]
    fn note_name_floor_and_suffixes() {
        assert_eq!(semitone_to_note_name(5.0), "");
        assert_eq!(semitone_to_note_name(6.0), "A");
        assert_eq!(semitone_to_note_name(6.35), "A+");
        assert_eq!(semitone_to_note_name(5.65), "A-");
        assert_eq!(semitone_to_note_name(6.3), "A");
        assert_eq!(semitone_to_note_name(6.31), "A+");
        assert_eq!(semitone_to_note_name(5.69), "A-");
        // Rounds up to A, 0.4 below it.
        assert_eq!(semitone_to_note_name(5.6), "A-");
        assert_eq!(semitone_to_note_name(18.0), "A");
        assert_eq!(semitone_to_note_name(9.0), "C");
    }

    #[test]
    fn note_name_is_stable_across_calls() {
        for i in 0..400 {
            let semitone = i as f64 * 0.37;
            assert_eq!(
                semitone_to_note_name(semitone),
                semitone_to_note_name(semitone)
            );
        }
    }

    #[test]
    fn octave_changes_at_c() {
        // B3 sits two semitones above A3; C4 one more.
        let a3 = hz_to_semitone(220.0).round();
        assert_eq!(semitone_to_name_and_octave(a3 + 2.0), Some(("B", 3)));
        assert_eq!(semitone_to_name_and_octave(a3 + 3.0), Some(("C", 4)));
        assert_eq!(semitone_to_name_and_octave(5.0), None);
    }

    #[test]
    fn top_analyzer_bin_lands_near_semitone_116() {
        let semitone = frequency_bin_to_semitone(512, 512, ANALYZER_MAX_FREQ);
        assert_eq!(semitone.round() as i32, 116);
        assert_eq!(frequency_bin_to_semitone(0, 512, ANALYZER_MAX_FREQ), 0.0);
    }
}
