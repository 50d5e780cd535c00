//! # Confidence Aggregation Module
//!
//! Collapses the per-sub-frame pitch estimates of one model cycle into a single
//! representative pitch and confidence.

/// Confidence below which a pitch estimate is discarded.
pub const CONF_THRESHOLD: f64 = 0.8;

/// One model cycle's output: index-aligned pitches (Hz) and confidences (0..1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchFrame {
    pub pitches: Vec<f64>,
    pub confidences: Vec<f64>,
}

impl PitchFrame {
    pub fn new(pitches: Vec<f64>, confidences: Vec<f64>) -> Self {
        Self { pitches, confidences }
    }

    /// Number of index-aligned (pitch, confidence) pairs.
    pub fn len(&self) -> usize {
        self.pitches.len().min(self.confidences.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the (pitch, confidence) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.pitches
            .iter()
            .copied()
            .zip(self.confidences.iter().copied())
    }
}

/// A single (pitch, confidence) pair summarizing a [`PitchFrame`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregatedPitch {
    pub pitch: f64,
    pub confidence: f64,
}

impl AggregatedPitch {
    /// Whether the aggregated confidence passes [`CONF_THRESHOLD`].
    pub fn is_confident(&self) -> bool {
        self.confidence >= CONF_THRESHOLD
    }
}

/// Averages the confident pitches of a frame.
///
/// The first and last entries are border artifacts of the model's internal
/// transform and never count. Entries below [`CONF_THRESHOLD`] are skipped.
/// Both the pitch and the confidence are means over the kept entries only;
/// with nothing kept the result is `(0, 0)`.
pub fn confident_pitch(frame: &PitchFrame) -> AggregatedPitch {
    let len = frame.len();
    if len < 3 {
        return AggregatedPitch::default();
    }

    let (total_pitch, total_conf, count) = frame
        .iter()
        .take(len - 1)
        .skip(1)
        .filter(|&(_, conf)| conf >= CONF_THRESHOLD)
        .fold((0.0, 0.0, 0usize), |(pitch_sum, conf_sum, n), (pitch, conf)| {
            (pitch_sum + pitch, conf_sum + conf, n + 1)
        });

    if count == 0 {
        return AggregatedPitch::default();
    }

    AggregatedPitch {
        pitch: total_pitch / count as f64,
        confidence: total_conf / count as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_below_threshold_is_zero() {
        let frame = PitchFrame::new(vec![220.0; 6], vec![0.5, 0.79, 0.1, 0.0, 0.7, 0.2]);
        assert_eq!(confident_pitch(&frame), AggregatedPitch { pitch: 0.0, confidence: 0.0 });
    }

    #[test]
    fn borders_and_unconfident_entries_are_skipped() {
        let frame = PitchFrame::new(
            vec![1000.0, 200.0, 5000.0, 300.0, 1000.0],
            vec![0.9, 0.9, 0.2, 0.9, 0.9],
        );
        let result = confident_pitch(&frame);
        assert!((result.pitch - 250.0).abs() < 1e-12);
        assert!((result.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn confidence_is_averaged_over_kept_entries_only() {
        let frame = PitchFrame::new(
            vec![0.0, 100.0, 100.0, 100.0, 0.0],
            vec![0.0, 0.8, 0.1, 1.0, 0.0],
        );
        let result = confident_pitch(&frame);
        assert!((result.confidence - 0.9).abs() < 1e-12);
        assert!(result.is_confident());
    }

    #[test]
    fn frames_without_interior_are_zero() {
        assert_eq!(confident_pitch(&PitchFrame::default()), AggregatedPitch::default());
        let frame = PitchFrame::new(vec![440.0, 440.0], vec![1.0, 1.0]);
        assert_eq!(confident_pitch(&frame), AggregatedPitch::default());
    }
}
