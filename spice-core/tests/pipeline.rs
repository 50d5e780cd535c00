use spice_core::model::{FINAL_INPUT_COLUMNS, SPICE_INPUT_SAMPLES};
use spice_core::pitch::{PT_OFFSET, PT_SLOPE};
use spice_core::staff::NoteStaff;
use spice_core::{InferenceEngine, ModelError, NamedTensor, PipelineEvent, Session};
use std::time::Duration;

const CHUNK: usize = 1024;

/// Label whose pitch is exactly 440 Hz.
fn a440_label() -> f32 {
    ((12.0 * 44.0_f64.log2() - PT_OFFSET) / PT_SLOPE) as f32
}

/// Replies like the pitch model would for a steady A4, optionally failing
/// a chosen combination call.
struct ScriptedEngine {
    final_calls: usize,
    fail_final_call: Option<usize>,
    uncertainty: f32,
}

impl ScriptedEngine {
    fn steady(uncertainty: f32) -> Self {
        Self {
            final_calls: 0,
            fail_final_call: None,
            uncertainty,
        }
    }
}

impl InferenceEngine for ScriptedEngine {
    fn execute(
        &mut self,
        inputs: Vec<NamedTensor>,
        outputs: Option<&[&str]>,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        match outputs {
            Some(names) => {
                assert_eq!(inputs.len(), 1);
                assert_eq!(inputs[0].data.len(), SPICE_INPUT_SAMPLES);
                Ok(names.iter().map(|_| vec![0.0; FINAL_INPUT_COLUMNS * 4]).collect())
            }
            None => {
                assert_eq!(inputs.len(), 12);
                assert!(inputs.iter().all(|t| t.shape == vec![4, FINAL_INPUT_COLUMNS]));
                self.final_calls += 1;
                if self.fail_final_call == Some(self.final_calls) {
                    return Err(ModelError::MissingOutput("uncertainty".into()));
                }
                Ok(vec![vec![self.uncertainty; 8], vec![a440_label(); 8]])
            }
        }
    }
}

fn feed(session: &mut Session<ScriptedEngine>, chunks: usize) -> Vec<PipelineEvent> {
    (0..chunks)
        .flat_map(|i| session.process_chunk(&vec![(i as f32 * 0.01).sin(); CHUNK]).into_events())
        .collect()
}

fn notes(events: &[PipelineEvent]) -> Vec<&spice_core::NoteReport> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Note(report) => Some(report),
            _ => None,
        })
        .collect()
}

#[test]
fn steady_tone_reports_a4_once_per_cycle_after_warmup() {
    let mut session = Session::new(ScriptedEngine::steady(0.05));
    let events = feed(&mut session, 9);

    let spectra = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Spectrum(_)))
        .count();
    assert_eq!(spectra, 9);

    let reports = notes(&events);
    assert_eq!(reports.len(), 2);
    for report in reports {
        assert_eq!(report.frequency, "440 Hz");
        assert_eq!(report.note_name, "  A");
        assert_eq!(report.confidence, " 95 %");
        assert!(report.note.is_some());
    }

    let stats = session.stats();
    assert_eq!(stats.combine_attempts, 3);
    assert_eq!(stats.final_calls, 2);
    assert_eq!(stats.skipped_windows, 1);
}

#[test]
fn pitch_marks_only_accompany_completed_cycles() {
    let mut session = Session::new(ScriptedEngine::steady(0.0));
    let events = feed(&mut session, 6);
    let marked: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Spectrum(column) => Some(column.marks.len()),
            _ => None,
        })
        .collect();
    assert_eq!(marked, vec![0, 0, 0, 0, 0, 8]);
}

#[test]
fn unconfident_tone_reports_placeholder() {
    let mut session = Session::new(ScriptedEngine::steady(0.5));
    let events = feed(&mut session, 6);
    let reports = notes(&events);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].frequency, "-  ");
    assert_eq!(reports[0].note_name, "");
    assert_eq!(reports[0].confidence, " 50 %");
    assert_eq!(reports[0].note, None);
}

#[test]
fn failed_inference_drops_one_cycle_and_recovers() {
    let mut engine = ScriptedEngine::steady(0.05);
    engine.fail_final_call = Some(1);
    let mut session = Session::new(engine);

    let events = feed(&mut session, 6);
    assert!(notes(&events).is_empty());
    assert_eq!(session.coordinator().phase().index(), 0);
    assert!(session.coordinator().outputs().is_empty());

    let events = feed(&mut session, 3);
    assert_eq!(notes(&events).len(), 1);
}

#[test]
fn reports_drive_the_staff_every_third_note() {
    let mut session = Session::new(ScriptedEngine::steady(0.05));
    let staff = NoteStaff::new(Duration::from_secs(60), 3);

    // Warm-up cycle plus nine reporting cycles.
    let events = feed(&mut session, 30);
    let reports = notes(&events);
    assert_eq!(reports.len(), 9);

    let drawn = reports
        .iter()
        .filter_map(|report| staff.draw_note(report.note))
        .count();
    assert_eq!(drawn, 3);
    let visible = staff.visible_notes();
    assert!(visible.iter().all(|note| note.key() == "A/4"));
}
