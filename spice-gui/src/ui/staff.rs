//! # Staff Widget
//!
//! Grand staff showing recently detected notes. Each note enters near the
//! right edge and drifts toward the clefs over its lifetime, then vanishes
//! when the expiry timer removes it from the [`NoteStaff`].
//!
//! [`NoteStaff`]: spice_core::staff::NoteStaff

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Pixels, Point, Rectangle, Renderer, Theme, mouse};
use spice_core::staff::{Clef, StaffNote};
use std::time::{Duration, Instant};

/// Distance between two staff lines.
const LINE_GAP: f32 = 10.0;
/// Top line of the treble staff.
const TREBLE_TOP: f32 = 40.0;
/// Top line of the bass staff.
const BASS_TOP: f32 = TREBLE_TOP + 9.0 * LINE_GAP;
/// Space reserved on the left for the clef labels.
const CLEF_MARGIN: f32 = 60.0;

/// Staff height in pixels.
pub const STAFF_HEIGHT: f32 = BASS_TOP + 4.0 * LINE_GAP + 40.0;

const INK: Color = Color::from_rgb(0.1, 0.1, 0.1);
const PAPER: Color = Color::from_rgb(0.97, 0.96, 0.92);

/// Diatonic position of a note: seven steps per octave starting at C.
fn diatonic_step(letter: char, octave: i32) -> i32 {
    let index = match letter {
        'C' => 0,
        'D' => 1,
        'E' => 2,
        'F' => 3,
        'G' => 4,
        'A' => 5,
        _ => 6,
    };
    octave * 7 + index
}

/// Step and y position of the bottom line of a staff (E4 treble, G2 bass).
fn bottom_line(clef: Clef) -> (i32, f32) {
    match clef {
        Clef::Treble => (diatonic_step('E', 4), TREBLE_TOP + 4.0 * LINE_GAP),
        Clef::Bass => (diatonic_step('G', 2), BASS_TOP + 4.0 * LINE_GAP),
    }
}

fn step_y(step: i32, clef: Clef) -> f32 {
    let (bottom_step, bottom_y) = bottom_line(clef);
    bottom_y - (step - bottom_step) as f32 * LINE_GAP / 2.0
}

/// Steps that need a ledger line for a note at `step`.
fn ledger_steps(step: i32, clef: Clef) -> Vec<i32> {
    let (bottom, _) = bottom_line(clef);
    let top = bottom + 8;
    if step <= bottom - 2 {
        (step..=bottom - 2).rev().filter(|s| (s - bottom) % 2 == 0).collect()
    } else if step >= top + 2 {
        (top + 2..=step).filter(|s| (s - bottom) % 2 == 0).collect()
    } else {
        Vec::new()
    }
}

/// Horizontal position after `elapsed` of a note's `lifetime`.
fn note_x(width: f32, elapsed: Duration, lifetime: Duration) -> f32 {
    let start = width * 0.75;
    let progress = if lifetime.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f32() / lifetime.as_secs_f32()).min(1.0)
    };
    start - progress * (start - CLEF_MARGIN - LINE_GAP)
}

#[derive(Debug, Clone)]
pub struct StaffView {
    notes: Vec<StaffNote>,
    lifetime: Duration,
}

impl StaffView {
    pub fn new(notes: Vec<StaffNote>, lifetime: Duration) -> Self {
        Self { notes, lifetime }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(STAFF_HEIGHT)),
        )
        .into()
    }

    fn draw_staff(frame: &mut canvas::Frame, width: f32) {
        let stroke = Stroke::default().with_width(1.0).with_color(INK);
        for top in [TREBLE_TOP, BASS_TOP] {
            for line in 0..5 {
                let y = top + line as f32 * LINE_GAP;
                frame.stroke(&Path::line(Point::new(10.0, y), Point::new(width - 10.0, y)), stroke);
            }
        }
        frame.stroke(
            &Path::line(
                Point::new(10.0, TREBLE_TOP),
                Point::new(10.0, BASS_TOP + 4.0 * LINE_GAP),
            ),
            stroke,
        );

        for (label, top) in [("Treble", TREBLE_TOP), ("Bass", BASS_TOP)] {
            frame.fill_text(canvas::Text {
                content: label.to_string(),
                position: Point::new(14.0, top + 1.2 * LINE_GAP),
                color: INK,
                size: Pixels(13.0),
                ..canvas::Text::default()
            });
        }
    }

    fn draw_note(frame: &mut canvas::Frame, note: &StaffNote, x: f32) {
        let step = diatonic_step(note.letter(), note.octave);
        let y = step_y(step, note.clef);
        let stroke = Stroke::default().with_width(1.2).with_color(INK);
        let head_radius = LINE_GAP * 0.55;

        for ledger in ledger_steps(step, note.clef) {
            let ly = step_y(ledger, note.clef);
            frame.stroke(
                &Path::line(Point::new(x - LINE_GAP, ly), Point::new(x + LINE_GAP, ly)),
                stroke,
            );
        }

        frame.fill(&Path::circle(Point::new(x, y), head_radius), INK);

        // Dotted eighth: stem, flag and dot.
        let (bottom, _) = bottom_line(note.clef);
        let stem_up = step < bottom + 4;
        let (stem_x, stem_end) = if stem_up {
            (x + head_radius, y - 3.5 * LINE_GAP)
        } else {
            (x - head_radius, y + 3.5 * LINE_GAP)
        };
        frame.stroke(&Path::line(Point::new(stem_x, y), Point::new(stem_x, stem_end)), stroke);
        let flag_end = if stem_up {
            Point::new(stem_x + LINE_GAP * 0.8, stem_end + LINE_GAP * 1.5)
        } else {
            Point::new(stem_x + LINE_GAP * 0.8, stem_end - LINE_GAP * 1.5)
        };
        frame.stroke(&Path::line(Point::new(stem_x, stem_end), flag_end), stroke);
        frame.fill(
            &Path::circle(Point::new(x + head_radius + LINE_GAP * 0.6, y), 1.8),
            INK,
        );

        if note.is_sharp() {
            frame.fill_text(canvas::Text {
                content: "#".to_string(),
                position: Point::new(x - 2.2 * LINE_GAP, y - LINE_GAP),
                color: INK,
                size: Pixels(18.0),
                ..canvas::Text::default()
            });
        }
    }
}

impl<Message> canvas::Program<Message> for StaffView {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        if !bounds.width.is_finite() || bounds.width <= CLEF_MARGIN * 2.0 {
            return vec![frame.into_geometry()];
        }

        frame.fill_rectangle(Point::ORIGIN, bounds.size(), PAPER);
        Self::draw_staff(&mut frame, bounds.width);

        let now = Instant::now();
        for note in &self.notes {
            let elapsed = now.saturating_duration_since(note.drawn_at);
            Self::draw_note(&mut frame, note, note_x(bounds.width, elapsed, self.lifetime));
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_lines_sit_on_the_staff() {
        assert_eq!(step_y(diatonic_step('E', 4), Clef::Treble), TREBLE_TOP + 4.0 * LINE_GAP);
        assert_eq!(step_y(diatonic_step('F', 5), Clef::Treble), TREBLE_TOP);
        assert_eq!(step_y(diatonic_step('A', 3), Clef::Bass), BASS_TOP);
    }

    #[test]
    fn middle_c_needs_one_ledger_line_on_treble() {
        assert_eq!(ledger_steps(diatonic_step('C', 4), Clef::Treble), vec![diatonic_step('C', 4)]);
        assert_eq!(ledger_steps(diatonic_step('B', 3), Clef::Treble), vec![diatonic_step('C', 4)]);
        assert!(ledger_steps(diatonic_step('D', 4), Clef::Treble).is_empty());
    }

    #[test]
    fn high_notes_stack_ledger_lines() {
        let steps = ledger_steps(diatonic_step('C', 6), Clef::Treble);
        assert_eq!(steps, vec![diatonic_step('A', 5), diatonic_step('C', 6)]);
    }

    #[test]
    fn notes_drift_to_the_clef_margin() {
        let lifetime = Duration::from_millis(8500);
        assert_eq!(note_x(800.0, Duration::ZERO, lifetime), 600.0);
        assert_eq!(note_x(800.0, lifetime * 2, lifetime), CLEF_MARGIN + LINE_GAP);
        let halfway = note_x(800.0, lifetime / 2, lifetime);
        assert!(halfway < 600.0 && halfway > CLEF_MARGIN);
    }
}
