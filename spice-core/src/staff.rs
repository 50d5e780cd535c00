//! # Note Staff Module
//!
//! Keeps the list of notes currently visible on the treble/bass staff.
//!
//! Draw requests are serialized through one mutex: each request holds the
//! guard while it lays out and records its note, and the guard is released on
//! every exit path, including failed layouts. Only every third detected note
//! is drawn. A drawn note leaves the staff after a fixed lifetime. One
//! `note-expiry` thread per staff receives `(deadline, id)` pairs in drawing
//! order and removes each note when its deadline passes; a removal for a
//! note that is already gone does nothing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::pitch::semitone_to_name_and_octave;

/// How long a drawn note stays on the staff.
pub const NOTE_LIFETIME: Duration = Duration::from_millis(8500);

/// Draw every n-th detected note.
pub const NOTE_DECIMATION: u64 = 3;

/// Notes below this octave go on the bass staff.
const TREBLE_LOWEST_OCTAVE: i32 = 4;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StaffError {
    #[error("semitone {0:.2} is below the lowest drawable note")]
    BelowRange(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clef {
    Treble,
    Bass,
}

/// A note placed on the staff.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffNote {
    pub id: u64,
    pub name: &'static str,
    pub octave: i32,
    pub clef: Clef,
    pub drawn_at: Instant,
}

impl StaffNote {
    /// Staff key in `name/octave` form, e.g. `C#/4`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.name, self.octave)
    }

    pub fn is_sharp(&self) -> bool {
        self.name.contains('#')
    }

    /// Letter of the note (`A`..`G`).
    pub fn letter(&self) -> char {
        self.name.chars().next().unwrap_or('C')
    }
}

/// Pending removal of one drawn note.
#[derive(Debug, Clone, Copy)]
struct Expiry {
    deadline: Instant,
    id: u64,
}

#[derive(Debug, Default)]
struct StaffState {
    visible: Vec<StaffNote>,
    count: u64,
    next_id: u64,
}

/// Shared, serialized note renderer state.
#[derive(Debug, Clone)]
pub struct NoteStaff {
    state: Arc<Mutex<StaffState>>,
    expiries: Sender<Expiry>,
    lifetime: Duration,
    decimation: u64,
}

impl NoteStaff {
    /// Creates an empty staff and starts its expiry thread. The thread exits
    /// once every clone of the staff is dropped.
    pub fn new(lifetime: Duration, decimation: u64) -> Self {
        let state = Arc::new(Mutex::new(StaffState::default()));
        let (expiries, requests) = crossbeam_channel::unbounded();

        let weak = Arc::downgrade(&state);
        let spawned = thread::Builder::new()
            .name("note-expiry".into())
            .spawn(move || run_expiry(weak, requests));
        if let Err(e) = spawned {
            log::error!("Failed to start note expiry thread: {}", e);
        }

        Self {
            state,
            expiries,
            lifetime,
            decimation: decimation.max(1),
        }
    }

    /// Requests a note to be drawn.
    ///
    /// `None` and zero are ignored without counting. Of the remaining notes
    /// only every `decimation`-th is laid out. Returns the id of the drawn
    /// note, if any.
    pub fn draw_note(&self, note: Option<f64>) -> Option<u64> {
        let note = note.filter(|&n| n != 0.0)?;

        let mut state = lock(&self.state);
        state.count += 1;
        if state.count % self.decimation != 0 {
            return None;
        }

        match layout(note) {
            Ok((name, octave, clef)) => {
                let id = state.next_id;
                state.next_id += 1;
                let drawn_at = Instant::now();
                state.visible.push(StaffNote {
                    id,
                    name,
                    octave,
                    clef,
                    drawn_at,
                });
                // Sent under the lock so deadlines reach the expiry thread in order.
                let expiry = Expiry {
                    deadline: drawn_at + self.lifetime,
                    id,
                };
                if self.expiries.send(expiry).is_err() {
                    log::warn!("Note expiry thread is gone; note {} stays on the staff", id);
                }
                Some(id)
            }
            Err(e) => {
                log::error!("Failed to draw note: {}", e);
                None
            }
        }
    }

    /// Snapshot of the notes currently on the staff, oldest first.
    pub fn visible_notes(&self) -> Vec<StaffNote> {
        lock(&self.state).visible.clone()
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

/// Removes notes as their deadlines pass. Requests arrive in deadline order.
fn run_expiry(state: Weak<Mutex<StaffState>>, requests: Receiver<Expiry>) {
    let mut pending: VecDeque<Expiry> = VecDeque::new();
    loop {
        let next = match pending.front() {
            Some(front) => requests.recv_deadline(front.deadline),
            None => requests.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(expiry) => pending.push_back(expiry),
            Err(RecvTimeoutError::Timeout) => {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let now = Instant::now();
                let mut state = lock(&state);
                while let Some(expired) = pending.front().filter(|e| e.deadline <= now).copied() {
                    pending.pop_front();
                    state.visible.retain(|note| note.id != expired.id);
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

impl Default for NoteStaff {
    fn default() -> Self {
        Self::new(NOTE_LIFETIME, NOTE_DECIMATION)
    }
}

fn lock(state: &Mutex<StaffState>) -> MutexGuard<'_, StaffState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn layout(note: f64) -> Result<(&'static str, i32, Clef), StaffError> {
    let (name, octave) = semitone_to_name_and_octave(note).ok_or(StaffError::BelowRange(note))?;
    let clef = if octave < TREBLE_LOWEST_OCTAVE {
        Clef::Bass
    } else {
        Clef::Treble
    };
    Ok((name, octave, clef))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::hz_to_semitone;

    fn long_lived() -> NoteStaff {
        NoteStaff::new(Duration::from_secs(60), NOTE_DECIMATION)
    }

    #[test]
    fn every_third_note_is_drawn() {
        let staff = long_lived();
        let a4 = hz_to_semitone(440.0);
        let drawn = (0..9).filter_map(|_| staff.draw_note(Some(a4))).count();
        assert_eq!(drawn, 3);
        assert_eq!(staff.visible_notes().len(), 3);
    }

    #[test]
    fn missing_notes_do_not_count() {
        let staff = long_lived();
        let a4 = hz_to_semitone(440.0);
        assert!(staff.draw_note(None).is_none());
        assert!(staff.draw_note(Some(0.0)).is_none());
        assert!(staff.draw_note(Some(a4)).is_none());
        assert!(staff.draw_note(Some(a4)).is_none());
        assert!(staff.draw_note(Some(a4)).is_some());
    }

    #[test]
    fn failed_layout_leaves_staff_usable() {
        let staff = long_lived();
        let a4 = hz_to_semitone(440.0);
        staff.draw_note(Some(a4));
        staff.draw_note(Some(a4));
        assert!(staff.draw_note(Some(2.0)).is_none());
        assert!(staff.visible_notes().is_empty());

        staff.draw_note(Some(a4));
        staff.draw_note(Some(a4));
        assert!(staff.draw_note(Some(a4)).is_some());
    }

    #[test]
    fn clef_follows_octave() {
        let staff = NoteStaff::new(Duration::from_secs(60), 1);
        staff.draw_note(Some(hz_to_semitone(440.0)));
        staff.draw_note(Some(hz_to_semitone(110.0)));
        staff.draw_note(Some(hz_to_semitone(277.18)));

        let notes = staff.visible_notes();
        assert_eq!(notes[0].key(), "A/4");
        assert_eq!(notes[0].clef, Clef::Treble);
        assert_eq!(notes[1].key(), "A/2");
        assert_eq!(notes[1].clef, Clef::Bass);
        assert_eq!(notes[2].key(), "C#/4");
        assert!(notes[2].is_sharp());
        assert_eq!(notes[2].letter(), 'C');
    }

    #[test]
    fn notes_expire_after_their_lifetime() {
        let staff = NoteStaff::new(Duration::from_millis(20), 1);
        staff.draw_note(Some(hz_to_semitone(440.0)));
        assert_eq!(staff.visible_notes().len(), 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !staff.visible_notes().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(staff.visible_notes().is_empty());
    }

    #[test]
    fn older_notes_expire_first() {
        let staff = NoteStaff::new(Duration::from_millis(60), 1);
        let a4 = hz_to_semitone(440.0);
        let first = staff.draw_note(Some(a4)).unwrap();
        thread::sleep(Duration::from_millis(30));
        let second = staff.draw_note(Some(a4)).unwrap();
        assert_ne!(first, second);

        let deadline = Instant::now() + Duration::from_secs(5);
        while staff.visible_notes().len() == 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let remaining: Vec<u64> = staff.visible_notes().iter().map(|n| n.id).collect();
        assert!(remaining == vec![second] || remaining.is_empty());

        while !staff.visible_notes().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(staff.visible_notes().is_empty());
    }

    #[test]
    fn clones_share_one_staff() {
        let staff = NoteStaff::new(Duration::from_secs(60), 1);
        let other = staff.clone();
        other.draw_note(Some(hz_to_semitone(440.0)));
        assert_eq!(staff.visible_notes().len(), 1);
        drop(other);
        staff.draw_note(Some(hz_to_semitone(440.0)));
        assert_eq!(staff.visible_notes().len(), 2);
    }
}
