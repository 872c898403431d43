use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use crate::shared::PATTERN_LEN;

/// One slot of a bass line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Note {
    /// Start a note, semitones above the current root.
    Pitch(i32),
    /// Note-off: the string is released and rings out.
    Rest,
    /// Nothing new happens; whatever is sounding keeps sounding.
    Hold,
}

impl Note {
    pub fn pitch(self) -> Option<i32> {
        match self {
            Note::Pitch(n) => Some(n),
            _ => None,
        }
    }

    pub fn pitch_class(self) -> Option<i32> {
        self.pitch().map(|n| n.rem_euclid(12))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Pitch(n) => write!(f, "{n}"),
            Note::Rest => write!(f, "OFF"),
            Note::Hold => write!(f, ".."),
        }
    }
}

/// A grammar-sized chunk of a pattern, `2 * width` slots long.
pub type Cell = Vec<Note>;

pub fn first_pitch(notes: &[Note]) -> Option<i32> {
    notes.iter().find_map(|n| n.pitch())
}

// every line has to open on the root or the groove loses its anchor
pub fn starts_on_tonic(notes: &[Note]) -> bool {
    first_pitch(notes) == Some(0)
}

pub fn pitch_classes(notes: &[Note]) -> BTreeSet<i32> {
    notes.iter().filter_map(|n| n.pitch_class()).collect()
}

pub fn format_notes(notes: &[Note]) -> String {
    let parts: Vec<String> = notes.iter().map(|n| n.to_string()).collect();
    format!("[{}]", parts.join(" "))
}

/// Eight rows of bass line: 32 slots, four per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    notes: [Note; PATTERN_LEN],
}

impl Pattern {
    /// `None` unless `notes` is exactly `PATTERN_LEN` long.
    pub fn from_notes(notes: Vec<Note>) -> Option<Self> {
        let notes: [Note; PATTERN_LEN] = notes.try_into().ok()?;
        Some(Self { notes })
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, idx: usize) -> Note {
        self.notes[idx]
    }

    pub fn starts_on_tonic(&self) -> bool {
        starts_on_tonic(&self.notes)
    }

    /// Copy of this pattern with `slots` replaced by `cell`.
    pub fn with_cell(&self, slots: Range<usize>, cell: &[Note]) -> Self {
        assert_eq!(slots.len(), cell.len(), "cell does not fit slots {slots:?}");
        let mut notes = self.notes;
        notes[slots].copy_from_slice(cell);
        Self { notes }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_notes(&self.notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Note::{Hold as H, Pitch as P, Rest as OFF};

    fn padded(head: &[Note]) -> Pattern {
        let mut notes = head.to_vec();
        notes.resize(PATTERN_LEN, H);
        Pattern::from_notes(notes).unwrap()
    }

    #[test]
    fn first_pitch_skips_rests_and_holds() {
        assert_eq!(first_pitch(&[OFF, H, H, P(7), P(0)]), Some(7));
        assert_eq!(first_pitch(&[OFF, H]), None);
        assert!(starts_on_tonic(&[OFF, H, P(0), OFF]));
        assert!(!starts_on_tonic(&[P(12), OFF]));
        assert!(!starts_on_tonic(&[OFF, H]));
    }

    #[test]
    fn octaves_share_a_pitch_class() {
        let classes = pitch_classes(&[P(0), OFF, P(12), H, P(-12)]);
        assert_eq!(classes.len(), 1);
        assert_eq!(pitch_classes(&[P(-2), P(10)]).into_iter().collect::<Vec<_>>(), vec![10]);
        assert!(pitch_classes(&[OFF, H]).is_empty());
    }

    #[test]
    fn pattern_must_be_exactly_32_long() {
        assert!(Pattern::from_notes(vec![H; 31]).is_none());
        assert!(Pattern::from_notes(vec![H; 33]).is_none());
        assert!(Pattern::from_notes(vec![H; 32]).is_some());
    }

    #[test]
    fn with_cell_only_touches_its_slots() {
        let base = padded(&[P(0), H, OFF, H]);
        let next = base.with_cell(4..8, &[P(5), OFF, P(7), OFF]);
        assert_eq!(&next.notes()[..4], &base.notes()[..4]);
        assert_eq!(&next.notes()[4..8], &[P(5), OFF, P(7), OFF]);
        assert_eq!(&next.notes()[8..], &base.notes()[8..]);
    }

    #[test]
    fn display_uses_off_and_dots() {
        assert_eq!(format_notes(&[P(0), H, OFF, P(-2)]), "[0 .. OFF -2]");
    }
}
