use std::fmt;

use rand::Rng;
use tracing::debug;

use super::grammar::{Grammar, GrammarKind};
use super::partition::Partition;
use super::pattern::{format_notes, pitch_classes, starts_on_tonic, Cell, Note, Pattern};
use crate::shared::{RandomSource, PATTERN_LEN};

/// Draws allowed per cell before we give up on the grammar.
pub const MAX_DRAWS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no acceptable width-{width} cell after {attempts} draws, check the grammar tables")]
    RetryCapExceeded { width: usize, attempts: usize },
    #[error("partition covers {0} units, expected 16")]
    BadPartition(usize),
    #[error("cell width {0} is not one of 2, 3, 4")]
    BadWidth(usize),
}

/// One regenerated cell, kept for the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub offset: usize,
    pub width: usize,
    pub before: Cell,
    pub after: Cell,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {}",
            self.offset,
            self.width,
            format_notes(&self.before),
            format_notes(&self.after)
        )
    }
}

pub struct Composer {
    grammar: Box<dyn Grammar>,
}

impl Composer {
    pub fn new(grammar: Box<dyn Grammar>) -> Self {
        Self { grammar }
    }

    pub fn from_kind(kind: GrammarKind) -> Self {
        Self::new(kind.build())
    }

    /// At most one pitch class, and only ones the grammar allows.
    pub fn accepts(&self, cell: &[Note]) -> bool {
        let classes = pitch_classes(cell);
        classes.len() <= 1 && classes.iter().all(|&pc| self.grammar.allows(pc))
    }

    // redraw until the cell is acceptable and `fits` agrees, or the cap runs out
    fn draw_cell(
        &self,
        width: usize,
        rng: &mut RandomSource,
        mut fits: impl FnMut(&[Note]) -> bool,
    ) -> Result<Cell, ComposeError> {
        for _ in 0..MAX_DRAWS {
            let cell = self.grammar.generate(width, rng);
            debug_assert_eq!(cell.len(), width * 2);
            if self.accepts(&cell) && fits(&cell) {
                return Ok(cell);
            }
        }
        Err(ComposeError::RetryCapExceeded { width, attempts: MAX_DRAWS })
    }

    /// Fill every cell of `partition` with a fresh draw; the first one has to
    /// open on the tonic.
    pub fn compose_base_pattern(
        &self,
        partition: &Partition,
        rng: &mut RandomSource,
    ) -> Result<Pattern, ComposeError> {
        let mut notes = Vec::with_capacity(PATTERN_LEN);
        for &width in partition.widths() {
            let first = notes.is_empty();
            let cell = self.draw_cell(width, rng, |c| !first || starts_on_tonic(c))?;
            notes.extend(cell);
        }
        let units = notes.len() / 2;
        Pattern::from_notes(notes).ok_or(ComposeError::BadPartition(units))
    }

    /// Regenerate one cell, picked uniformly from `min_cell..=max_cell`
    /// (`None` means the last cell; both ends are clamped to the partition).
    /// The cell is redrawn until the whole pattern still opens on the tonic.
    pub fn mutate(
        &self,
        pattern: &Pattern,
        partition: &Partition,
        min_cell: usize,
        max_cell: Option<usize>,
        rng: &mut RandomSource,
    ) -> Result<(Pattern, Mutation), ComposeError> {
        let last = partition.last_index();
        let max_cell = max_cell.unwrap_or(last).min(last);
        let min_cell = min_cell.min(max_cell);

        let idx = rng.gen_range(min_cell..=max_cell);
        let width = partition.width(idx);
        let slots = partition.slots(idx);
        let before = pattern.notes()[slots.clone()].to_vec();

        let after = self.draw_cell(width, rng, |c| pattern.with_cell(slots.clone(), c).starts_on_tonic())?;
        let mutated = pattern.with_cell(slots, &after);

        let mutation = Mutation {
            offset: partition.offset(idx),
            width,
            before,
            after,
        };
        debug!("{mutation}");
        Ok((mutated, mutation))
    }
}

/// Play `pattern` backwards: note-ons become note-offs and the other way
/// round, holds stay where they are. The first slot drops out and a closing
/// note-off is appended, so the length stays 32. The result is not checked
/// against the tonic rule.
#[allow(dead_code)]
pub fn reverse_pattern(pattern: &Pattern) -> Pattern {
    let mut flipped = Vec::with_capacity(PATTERN_LEN);
    let mut sounding: Option<i32> = None;
    for &note in pattern.notes() {
        match note {
            Note::Hold => flipped.push(Note::Hold),
            Note::Rest => {
                // the release becomes the attack of whatever was sounding
                flipped.push(sounding.map_or(Note::Rest, Note::Pitch));
                sounding = None;
            }
            Note::Pitch(n) => {
                flipped.push(sounding.map_or(Note::Rest, Note::Pitch));
                sounding = Some(n);
            }
        }
    }

    let mut notes: Vec<Note> = flipped[1..].iter().rev().copied().collect();
    notes.push(Note::Rest);
    Pattern::from_notes(notes).unwrap_or_else(|| pattern.clone())
}
