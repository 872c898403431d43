use std::fmt;
use std::ops::Range;

use rand::Rng;
use rand::seq::SliceRandom;

use super::composer::ComposeError;
use crate::shared::{RandomSource, CELL_WIDTHS, PARTITION_UNITS};

/// How a pattern is cut into cells: widths in {2, 3, 4} summing to 16 units,
/// each unit two pattern slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    widths: Vec<usize>,
}

impl Default for Partition {
    fn default() -> Self {
        Self { widths: vec![4, 3, 3, 4, 2] }
    }
}

impl Partition {
    pub fn new(widths: Vec<usize>) -> Result<Self, ComposeError> {
        if let Some(&bad) = widths.iter().find(|&&w| !CELL_WIDTHS.contains(&w)) {
            return Err(ComposeError::BadWidth(bad));
        }
        let units: usize = widths.iter().sum();
        if units != PARTITION_UNITS {
            return Err(ComposeError::BadPartition(units));
        }
        Ok(Self { widths })
    }

    /// Draw widths until at most 5 units are left, close the gap, shuffle.
    pub fn random(rng: &mut RandomSource) -> Self {
        let mut widths = Vec::new();
        let mut remaining = PARTITION_UNITS;
        while remaining > 5 {
            let w = CELL_WIDTHS[rng.gen_range(0..CELL_WIDTHS.len())];
            widths.push(w);
            remaining -= w;
        }
        if remaining == 5 {
            // no single cell is 5 wide
            let w = rng.gen_range(2..=3);
            widths.push(w);
            widths.push(5 - w);
        } else {
            widths.push(remaining);
        }
        widths.shuffle(rng);
        debug_assert_eq!(widths.iter().sum::<usize>(), PARTITION_UNITS);
        Self { widths }
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn last_index(&self) -> usize {
        self.widths.len() - 1
    }

    pub fn width(&self, idx: usize) -> usize {
        self.widths[idx]
    }

    /// Start of cell `idx`, in units.
    pub fn offset(&self, idx: usize) -> usize {
        self.widths[..idx].iter().sum()
    }

    /// Pattern slots covered by cell `idx`.
    pub fn slots(&self, idx: usize) -> Range<usize> {
        let offs = self.offset(idx);
        offs * 2..(offs + self.widths[idx]) * 2
    }

    /// Cell boundaries in units: `[0, w0, w0+w1, ..., 16]`.
    pub fn boundaries(&self) -> Vec<usize> {
        let mut acc = 0;
        let mut out = Vec::with_capacity(self.widths.len() + 1);
        out.push(0);
        for &w in &self.widths {
            acc += w;
            out.push(acc);
        }
        out
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.widths)
    }
}
