// The clock, in one place:
//
//   global_tick   counts slices forever, one slice = 1/50 s of audio
//   tick          global_tick % 14, the subdivision inside a row
//   row           global_tick / 14
//
// Only 4 of the 14 subdivisions carry notes (TICK_STEPS), so one row reads
// 4 pattern slots and 8 rows walk through a whole 32 slot pattern.
//
//   row % 8  == 0   pick the root note and the pattern variant for this 8 row stretch
//   row % 32 == 0   rotate/mutate the four pattern variants
//   row % 64 == 0   (every other 32 row cycle) also redraw the partition

use std::ops::RangeInclusive;

use rand::Rng;
use rand::rngs::StdRng;

pub const MIXFREQ: u32 = 48_000;
pub const SLICE_LEN: usize = (MIXFREQ / 50) as usize; // 960 samples per tick

pub const TICKS_PER_ROW: u64 = 14;
pub const TICK_STEPS: [u64; 4] = [0, 5, 9, 12];
pub const ROWS_PER_PATTERN: u64 = 8;
pub const ROWS_PER_CYCLE: u64 = 32;
pub const ROWS_PER_FILL_CYCLE: u64 = 64;

pub const PATTERN_LEN: usize = 32;
pub const PARTITION_UNITS: usize = 16; // each unit covers 2 pattern slots
pub const CELL_WIDTHS: [usize; 3] = [2, 3, 4];

pub const DEFAULT_VOLUME: f32 = 0.2;
pub const QUANT_SCALE: f32 = 32_000.0;

// bass note that rings at exactly 110 Hz
pub const BASS_REFERENCE_NOTE: i32 = 57 + 12;
pub const BASS_REFERENCE_HZ: f64 = 110.0;
pub const DEFAULT_SLAPPINESS: f32 = 0.3;

// roots a config may ask for; the bass period stays >= 1 sample up here
pub const ROOT_RANGE: RangeInclusive<i32> = 0..=127;

pub const ROOT_TABLE: [i32; 16] = [
    54, 54, 54, 54,
    54, 54, 54, 54,
    54, 54, 59, 61,
    54, 54, 59, 61,
];

pub const HIHAT_GROOVE: [f32; 16] = [
    1.0, 0.6, 0.7, 0.6,
    0.8, 0.6, 0.7, 0.6,
    0.9, 0.6, 0.7, 0.6,
    0.8, 0.6, 0.7, 0.6,
];

/// The one random stream everything draws from: voice noise, cell choice,
/// partitions and mutations. Seeded once, consumed sequentially.
pub type RandomSource = StdRng;

/// Uniform noise in [-1, 1).
#[inline]
pub fn bipolar_noise(rng: &mut RandomSource) -> f32 {
    rng.gen_range(-1.0f32..1.0)
}
