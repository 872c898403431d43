// Sits between the composer and the engine: owns the clock and the four
// rotating patterns, and turns each tick into voice commands.

use tracing::{debug, info};

use crate::audio_api::VoiceCommand;
use crate::pipeline::composer::{ComposeError, Composer};
use crate::pipeline::config::DrumStyle;
use crate::pipeline::partition::Partition;
use crate::pipeline::pattern::{Note, Pattern};
use crate::shared::{
    RandomSource, HIHAT_GROOVE, ROOT_TABLE, ROWS_PER_CYCLE, ROWS_PER_FILL_CYCLE, ROWS_PER_PATTERN,
    TICKS_PER_ROW, TICK_STEPS,
};

/// Which of the four variants is playing; cycles A, B, A', C every 8 rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternSlot {
    A,
    B,
    APrime,
    C,
}

impl PatternSlot {
    pub fn for_row(row: u64) -> Self {
        match (row % ROWS_PER_CYCLE) / ROWS_PER_PATTERN {
            0 => PatternSlot::A,
            1 => PatternSlot::B,
            2 => PatternSlot::APrime,
            _ => PatternSlot::C,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SequencerState {
    pub global_tick: u64,
    pub root: i32,
    pub partition: Partition,
    pub boundaries: Vec<usize>, // cell boundaries of `partition`, in units
    pub pat_a: Pattern,
    pub pat_b: Pattern,
    pub pat_a_prime: Pattern,
    pub pat_c: Pattern,
    pub slot: PatternSlot,
    pub regenerations: u64,
}

impl SequencerState {
    pub fn active_pattern(&self) -> &Pattern {
        match self.slot {
            PatternSlot::A => &self.pat_a,
            PatternSlot::B => &self.pat_b,
            PatternSlot::APrime => &self.pat_a_prime,
            PatternSlot::C => &self.pat_c,
        }
    }
}

pub struct Sequencer {
    state: SequencerState,
    composer: Composer,
    root_table: Vec<i32>,
    drum_style: DrumStyle,
}

impl Sequencer {
    pub fn new(
        composer: Composer,
        root_table: Vec<i32>,
        partition: Partition,
        drum_style: DrumStyle,
        rng: &mut RandomSource,
    ) -> Result<Self, ComposeError> {
        let root_table = if root_table.is_empty() { ROOT_TABLE.to_vec() } else { root_table };
        let base = composer.compose_base_pattern(&partition, rng)?;
        info!(partition = %partition, "opening pattern {base}");

        let state = SequencerState {
            global_tick: 0,
            root: root_table[0],
            boundaries: partition.boundaries(),
            partition,
            pat_a: base.clone(),
            pat_b: base.clone(),
            pat_a_prime: base.clone(),
            pat_c: base,
            slot: PatternSlot::A,
            regenerations: 0,
        };

        Ok(Self {
            state,
            composer,
            root_table,
            drum_style,
        })
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    /// Work out everything that happens on the current tick, then advance
    /// the clock by one.
    pub fn tick(&mut self, rng: &mut RandomSource) -> Result<Vec<VoiceCommand>, ComposeError> {
        let g = self.state.global_tick;
        let tick = g % TICKS_PER_ROW;
        let row = g / TICKS_PER_ROW;

        if row % ROWS_PER_PATTERN == 0 && tick == 0 {
            let idx = (row / ROWS_PER_PATTERN) as usize % self.root_table.len();
            self.state.root = self.root_table[idx];
            if row % ROWS_PER_CYCLE == 0 {
                self.regenerate(row, rng)?;
            }
            self.state.slot = PatternSlot::for_row(row);
        }

        let mut cmds = Vec::new();
        self.dispatch_notes(tick, row, &mut cmds);
        match self.drum_style {
            DrumStyle::Meter => meter_drums(tick, row, &mut cmds),
            DrumStyle::Partition => partition_drums(tick, row, &self.state.boundaries, &mut cmds),
        }
        hihat(tick, row, &mut cmds);

        self.state.global_tick += 1;
        Ok(cmds)
    }

    // once per 32 rows: A takes over B, everything else is mutated from it
    fn regenerate(&mut self, row: u64, rng: &mut RandomSource) -> Result<(), ComposeError> {
        let cycle = row / ROWS_PER_CYCLE;
        let reshape = row != 0 && cycle % 2 == 0;

        if reshape {
            self.state.partition = Partition::random(rng);
        }
        debug!(cycle, partition = %self.state.partition, "pattern regeneration");
        self.state.boundaries = self.state.partition.boundaries();

        let last = self.state.partition.last_index();
        let mut a = self.state.pat_b.clone();
        if reshape {
            a = self.mutate(&a, 0, None, rng)?;
            a = self.mutate(&a, 0, None, rng)?;
        }

        self.state.pat_a_prime = self.mutate(&a, 0, Some(last), rng)?;

        let b = self.mutate(&a, 2, None, rng)?;
        self.state.pat_b = self.mutate(&b, last, None, rng)?;

        let mut c = a.clone();
        for _ in 0..4 {
            c = self.mutate(&c, 0, None, rng)?;
        }
        self.state.pat_c = c;
        self.state.pat_a = a;

        self.state.regenerations += 1;
        Ok(())
    }

    fn mutate(
        &self,
        pattern: &Pattern,
        min_cell: usize,
        max_cell: Option<usize>,
        rng: &mut RandomSource,
    ) -> Result<Pattern, ComposeError> {
        let (next, _) = self
            .composer
            .mutate(pattern, &self.state.partition, min_cell, max_cell, rng)?;
        Ok(next)
    }

    fn dispatch_notes(&self, tick: u64, row: u64, cmds: &mut Vec<VoiceCommand>) {
        let Some(step) = TICK_STEPS.iter().position(|&t| t == tick) else {
            return;
        };
        let idx = step + (row % ROWS_PER_PATTERN) as usize * TICK_STEPS.len();
        match self.state.active_pattern().get(idx) {
            Note::Pitch(n) => cmds.push(VoiceCommand::BassNote { note: self.state.root + n }),
            Note::Rest => cmds.push(VoiceCommand::BassStop),
            Note::Hold => {}
        }
    }
}

fn meter_drums(tick: u64, row: u64, cmds: &mut Vec<VoiceCommand>) {
    let bar = row % ROWS_PER_PATTERN;
    if tick == TICK_STEPS[0] && matches!(bar, 0 | 2 | 6) {
        cmds.push(VoiceCommand::Kick);
    }
    if tick == TICK_STEPS[2] && matches!(bar, 3 | 4) {
        cmds.push(VoiceCommand::Kick);
    }
    if tick == TICK_STEPS[0] && row % 4 == 2 {
        cmds.push(VoiceCommand::Snare);
    }
    // roll into the next 64 row cycle
    if row % ROWS_PER_FILL_CYCLE == ROWS_PER_FILL_CYCLE - 1 && TICK_STEPS[1..].contains(&tick) {
        cmds.push(VoiceCommand::Snare);
    }
}

// even boundaries get a kick, odd ones a snare
fn partition_drums(tick: u64, row: u64, boundaries: &[usize], cmds: &mut Vec<VoiceCommand>) {
    let unit = match tick {
        t if t == TICK_STEPS[0] => (row % ROWS_PER_PATTERN) as usize * 2,
        t if t == TICK_STEPS[2] => (row % ROWS_PER_PATTERN) as usize * 2 + 1,
        _ => return,
    };
    if boundaries.iter().step_by(2).any(|&b| b == unit) {
        cmds.push(VoiceCommand::Kick);
    }
    if boundaries.iter().skip(1).step_by(2).any(|&b| b == unit) {
        cmds.push(VoiceCommand::Snare);
    }
}

fn hihat(tick: u64, row: u64, cmds: &mut Vec<VoiceCommand>) {
    let accent = (row % ROWS_PER_PATTERN) as usize * 2;
    if tick == TICK_STEPS[0] {
        cmds.push(VoiceCommand::Hihat { volume: HIHAT_GROOVE[accent] });
    } else if tick == TICK_STEPS[2] {
        cmds.push(VoiceCommand::Hihat { volume: HIHAT_GROOVE[accent + 1] });
    }
}
