use anyhow::Context;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::audio::{Engine, PcmSink, SinkClosed, Slice};
use crate::pipeline::composer::{ComposeError, Composer};
use crate::pipeline::config::GeneratorConfig;
use crate::sequencer::Sequencer;
use crate::shared::{RandomSource, MIXFREQ, SLICE_LEN, TICKS_PER_ROW};

/// What a finished run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub slices: u64,
    /// The sink went away before we stopped on our own.
    pub closed: bool,
}

/// Sequencer, engine and the one random source they share, driven one
/// slice at a time.
pub struct Generator {
    sequencer: Sequencer,
    engine: Engine,
    rng: RandomSource,
    volume: f32,
    slice: Slice,
    bytes: Vec<u8>,
}

impl Generator {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => RandomSource::seed_from_u64(seed),
            None => RandomSource::from_entropy(),
        };
        let sequencer = Sequencer::new(
            Composer::from_kind(config.grammar),
            config.root_table.clone(),
            config.opening_partition()?,
            config.drum_style,
            &mut rng,
        )
        .context("failed to compose the opening pattern")?;

        Ok(Self {
            sequencer,
            engine: Engine::new(config.slappiness),
            rng,
            volume: config.volume,
            slice: Slice::zero(),
            bytes: Vec::with_capacity(SLICE_LEN * 2),
        })
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// One tick: dispatch the events, render every voice and return the
    /// quantized slice.
    pub fn step(&mut self) -> Result<&[u8], ComposeError> {
        for cmd in self.sequencer.tick(&mut self.rng)? {
            self.engine.handle_cmd(cmd, &mut self.rng);
        }
        self.slice.clear();
        self.engine.render(&mut self.slice, &mut self.rng);
        self.slice.write_pcm(self.volume, &mut self.bytes);
        Ok(&self.bytes)
    }

    /// Stream slices into `sink` until `max_ticks` (if any) or until the sink
    /// closes. A sink that is still open gets one second of silence before it
    /// is finished, so nothing downstream cuts the tail.
    pub fn run(&mut self, sink: &mut dyn PcmSink, max_ticks: Option<u64>) -> anyhow::Result<RunSummary> {
        let mut slices = 0u64;
        let mut closed = false;

        while max_ticks.is_none_or(|max| slices < max) {
            let bytes = self.step()?;
            if let Err(err) = sink.write_slice(bytes) {
                if err.is::<SinkClosed>() {
                    info!(slices, "sink closed, stopping");
                    closed = true;
                    break;
                }
                return Err(err);
            }
            slices += 1;
            if slices % (TICKS_PER_ROW * 32) == 0 {
                debug!(rows = slices / TICKS_PER_ROW, "still grooving");
            }
        }

        if !closed {
            let silence = vec![0u8; 2 * MIXFREQ as usize];
            match sink.write_slice(&silence) {
                Err(err) if err.is::<SinkClosed>() => closed = true,
                other => other?,
            }
        }
        sink.finish()?;

        Ok(RunSummary { slices, closed })
    }
}
