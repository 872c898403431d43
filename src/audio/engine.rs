use crate::audio_api::VoiceCommand;
use crate::shared::RandomSource;

use super::bass::BassVoice;
use super::slice::Slice;
use super::voice::{HihatVoice, ToneDrum, Voice};

// the fixed band: three drums and the bass string
pub struct Engine {
    hihat: HihatVoice,
    kick: ToneDrum,
    snare: ToneDrum,
    bass: BassVoice,
    slappiness: f32,
}

impl Engine {
    pub fn new(slappiness: f32) -> Self {
        Self {
            hihat: HihatVoice::new(),
            kick: ToneDrum::kick(),
            snare: ToneDrum::snare(),
            bass: BassVoice::new(),
            slappiness: slappiness.clamp(0.0, 1.0),
        }
    }

    pub fn handle_cmd(&mut self, cmd: VoiceCommand, rng: &mut RandomSource) {
        match cmd {
            VoiceCommand::Kick => self.kick.trigger(),
            VoiceCommand::Snare => self.snare.trigger(),
            VoiceCommand::Hihat { volume } => self.hihat.trigger(volume),
            VoiceCommand::BassNote { note } => self.bass.trigger_with(note, self.slappiness, rng),
            VoiceCommand::BassStop => self.bass.stop(),
        }
    }

    /// Mix one tick of every voice into `slice`. The slice is not cleared
    /// here; the caller owns the accumulator.
    pub fn render(&mut self, slice: &mut Slice, rng: &mut RandomSource) {
        let out = slice.samples_mut();
        self.kick.render(out, rng);
        self.snare.render(out, rng);
        self.hihat.render(out, rng);
        self.bass.render(out, rng);
    }

    #[cfg(test)]
    pub fn bass(&self) -> &BassVoice {
        &self.bass
    }
}
