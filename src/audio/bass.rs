use crate::shared::{
    bipolar_noise, RandomSource, BASS_REFERENCE_HZ, BASS_REFERENCE_NOTE, MIXFREQ,
};

use super::voice::Voice;

// pulse shape of the pluck: a short positive kick, then a longer negative shelf
const PULSE_HIGH: f32 = 0.75;
const PULSE_LOW: f32 = -0.25;

// damping/feedback are specified per 800 samples and rescaled per period so
// that low and high notes decay at the same rate in time
const LOOP_NORM: f32 = 800.0;

const NOTE_DAMPING: f32 = 0.7;
const NOTE_FEEDBACK: f32 = 1.0;
const STOP_DAMPING: f32 = 0.9;
const STOP_FEEDBACK: f32 = 0.6;

const OUTPUT_GAIN: f32 = 0.7;

/// Plucked string as a delay line one pitch period long, smoothed by a
/// one-pole filter on every pass (a stripped down Karplus-Strong).
#[derive(Clone, Debug)]
pub struct BassVoice {
    ring: Vec<f32>,
    offs: usize,
    last: f32,
    damping: f32,
    feedback: f32,
}

impl Default for BassVoice {
    fn default() -> Self {
        Self {
            ring: vec![0.0; 2],
            offs: 0,
            last: 0.0,
            damping: STOP_DAMPING,
            feedback: NOTE_FEEDBACK,
        }
    }
}

pub fn note_frequency(note: i32) -> f64 {
    BASS_REFERENCE_HZ * 2f64.powf((note - BASS_REFERENCE_NOTE) as f64 / 12.0)
}

pub fn note_period(note: i32) -> usize {
    (MIXFREQ as f64 / note_frequency(note)).round() as usize
}

impl BassVoice {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn trigger(&mut self, note: i32, rng: &mut RandomSource) {
        self.trigger_with(note, crate::shared::DEFAULT_SLAPPINESS, rng);
    }

    /// Restart the string on `note`. `slappiness` blends the pulse
    /// excitation (0.0) toward pure noise (1.0).
    pub fn trigger_with(&mut self, note: i32, slappiness: f32, rng: &mut RandomSource) {
        let period = note_period(note);
        assert!(period >= 1, "note {note} has no usable period");

        let quarter = period / 4;
        self.ring = (0..period)
            .map(|i| {
                let pulse = if i < quarter { PULSE_HIGH } else { PULSE_LOW };
                (1.0 - slappiness) * pulse + slappiness * bipolar_noise(rng)
            })
            .collect();
        self.offs = 0;
        self.last = 0.0;
        self.damping = NOTE_DAMPING;
        self.feedback = NOTE_FEEDBACK;
    }

    // keep ringing from the current buffer, just lose energy faster
    pub fn stop(&mut self) {
        self.damping = STOP_DAMPING;
        self.feedback = STOP_FEEDBACK;
    }

    #[cfg(test)]
    pub fn period(&self) -> usize {
        self.ring.len()
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offs
    }
}

impl Voice for BassVoice {
    fn render(&mut self, out: &mut [f32], _rng: &mut RandomSource) {
        let period = self.ring.len();
        let exponent = LOOP_NORM / period as f32;
        let smoothing = 1.0 - self.damping.powf(exponent);
        let feedback = self.feedback.powf(exponent);

        for s in out.iter_mut() {
            let v = self.ring[self.offs];
            self.last += (v - self.last) * smoothing;
            self.ring[self.offs] = self.last * feedback;
            self.offs = (self.offs + 1) % period;
            *s += self.last * OUTPUT_GAIN;
        }
    }
}
