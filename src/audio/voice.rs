use std::f64::consts::TAU;

use crate::shared::{bipolar_noise, RandomSource, MIXFREQ};

// Below this the envelope is ~-120 dB and the voice stops rendering.
const SILENCE_FLOOR: f64 = 1e-6;

/// Something that adds its sound into a shared mono buffer.
pub trait Voice {
    fn render(&mut self, out: &mut [f32], rng: &mut RandomSource);
}

/// `0.1^(k*t)`: -20 dB every `1/k` seconds.
#[inline]
fn decay(k: f64, offs: u64) -> f64 {
    0.1f64.powf(k * offs as f64 / MIXFREQ as f64)
}

// high-passed noise burst, louder hits ring longer
#[derive(Clone, Debug, Default)]
pub struct HihatVoice {
    offs: u64,
    volume: f32,
    last: f32,
    active: bool,
}

impl HihatVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self, volume: f32) {
        assert!(volume > 0.0, "hihat volume must be positive, got {volume}");
        self.offs = 0;
        self.volume = volume;
        self.active = true;
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Voice for HihatVoice {
    fn render(&mut self, out: &mut [f32], rng: &mut RandomSource) {
        if !self.active {
            return;
        }

        let k = 14.0 / self.volume as f64;
        let mut env = 1.0;
        for s in out.iter_mut() {
            env = decay(k, self.offs);
            let v = bipolar_noise(rng) * env as f32;
            // one-pole lowpass subtracted from the input
            self.last += (v - self.last) * 0.3;
            let v = v - self.last;
            *s += v.clamp(-1.0, 1.0) * 0.3 * self.volume;
            self.offs += 1;
        }

        if env < SILENCE_FLOOR {
            self.active = false;
        }
    }
}

/// Decaying noise on top of two detuned sines. Kick and snare only differ
/// in their constants.
#[derive(Clone, Debug)]
pub struct ToneDrum {
    noise_decay: f64,
    tone_decay: f64,
    tone_hz: [f64; 2],
    offs: u64,
    active: bool,
}

impl ToneDrum {
    pub fn kick() -> Self {
        Self::with_params(100.0, 8.0, [80.0, 70.0])
    }

    pub fn snare() -> Self {
        Self::with_params(7.0, 6.0, [100.0, 110.0])
    }

    fn with_params(noise_decay: f64, tone_decay: f64, tone_hz: [f64; 2]) -> Self {
        Self {
            noise_decay,
            tone_decay,
            tone_hz,
            offs: 0,
            active: false,
        }
    }

    pub fn trigger(&mut self) {
        self.offs = 0;
        self.active = true;
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Voice for ToneDrum {
    fn render(&mut self, out: &mut [f32], rng: &mut RandomSource) {
        if !self.active {
            return;
        }

        let mut loudest = 1.0;
        for s in out.iter_mut() {
            let t = self.offs as f64 / MIXFREQ as f64;
            let noise_env = decay(self.noise_decay, self.offs);
            let tone_env = decay(self.tone_decay, self.offs);

            let noise = bipolar_noise(rng) as f64 * noise_env;
            let tone = ((TAU * self.tone_hz[0] * t).sin() + (TAU * self.tone_hz[1] * t).sin()) * tone_env;
            let v = (noise + tone) * 0.6;
            *s += (v as f32).clamp(-1.0, 1.0) * 0.7;

            loudest = noise_env.max(tone_env);
            self.offs += 1;
        }

        if loudest < SILENCE_FLOOR {
            self.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SLICE_LEN;
    use rand::SeedableRng;

    fn window_rms<V: Voice>(voice: &mut V, windows: usize, rng: &mut RandomSource) -> Vec<f32> {
        (0..windows)
            .map(|_| {
                let mut buf = vec![0.0f32; SLICE_LEN];
                voice.render(&mut buf, rng);
                (buf.iter().map(|s| s * s).sum::<f32>() / SLICE_LEN as f32).sqrt()
            })
            .collect()
    }

    #[test]
    fn untriggered_voices_are_silent() {
        let mut rng = RandomSource::seed_from_u64(1);
        let mut buf = vec![0.0f32; 64];
        HihatVoice::new().render(&mut buf, &mut rng);
        ToneDrum::kick().render(&mut buf, &mut rng);
        ToneDrum::snare().render(&mut buf, &mut rng);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn kick_energy_decays_over_time() {
        let mut rng = RandomSource::seed_from_u64(7);
        let mut kick = ToneDrum::kick();
        kick.trigger();
        let rms = window_rms(&mut kick, 20, &mut rng);
        assert!(rms[0] > 0.1);
        assert!(rms[0] > rms[5]);
        assert!(rms[5] > rms[15]);
    }

    #[test]
    fn snare_energy_decays_over_time() {
        let mut rng = RandomSource::seed_from_u64(8);
        let mut snare = ToneDrum::snare();
        snare.trigger();
        let rms = window_rms(&mut snare, 30, &mut rng);
        assert!(rms[0] > rms[10]);
        assert!(rms[10] > rms[25]);
    }

    #[test]
    fn quiet_hihats_die_out_faster() {
        let mut rng = RandomSource::seed_from_u64(9);
        let mut loud = HihatVoice::new();
        let mut quiet = HihatVoice::new();
        loud.trigger(1.0);
        quiet.trigger(0.6);
        let loud_rms = window_rms(&mut loud, 6, &mut rng);
        let quiet_rms = window_rms(&mut quiet, 6, &mut rng);
        assert!(loud_rms[0] > loud_rms[4]);
        assert!(quiet_rms[0] > quiet_rms[4]);
        assert!(loud_rms[3] > quiet_rms[3]);
    }

    #[test]
    fn drums_go_idle_below_the_floor() {
        let mut rng = RandomSource::seed_from_u64(10);
        let mut kick = ToneDrum::kick();
        kick.trigger();
        // tone decays 20 dB per 125 ms, so 120 dB is gone after 0.75 s
        for _ in 0..50 {
            let mut buf = vec![0.0f32; SLICE_LEN];
            kick.render(&mut buf, &mut rng);
        }
        assert!(!kick.is_active());

        kick.trigger();
        assert!(kick.is_active());
    }

    #[test]
    fn render_adds_instead_of_overwriting() {
        let mut rng = RandomSource::seed_from_u64(11);
        let mut kick = ToneDrum::kick();
        kick.trigger();
        let mut buf = vec![5.0f32; 16];
        kick.render(&mut buf, &mut rng);
        // each voice contributes at most 0.7
        assert!(buf.iter().all(|&s| (4.3..=5.7).contains(&s)));
    }

    #[test]
    #[should_panic]
    fn zero_volume_hihat_is_rejected() {
        HihatVoice::new().trigger(0.0);
    }
}
