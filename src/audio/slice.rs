use crate::shared::{QUANT_SCALE, SLICE_LEN};

// One tick of mono audio; every voice adds into it, then it is quantized
// and shipped to the sink.
#[derive(Clone, Debug)]
pub struct Slice {
    samples: [f32; SLICE_LEN],
}

impl Default for Slice {
    fn default() -> Self {
        Self { samples: [0.0; SLICE_LEN] }
    }
}

impl Slice {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Scale by the global volume, quantize to s16 and append the native-endian
    /// bytes to `out` (which is cleared first). Always `2 * SLICE_LEN` bytes.
    pub fn write_pcm(&self, volume: f32, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(SLICE_LEN * 2);
        for &v in &self.samples {
            out.extend_from_slice(&quantize(v * volume).to_ne_bytes());
        }
    }
}

#[inline]
pub fn quantize(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * QUANT_SCALE).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_slice_quantizes_to_zero_bytes() {
        let slice = Slice::zero();
        let mut out = Vec::new();
        slice.write_pcm(0.2, &mut out);
        assert_eq!(out.len(), 2 * SLICE_LEN);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn quantize_clamps_before_scaling() {
        assert_eq!(quantize(10.0), 32_000);
        assert_eq!(quantize(-10.0), -32_000);
        assert_eq!(quantize(0.5), 16_000);
        assert_eq!(quantize(0.0), 0);
    }

    #[test]
    fn volume_is_applied_before_the_clamp() {
        let mut slice = Slice::zero();
        slice.samples_mut()[0] = 2.0;
        slice.samples_mut()[1] = -1.0;
        let mut out = Vec::new();
        slice.write_pcm(0.25, &mut out);
        let first = i16::from_ne_bytes([out[0], out[1]]);
        let second = i16::from_ne_bytes([out[2], out[3]]);
        assert_eq!(first, 16_000);
        assert_eq!(second, -8_000);
    }

    #[test]
    fn clear_resets_every_sample() {
        let mut slice = Slice::zero();
        slice.samples_mut().fill(0.7);
        slice.clear();
        assert!(slice.samples().iter().all(|&s| s == 0.0));
    }
}
