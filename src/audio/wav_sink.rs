use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;

use super::PcmSink;
use crate::shared::MIXFREQ;

// Render to disk instead of a speaker: 48 kHz, mono, s16
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: MIXFREQ,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self { writer: Some(writer) })
    }
}

impl PcmSink for WavSink {
    fn write_slice(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let writer = self.writer.as_mut().context("wav sink already finished")?;
        for pair in bytes.chunks_exact(2) {
            writer.write_sample(i16::from_ne_bytes([pair[0], pair[1]]))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}
