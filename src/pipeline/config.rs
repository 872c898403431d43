// Everything a run can be tuned with; lives in <dir>/.funkgen/config.json

use serde::{Deserialize, Serialize};

use super::composer::ComposeError;
use super::grammar::GrammarKind;
use super::partition::Partition;
use crate::shared::{DEFAULT_SLAPPINESS, DEFAULT_VOLUME, ROOT_RANGE, ROOT_TABLE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("root note {0} is outside the playable range 0..=127")]
    RootOutOfRange(i32),
    #[error("volume must be a finite, non-negative number, got {0}")]
    BadVolume(f32),
    #[error("opening partition: {0}")]
    BadPartition(#[from] ComposeError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stdout, // raw s16 for `play`/`aplay`
    Wav,
    Device,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumStyle {
    // fixed funk meter
    #[default]
    Meter,
    // kick/snare land on alternating cell boundaries of the partition
    Partition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: Option<u64>, // None pulls one from the OS
    pub volume: f32,
    pub root_table: Vec<i32>,
    pub opening_partition: Vec<usize>, // cell widths of the first pattern
    pub grammar: GrammarKind,
    pub drum_style: DrumStyle,
    pub slappiness: f32,
    pub sink: SinkKind,
    pub wav_path: String, // relative to the project dir
    pub max_ticks: Option<u64>, // None runs until the sink goes away
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            volume: DEFAULT_VOLUME,
            root_table: ROOT_TABLE.to_vec(),
            opening_partition: Partition::default().widths().to_vec(),
            grammar: GrammarKind::default(),
            drum_style: DrumStyle::default(),
            slappiness: DEFAULT_SLAPPINESS,
            sink: SinkKind::default(),
            wav_path: String::from("funkgen.wav"),
            max_ticks: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(&root) = self.root_table.iter().find(|&&r| !ROOT_RANGE.contains(&r)) {
            return Err(ConfigError::RootOutOfRange(root));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ConfigError::BadVolume(self.volume));
        }
        self.opening_partition()?;
        Ok(())
    }

    pub fn opening_partition(&self) -> Result<Partition, ComposeError> {
        Partition::new(self.opening_partition.clone())
    }
}
