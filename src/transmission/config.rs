use crate::error::{ConfigError, Result};
use crate::link::{DeframerConfig, FramerConfig};
use crate::phy::AgcConfig;
use crate::phy::cic::check_shape;
use crate::phy::ook::symbol_window;
use crate::utils::consts::{
    BITS_PER_BYTE, DEFAULT_BAUD_RATE, DEFAULT_CHUNK_SIZE, DEFAULT_SAMPLE_RATE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// CIC rate change between the modulator/demodulator and the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleConfig {
    pub factor: usize,
    pub stages: usize,
}

/// Parameters shared by both ends of the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Manchester chips per second on the line
    pub baud_rate: u32,
    pub sample_rate: u32,
    /// Swap Manchester edge polarity
    pub invert: bool,
    pub framer: FramerConfig,
    pub deframer: DeframerConfig,
    /// Receive AGC, off when absent
    pub agc: Option<AgcConfig>,
    /// Front end runs at `sample_rate * factor` when present
    pub resample: Option<ResampleConfig>,
    /// Work buffer size for each stage
    pub chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            invert: false,
            framer: FramerConfig::default(),
            deframer: DeframerConfig::default(),
            agc: None,
            resample: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        symbol_window(self.baud_rate, self.sample_rate)?;
        if let Some(agc) = &self.agc {
            agc.validate()?;
        }
        if let Some(resample) = &self.resample {
            check_shape(resample.factor, resample.stages)?;
            self.resampled_rate(resample.factor)?;
        }

        // framer writes a whole byte of line bits per step, the CIC
        // interpolator a whole group
        let min = self.resample.map_or(BITS_PER_BYTE, |r| r.factor.max(BITS_PER_BYTE));
        if self.chunk_size < min {
            return Err(ConfigError::ChunkTooSmall {
                chunk_size: self.chunk_size,
                min,
            });
        }
        Ok(())
    }

    fn resampled_rate(&self, factor: usize) -> Result<u32> {
        u32::try_from(factor)
            .ok()
            .and_then(|f| self.sample_rate.checked_mul(f))
            .ok_or(ConfigError::FrontEndRate {
                sample_rate: self.sample_rate,
                factor,
            })
    }

    /// Sample rate seen by the radio or WAV file
    pub fn front_end_rate(&self) -> Result<u32> {
        match self.resample {
            Some(resample) => self.resampled_rate(resample.factor),
            None => Ok(self.sample_rate),
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        info!("Loaded link config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Nominal samples per Manchester chip
    pub fn samples_per_chip(&self) -> f32 {
        self.sample_rate as f32 / self.baud_rate as f32
    }
}
