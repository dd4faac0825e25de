use crate::block::{Block, Rate, Work};
use crate::error::{ConfigError, Result};
use crate::utils::consts::{AGC_ESTIMATOR_ALPHA, AGC_ESTIMATOR_BETA};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgcConfig {
    /// Loop gain per sample
    pub rate: f32,
    /// Target magnitude
    pub reference: f32,
    /// Initial gain
    pub gain: f32,
    /// Gain ceiling, <= 0 disables it
    pub max_gain: f32,
}

impl AgcConfig {
    pub fn validate(&self) -> Result<()> {
        let params = [
            ("AGC rate", self.rate),
            ("AGC reference", self.reference),
            ("AGC gain", self.gain),
            ("AGC max gain", self.max_gain),
        ];
        for (name, value) in params {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        if self.rate <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "AGC rate",
                value: self.rate,
            });
        }
        Ok(())
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            rate: 1e-3,
            reference: 1.0,
            gain: 1.0,
            max_gain: 65536.0,
        }
    }
}

/// Sample-by-sample AGC for complex baseband.
///
/// The current gain is applied first and then adapted from the magnitude of
/// the scaled sample, estimated without a square root.
pub struct FastAgc {
    config: AgcConfig,
    gain: f32,
}

impl FastAgc {
    pub fn new(config: AgcConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "FastAgc initialized: rate {}, reference {}, gain {}, max gain {}",
            config.rate, config.reference, config.gain, config.max_gain
        );

        Ok(Self {
            config,
            gain: config.gain,
        })
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// 'Alpha * Max + Beta * Min' magnitude estimate
    fn estimate_magnitude(sample: Complex32) -> f32 {
        let abs_re = sample.re.abs();
        let abs_im = sample.im.abs();
        let (max, min) = if abs_re > abs_im {
            (abs_re, abs_im)
        } else {
            (abs_im, abs_re)
        };
        AGC_ESTIMATOR_ALPHA * max + AGC_ESTIMATOR_BETA * min
    }

    pub fn step(&mut self, input: Complex32) -> Complex32 {
        let scaled = input * self.gain;

        let magnitude = Self::estimate_magnitude(scaled);
        self.gain += self.config.rate * (self.config.reference - magnitude);

        if self.config.max_gain > 0.0 && self.gain > self.config.max_gain {
            self.gain = self.config.max_gain;
        }

        scaled
    }
}

impl Block for FastAgc {
    type Input = Complex32;
    type Output = Complex32;

    fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Work {
        let n = input.len().min(output.len());
        for (out, &sample) in output[..n].iter_mut().zip(&input[..n]) {
            *out = self.step(sample);
        }
        Work::new(n, n)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput
    }

    fn rate(&self) -> Rate {
        Rate::Sync
    }

    fn reset(&mut self) {
        self.gain = self.config.gain;
    }
}
