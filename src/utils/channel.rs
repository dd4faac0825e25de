// Simulated radio channel for loopback runs: flat gain plus complex
// Gaussian noise.

use crate::error::{ConfigError, Result};
use num_complex::Complex32;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

pub struct Channel {
    gain: f32,
    noise: Option<Normal<f32>>,
    rng: StdRng,
}

impl Channel {
    /// `noise_std` is per I/Q component, `seed` makes the noise reproducible
    pub fn new(gain: f32, noise_std: f32, seed: Option<u64>) -> Result<Self> {
        if !gain.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "channel gain",
                value: gain,
            });
        }
        let invalid_noise = ConfigError::InvalidParameter {
            name: "noise standard deviation",
            value: noise_std,
        };
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(invalid_noise);
        }
        let noise = if noise_std > 0.0 {
            Some(Normal::new(0.0, noise_std).map_err(|_| invalid_noise)?)
        } else {
            None
        };

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Ok(Self { gain, noise, rng })
    }

    pub fn apply(&mut self, samples: &[Complex32]) -> Vec<Complex32> {
        samples
            .iter()
            .map(|&s| {
                let scaled = s * self.gain;
                match &self.noise {
                    Some(normal) => {
                        let i = normal.sample(&mut self.rng);
                        let q = normal.sample(&mut self.rng);
                        scaled + Complex32::new(i, q)
                    }
                    None => scaled,
                }
            })
            .collect()
    }
}
