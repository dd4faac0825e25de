// CIC interpolator and decimator on 64-bit fixed point I/Q.
// Samples are saturated to [-1, 1] and scaled by 2^32 before filtering.

use crate::block::{Block, Rate, Work};
use crate::error::{ConfigError, Result};
use crate::utils::consts::CIC_FRACTION_BITS;
use num_complex::Complex32;
use tracing::info;

const FIXED_ONE: i64 = 1 << CIC_FRACTION_BITS;

#[derive(Debug, Clone, Copy, Default)]
struct FixedIq {
    re: i64,
    im: i64,
}

impl FixedIq {
    fn from_sample(sample: Complex32) -> Self {
        Self {
            re: to_fixed(sample.re),
            im: to_fixed(sample.im),
        }
    }

    fn to_sample(self, gain: f32) -> Complex32 {
        Complex32::new(self.re as f32 * gain, self.im as f32 * gain)
    }
}

fn to_fixed(value: f32) -> i64 {
    if value > 1.0 {
        FIXED_ONE
    } else if value < -1.0 {
        -FIXED_ONE
    } else {
        (value * FIXED_ONE as f32) as i64
    }
}

/// Register growth check shared by both directions
pub(crate) fn check_shape(factor: usize, stages: usize) -> Result<()> {
    if factor == 0 || stages == 0 {
        return Err(ConfigError::CicShape { factor, stages });
    }

    let mut ext_bits = 0;
    while (factor >> ext_bits) > 1 {
        ext_bits += 1;
    }
    if ext_bits * stages > CIC_FRACTION_BITS as usize {
        return Err(ConfigError::CicOverflow { factor, stages });
    }
    Ok(())
}

/// `2^32 * R^N` in floating point
fn full_scale(factor: usize, stages: usize) -> f64 {
    let mut scale = FIXED_ONE as f64;
    for _ in 0..stages {
        scale *= factor as f64;
    }
    scale
}

/// Cascade of running sums
struct Integrators(Vec<FixedIq>);

impl Integrators {
    fn apply(&mut self, mut value: FixedIq) -> FixedIq {
        for state in self.0.iter_mut() {
            value.re = value.re.wrapping_add(state.re);
            value.im = value.im.wrapping_add(state.im);
            *state = value;
        }
        value
    }

    fn clear(&mut self) {
        self.0.fill(FixedIq::default());
    }
}

/// Cascade of first differences
struct Combs(Vec<FixedIq>);

impl Combs {
    fn apply(&mut self, mut value: FixedIq) -> FixedIq {
        for state in self.0.iter_mut() {
            let diff = FixedIq {
                re: value.re.wrapping_sub(state.re),
                im: value.im.wrapping_sub(state.im),
            };
            *state = value;
            value = diff;
        }
        value
    }

    fn clear(&mut self) {
        self.0.fill(FixedIq::default());
    }
}

pub struct CicInterpolator {
    factor: usize,
    combs: Combs,
    integrators: Integrators,
    gain: f32,
}

impl CicInterpolator {
    pub fn new(factor: usize, stages: usize) -> Result<Self> {
        check_shape(factor, stages)?;

        let gain = (factor as f64 / full_scale(factor, stages)) as f32;
        info!(
            "CicInterpolator initialized: factor {}, {} stages",
            factor, stages
        );

        Ok(Self {
            factor,
            combs: Combs(vec![FixedIq::default(); stages]),
            integrators: Integrators(vec![FixedIq::default(); stages]),
            gain,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// One low rate sample in, `factor` high rate samples out
    fn interpolate(&mut self, sample: Complex32, out: &mut [Complex32]) {
        let mut value = self.combs.apply(FixedIq::from_sample(sample));
        for (j, slot) in out.iter_mut().enumerate() {
            if j != 0 {
                value = FixedIq::default();
            }
            value = self.integrators.apply(value);
            *slot = value.to_sample(self.gain);
        }
    }
}

impl Block for CicInterpolator {
    type Input = Complex32;
    type Output = Complex32;

    fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Work {
        let n = input.len().min(output.len() / self.factor);
        for (&sample, out) in input[..n].iter().zip(output.chunks_exact_mut(self.factor)) {
            self.interpolate(sample, out);
        }
        Work::new(n, n * self.factor)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput / self.factor
    }

    fn rate(&self) -> Rate {
        Rate::Interpolate(self.factor)
    }

    fn reset(&mut self) {
        self.combs.clear();
        self.integrators.clear();
    }
}

pub struct CicDecimator {
    factor: usize,
    integrators: Integrators,
    combs: Combs,
    gain: f32,
}

impl CicDecimator {
    pub fn new(factor: usize, stages: usize) -> Result<Self> {
        check_shape(factor, stages)?;

        let gain = (1.0 / full_scale(factor, stages)) as f32;
        info!(
            "CicDecimator initialized: factor {}, {} stages",
            factor, stages
        );

        Ok(Self {
            factor,
            integrators: Integrators(vec![FixedIq::default(); stages]),
            combs: Combs(vec![FixedIq::default(); stages]),
            gain,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    fn decimate(&mut self, samples: &[Complex32]) -> Complex32 {
        let mut value = FixedIq::default();
        for &sample in samples {
            value = self.integrators.apply(FixedIq::from_sample(sample));
        }
        self.combs.apply(value).to_sample(self.gain)
    }
}

impl Block for CicDecimator {
    type Input = Complex32;
    type Output = Complex32;

    fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Work {
        let n = (input.len() / self.factor).min(output.len());
        for (i, out) in output[..n].iter_mut().enumerate() {
            let start = i * self.factor;
            *out = self.decimate(&input[start..start + self.factor]);
        }
        Work::new(n * self.factor, n)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput * self.factor
    }

    fn rate(&self) -> Rate {
        Rate::Decimate(self.factor)
    }

    fn reset(&mut self) {
        self.integrators.clear();
        self.combs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Stage;

    fn real(values: &[f32]) -> Vec<Complex32> {
        values.iter().map(|&v| Complex32::new(v, 0.0)).collect()
    }

    fn assert_re(got: &[Complex32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g.re - e).abs() < 1e-6, "got {}, expected {}", g.re, e);
            assert!(g.im.abs() < 1e-6);
        }
    }

    #[test]
    fn test_shape_limits() {
        assert!(CicInterpolator::new(0, 2).is_err());
        assert!(CicDecimator::new(4, 0).is_err());
        // 2 bits of growth per stage fit 16 stages exactly
        assert!(CicDecimator::new(4, 16).is_ok());
        assert!(matches!(
            CicDecimator::new(4, 17),
            Err(ConfigError::CicOverflow { factor: 4, stages: 17 })
        ));
        // growth is rounded down: 5 needs two bits
        assert!(CicInterpolator::new(5, 16).is_ok());
        assert!(CicInterpolator::new(8, 11).is_err());
    }

    #[test]
    fn test_interpolator_dc_ramp() {
        let mut cic = Stage::new(CicInterpolator::new(4, 2).unwrap(), 64);
        let out = cic.push(&real(&[0.5; 3]));
        assert_re(
            &out,
            &[0.125, 0.25, 0.375, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
        );
        assert_eq!(cic.block().rate(), Rate::Interpolate(4));
    }

    #[test]
    fn test_single_stage_interpolator_holds() {
        let mut cic = Stage::new(CicInterpolator::new(4, 1).unwrap(), 64);
        let out = cic.push(&real(&[1.0, 0.0]));
        assert_re(&out, &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decimator_dc_gain() {
        let mut cic = Stage::new(CicDecimator::new(4, 2).unwrap(), 64);
        let out = cic.push(&real(&[0.5; 24]));
        assert_re(&out, &[0.3125, 0.5, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_decimator_impulse_and_saturation() {
        let mut cic = CicDecimator::new(4, 1).unwrap();
        let mut input = real(&[0.0; 12]);
        input[0] = Complex32::new(1.0, 0.0);
        let mut out = [Complex32::default(); 3];
        assert_eq!(cic.work(&input, &mut out), Work::new(12, 3));
        assert_re(&out, &[0.25, 0.0, 0.0]);

        // out of range samples clip to +-1 and cancel in pairs
        let mut cic = Stage::new(CicDecimator::new(2, 1).unwrap(), 64);
        let out = cic.push(&real(&[2.0, -3.0, 2.0, -3.0, 2.0, -3.0]));
        assert_re(&out, &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decimator_waits_for_full_groups() {
        let mut cic = CicDecimator::new(4, 2).unwrap();
        let mut out = [Complex32::default(); 4];
        assert!(cic.work(&real(&[0.5; 3]), &mut out).is_idle());
        assert_eq!(cic.forecast(3), 12);

        let mut stage = Stage::new(CicDecimator::new(4, 2).unwrap(), 64);
        assert!(stage.push(&real(&[0.5; 3])).is_empty());
        assert_eq!(stage.push(&real(&[0.5; 5])).len(), 2);
        assert_eq!(stage.pending(), 0);
    }

    #[test]
    fn test_interpolate_then_decimate_recovers_dc() {
        let mut up = Stage::new(CicInterpolator::new(8, 3).unwrap(), 256);
        let mut down = Stage::new(CicDecimator::new(8, 3).unwrap(), 256);
        let high = up.push(&real(&[0.25; 16]));
        let low = down.push(&high);
        assert_eq!(low.len(), 16);
        for sample in &low[4..] {
            assert!((sample.re - 0.25).abs() < 1e-5);
        }
    }
}
