//! On-Off Keying modulation and envelope demodulation

use super::bit::LineBit;
use crate::block::{Block, Rate, Work};
use crate::error::{ConfigError, Result};
use num_complex::Complex32;
use std::collections::VecDeque;
use tracing::info;

pub(crate) fn check_rates(baud_rate: u32, sample_rate: u32) -> Result<()> {
    if baud_rate == 0 {
        return Err(ConfigError::ZeroRate { name: "baud rate" });
    }
    if sample_rate == 0 {
        return Err(ConfigError::ZeroRate { name: "sample rate" });
    }
    if sample_rate <= baud_rate {
        return Err(ConfigError::RateRatio {
            baud_rate,
            sample_rate,
        });
    }
    Ok(())
}

/// Short averaging window of the demodulator, three quarters of a symbol
pub(crate) fn symbol_window(baud_rate: u32, sample_rate: u32) -> Result<usize> {
    check_rates(baud_rate, sample_rate)?;

    let window = ((3 * sample_rate as u64) / (4 * baud_rate as u64)) as usize;
    if window == 0 {
        return Err(ConfigError::EmptyWindow {
            baud_rate,
            sample_rate,
        });
    }
    Ok(window)
}

/// OOK modulator
///
/// An NCO running at the sample rate advances by `baud_rate` per output
/// sample. Between symbol boundaries the current level is held; at a
/// boundary the next line bit is consumed and the boundary sample is
/// linearly interpolated between the old and new levels.
pub struct OokModulator {
    baud_rate: u64,
    sample_rate: u64,
    nco_count: u64,
    level: f32,
}

impl OokModulator {
    pub fn new(baud_rate: u32, sample_rate: u32) -> Result<Self> {
        check_rates(baud_rate, sample_rate)?;

        info!(
            "OokModulator initialized: {} baud, {} Hz ({:.2} samples/symbol)",
            baud_rate,
            sample_rate,
            sample_rate as f32 / baud_rate as f32
        );

        Ok(Self {
            baud_rate: baud_rate as u64,
            sample_rate: sample_rate as u64,
            nco_count: sample_rate as u64,
            level: 0.0,
        })
    }

    fn symbol_level(bit: LineBit) -> f32 {
        // idle keys the carrier off
        if bit == LineBit::One { 1.0 } else { 0.0 }
    }

    /// Level held by the last consumed bit
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Block for OokModulator {
    type Input = LineBit;
    type Output = Complex32;

    fn work(&mut self, input: &[LineBit], output: &mut [Complex32]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;

        while in_i < input.len() && out_i < output.len() {
            let mut next_count = self.nco_count + self.baud_rate;
            if next_count < self.sample_rate {
                output[out_i] = Complex32::new(self.level, 0.0);
            } else {
                let old_level = self.level;
                self.level = Self::symbol_level(input[in_i]);
                in_i += 1;

                next_count -= self.sample_rate;
                let remainder = next_count as f32;
                let baud = self.baud_rate as f32;
                let value =
                    (self.level * remainder + old_level * (baud - remainder)) / baud;
                output[out_i] = Complex32::new(value, 0.0);
            }
            out_i += 1;
            self.nco_count = next_count;
        }

        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        (noutput as u64 * self.baud_rate / self.sample_rate) as usize + 1
    }

    fn rate(&self) -> Rate {
        Rate::Variable
    }

    fn reset(&mut self) {
        self.nco_count = self.sample_rate;
        self.level = 0.0;
    }
}

/// OOK envelope demodulator
///
/// Output is the short (about 3/4 symbol) boxcar average of the input
/// magnitude minus a ten times longer one, which removes carrier level and
/// slow fading. The delay line starts as silence and the first
/// `warmup_len()` inputs only prime it.
pub struct OokDemodulator {
    symbol_avg_period: usize,
    offset_avg_period: usize,
    /// Magnitudes of the last `symbol_avg_period + offset_avg_period` inputs,
    /// oldest first
    history: VecDeque<f32>,
    symbol_acc: f64,
    offset_acc: f64,
    warmup_remaining: usize,
}

impl OokDemodulator {
    pub fn new(baud_rate: u32, sample_rate: u32) -> Result<Self> {
        let symbol_avg_period = symbol_window(baud_rate, sample_rate)?;
        let offset_avg_period = symbol_avg_period * 10;

        info!(
            "OokDemodulator initialized: symbol window {} samples, offset window {} samples",
            symbol_avg_period, offset_avg_period
        );

        let mut demod = Self {
            symbol_avg_period,
            offset_avg_period,
            history: VecDeque::with_capacity(symbol_avg_period + offset_avg_period),
            symbol_acc: 0.0,
            offset_acc: 0.0,
            warmup_remaining: 0,
        };
        demod.reset();
        Ok(demod)
    }

    /// Inputs absorbed before the first output
    pub fn warmup_len(&self) -> usize {
        self.symbol_avg_period + self.offset_avg_period
    }

    pub fn symbol_avg_period(&self) -> usize {
        self.symbol_avg_period
    }

    pub fn offset_avg_period(&self) -> usize {
        self.offset_avg_period
    }

    /// Push one sample through both windows and return the soft symbol
    fn step(&mut self, sample: Complex32) -> f32 {
        let new_mag = sample.norm();
        // history is always full: [offset window | symbol window]
        let old_symbol_mag = self.history[self.offset_avg_period];
        let old_offset_mag = self.history[0];

        self.symbol_acc += (new_mag - old_symbol_mag) as f64;
        self.offset_acc += (old_symbol_mag - old_offset_mag) as f64;

        self.history.pop_front();
        self.history.push_back(new_mag);

        let symbol_value = self.symbol_acc / self.symbol_avg_period as f64
            - self.offset_acc / self.offset_avg_period as f64;
        symbol_value as f32
    }
}

impl Block for OokDemodulator {
    type Input = Complex32;
    type Output = f32;

    fn work(&mut self, input: &[Complex32], output: &mut [f32]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;

        while in_i < input.len() && self.warmup_remaining > 0 {
            self.step(input[in_i]);
            in_i += 1;
            self.warmup_remaining -= 1;
        }

        while in_i < input.len() && out_i < output.len() {
            output[out_i] = self.step(input[in_i]);
            in_i += 1;
            out_i += 1;
        }

        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput + self.warmup_remaining
    }

    fn rate(&self) -> Rate {
        Rate::Sync
    }

    fn reset(&mut self) {
        self.history.clear();
        self.history
            .extend(std::iter::repeat_n(0.0, self.warmup_len()));
        self.symbol_acc = 0.0;
        self.offset_acc = 0.0;
        self.warmup_remaining = self.warmup_len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::bit::line_bits_from_u8s;

    fn run<B: Block>(block: &mut B, input: &[B::Input], capacity: usize) -> Vec<B::Output> {
        let mut out = vec![B::Output::default(); capacity];
        let work = block.work(input, &mut out);
        out.truncate(work.produced);
        out
    }

    fn real(samples: &[Complex32]) -> Vec<f32> {
        samples.iter().map(|s| s.re).collect()
    }

    fn assert_close(got: &[f32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len(), "length mismatch: {:?}", got);
        for (i, (g, e)) in got.iter().zip(expected).enumerate() {
            assert!((g - e).abs() < 1e-5, "sample {}: got {}, expected {}", i, g, e);
        }
    }

    #[test]
    fn test_reject_bad_rates() {
        assert!(OokModulator::new(0, 8).is_err());
        assert!(OokModulator::new(8, 8).is_err());
        assert!(OokDemodulator::new(9, 10).is_err());
        assert!(OokDemodulator::new(2, 8).is_ok());
    }

    #[test]
    fn test_modulator_integer_ratio() {
        let mut modulator = OokModulator::new(2, 8).unwrap();
        let bits = line_bits_from_u8s(&[0, 1, 0, 1, 0, 0]);
        let out = run(&mut modulator, &bits, 64);
        let expected = [
            0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        assert_close(&real(&out), &expected);
    }

    #[test]
    fn test_modulator_interpolates_fractional_boundaries() {
        let mut modulator = OokModulator::new(3, 10).unwrap();
        let bits = line_bits_from_u8s(&[0, 1, 0, 1, 0, 0]);
        let out = run(&mut modulator, &bits, 64);
        let expected = [
            0.0,
            0.0,
            0.0,
            2.0 / 3.0,
            1.0,
            1.0,
            2.0 / 3.0,
            0.0,
            0.0,
            0.0,
            1.0,
            1.0,
            1.0,
            1.0 / 3.0,
            0.0,
            0.0,
            0.0,
        ];
        assert_close(&real(&out), &expected);
        assert!(out.iter().all(|s| s.im == 0.0));
    }

    #[test]
    fn test_modulator_hold_is_exact() {
        let mut modulator = OokModulator::new(3, 10).unwrap();
        let bits = vec![LineBit::One; 40];
        let out = run(&mut modulator, &bits, 100);
        // only the very first boundary blends from the initial zero level
        let settled: Vec<f32> = real(&out).into_iter().skip(1).collect();
        assert!(settled.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_modulator_never_fabricates_bits() {
        let mut modulator = OokModulator::new(2, 8).unwrap();
        let mut out = [Complex32::default(); 16];
        assert!(modulator.work(&[], &mut out).is_idle());

        let work = modulator.work(&line_bits_from_u8s(&[1]), &mut out);
        assert_eq!(work.consumed, 1);
        // stops right after the boundary sample that consumed the bit
        assert_eq!(work.produced, 1);
        assert_eq!(modulator.forecast(16), 5);
    }

    #[test]
    fn test_modulator_idle_is_carrier_off() {
        let mut modulator = OokModulator::new(2, 8).unwrap();
        let bits = line_bits_from_u8s(&[1, 0xFF, 0xFF, 1]);
        let out = real(&run(&mut modulator, &bits, 64));
        assert_eq!(out.len(), 12);
        assert!(out[1..4].iter().all(|&v| v == 1.0));
        assert!(out[4..12].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_demodulator_reference_vector() {
        let src: [f32; 69] = [
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
            1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
            1.0, 0.0, 0.0, 0.0, 0.0,
        ];
        // settled tail of the (2 baud, 8 Hz) reference; the first 33 inputs prime the windows
        let expected = [
            -0.0666667, 0.2666667, 0.6000000, 0.5666667, 0.2000000, -0.1333333, -0.4666667,
            -0.4333333, -0.4000000, -0.4000000, -0.4000000, -0.4000000, -0.0666667,
            0.3000000, 0.6666666, 0.6666666, 0.6666666, 0.6333333, 0.6000000, 0.5666667,
            0.2000000, -0.1666667, -0.5333334, -0.5333334, -0.5333334, -0.5000000,
            -0.4666667, -0.4333333, -0.0666667, 0.2666667, 0.6000000, 0.5666667, 0.2000000,
            -0.1333333, -0.4666667, -0.4333333,
        ];

        let mut demod = OokDemodulator::new(2, 8).unwrap();
        assert_eq!(demod.warmup_len(), 33);

        let input: Vec<Complex32> = src.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        let out = run(&mut demod, &input, 128);
        assert_close(&out, &expected);
    }

    #[test]
    fn test_demodulator_uses_magnitude() {
        let mut a = OokDemodulator::new(2, 8).unwrap();
        let mut b = OokDemodulator::new(2, 8).unwrap();
        let real_in: Vec<Complex32> = (0..60)
            .map(|i| Complex32::new(if (i / 4) % 2 == 0 { 1.0 } else { 0.0 }, 0.0))
            .collect();
        let rotated: Vec<Complex32> = real_in
            .iter()
            .map(|s| Complex32::new(0.0, -s.re))
            .collect();
        assert_close(&run(&mut a, &real_in, 64), &run(&mut b, &rotated, 64));
    }

    #[test]
    fn test_demodulator_rejects_dc() {
        let mut demod = OokDemodulator::new(1200, 48000).unwrap();
        let input = vec![Complex32::new(0.3, 0.4); 5000];
        let out = run(&mut demod, &input, 5000);
        assert_eq!(out.len(), 5000 - demod.warmup_len());
        assert!(out.iter().all(|v| v.abs() < 1e-4));
    }
}
