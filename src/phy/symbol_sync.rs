use super::bit::Bit;
use super::ook::check_rates;
use crate::block::{Block, Rate, Work};
use crate::error::Result;
use tracing::info;

/// Edge triggered symbol timing recovery.
///
/// An integer NCO advances by `baud_rate` per input sample and wraps at
/// `sample_rate`. Every zero crossing of the soft input pulls the phase to
/// half a symbol, so the decision point lands mid-symbol. One hard bit is
/// taken per armed period once the phase passes the midpoint.
pub struct SymbolSync {
    baud_rate: u64,
    sample_rate: u64,
    sample_ratio: usize,
    nco_count: u64,
    symbol_req: bool,
    last_sample: f32,
}

impl SymbolSync {
    pub fn new(baud_rate: u32, sample_rate: u32) -> Result<Self> {
        check_rates(baud_rate, sample_rate)?;

        let sample_ratio = 1 + (sample_rate / baud_rate) as usize;
        info!(
            "SymbolSync initialized: {} baud, {} Hz, forecast ratio {}",
            baud_rate, sample_rate, sample_ratio
        );

        Ok(Self {
            baud_rate: baud_rate as u64,
            sample_rate: sample_rate as u64,
            sample_ratio,
            nco_count: sample_rate as u64,
            symbol_req: true,
            last_sample: 0.0,
        })
    }

    /// Advance by one soft sample, returning a bit at each decision point
    pub fn step(&mut self, sample: f32) -> Option<Bit> {
        let mut next_count = if sample * self.last_sample <= 0.0 {
            self.symbol_req = true;
            self.baud_rate / 2
        } else {
            self.nco_count + self.baud_rate
        };
        self.last_sample = sample;

        let mut decision = None;
        if next_count >= self.sample_rate {
            next_count -= self.sample_rate;
            self.symbol_req = true;
        } else if self.symbol_req && next_count >= self.sample_rate / 2 {
            decision = Some(Bit::from(sample >= 0.0));
            self.symbol_req = false;
        }
        self.nco_count = next_count;

        decision
    }
}

impl Block for SymbolSync {
    type Input = f32;
    type Output = Bit;

    fn work(&mut self, input: &[f32], output: &mut [Bit]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;
        while in_i < input.len() && out_i < output.len() {
            let sample = input[in_i];
            in_i += 1;
            if let Some(bit) = self.step(sample) {
                output[out_i] = bit;
                out_i += 1;
            }
        }
        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput * self.sample_ratio
    }

    fn rate(&self) -> Rate {
        Rate::Variable
    }

    fn reset(&mut self) {
        self.nco_count = self.sample_rate;
        self.symbol_req = true;
        self.last_sample = 0.0;
    }
}
