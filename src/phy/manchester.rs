// Manchester line coding: 1 -> [0, 1] (rising edge), 0 -> [1, 0] (falling edge)
// `invert` swaps the edge polarity on both sides.

use super::bit::{Bit, LineBit};
use crate::block::{Block, Rate, Work};
use tracing::trace;

pub struct ManchesterEncoder {
    invert: bool,
}

impl ManchesterEncoder {
    pub fn new(invert: bool) -> Self {
        Self { invert }
    }

    /// Line bits for a single input symbol; idle stays idle (twice)
    pub fn encode_symbol(&self, symbol: LineBit) -> [LineBit; 2] {
        match symbol.bit() {
            None => [LineBit::Idle, LineBit::Idle],
            Some(bit) => {
                // rising edge for '1' unless inverted
                if bit.is_set() != self.invert {
                    [LineBit::Zero, LineBit::One]
                } else {
                    [LineBit::One, LineBit::Zero]
                }
            }
        }
    }

    /// Convenience for whole buffers
    pub fn encode(&self, symbols: &[LineBit]) -> Vec<LineBit> {
        let mut out = Vec::with_capacity(symbols.len() * 2);
        for &symbol in symbols {
            out.extend_from_slice(&self.encode_symbol(symbol));
        }
        out
    }
}

impl Block for ManchesterEncoder {
    type Input = LineBit;
    type Output = LineBit;

    fn work(&mut self, input: &[LineBit], output: &mut [LineBit]) -> Work {
        let n = input.len().min(output.len() / 2);
        for (i, &symbol) in input[..n].iter().enumerate() {
            output[2 * i..2 * i + 2].copy_from_slice(&self.encode_symbol(symbol));
        }
        Work::new(n, 2 * n)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput / 2
    }

    fn rate(&self) -> Rate {
        Rate::Interpolate(2)
    }

    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Looking for any transition; holds the last bit seen
    Searching(Option<Bit>),
    /// Locked, next bit starts a pair
    AwaitFirst,
    /// Locked, holding the first bit of the current pair
    AwaitSecond(Bit),
}

pub struct ManchesterDecoder {
    invert: bool,
    state: DecoderState,
    slips: u64,
}

impl ManchesterDecoder {
    pub fn new(invert: bool) -> Self {
        Self {
            invert,
            state: DecoderState::Searching(None),
            slips: 0,
        }
    }

    /// Feed one line bit, returns a decoded bit when a valid pair completes
    pub fn decode_bit(&mut self, input: Bit) -> Option<Bit> {
        match self.state {
            DecoderState::Searching(None) => {
                self.state = DecoderState::Searching(Some(input));
                None
            }
            DecoderState::Searching(Some(last)) => {
                // the locking transition itself is not decoded
                if last != input {
                    self.state = DecoderState::AwaitFirst;
                }
                None
            }
            DecoderState::AwaitFirst => {
                self.state = DecoderState::AwaitSecond(input);
                None
            }
            DecoderState::AwaitSecond(first) if first == input => {
                // no mid-symbol transition: drop the pair and search again
                self.slips += 1;
                trace!("manchester slip on {:?}{:?}", first, input);
                self.state = DecoderState::Searching(None);
                None
            }
            DecoderState::AwaitSecond(first) => {
                self.state = DecoderState::AwaitFirst;
                Some(if self.invert { first } else { input })
            }
        }
    }

    pub fn decode(&mut self, bits: &[Bit]) -> Vec<Bit> {
        bits.iter()
            .filter_map(|&bit| self.decode_bit(bit))
            .collect()
    }

    pub fn is_locked(&self) -> bool {
        !matches!(self.state, DecoderState::Searching(_))
    }

    /// Invalid pairs seen since construction
    pub fn slips(&self) -> u64 {
        self.slips
    }
}

impl Block for ManchesterDecoder {
    type Input = Bit;
    type Output = Bit;

    fn work(&mut self, input: &[Bit], output: &mut [Bit]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;
        while in_i < input.len() && out_i < output.len() {
            let bit = input[in_i];
            in_i += 1;
            if let Some(decoded) = self.decode_bit(bit) {
                output[out_i] = decoded;
                out_i += 1;
            }
        }
        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput * 2
    }

    fn rate(&self) -> Rate {
        Rate::Variable
    }

    fn reset(&mut self) {
        self.state = DecoderState::Searching(None);
        self.slips = 0;
    }
}
