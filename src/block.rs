//! Streaming block contract shared by every stage.
//!
//! A host hands each stage an input slice and an output slice and gets back
//! how much of each was used. Stages keep all of their state between calls,
//! so input may arrive in chunks of any size.

use tracing::trace;

/// Result of one `work` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Work {
    pub consumed: usize,
    pub produced: usize,
}

impl Work {
    pub fn new(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced }
    }

    /// Neither input nor output moved: the host should retry with more input
    /// (or more output room) later
    pub fn is_idle(&self) -> bool {
        self.consumed == 0 && self.produced == 0
    }
}

/// Input/output ratio a stage declares to its host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    /// One output per input
    Sync,
    /// Exactly `k` outputs per input
    Interpolate(usize),
    /// One output per `k` inputs
    Decimate(usize),
    /// Data dependent
    Variable,
}

pub trait Block {
    type Input: Copy;
    type Output: Copy + Default;

    /// Process as much as possible of `input` into `output`.
    ///
    /// Never blocks. Returns `Work::default()` when no progress is possible.
    fn work(&mut self, input: &[Self::Input], output: &mut [Self::Output]) -> Work;

    /// Estimated number of input items needed to fill `noutput` outputs.
    /// Callers must not rely on it being exact.
    fn forecast(&self, noutput: usize) -> usize;

    fn rate(&self) -> Rate;

    /// Back to the freshly constructed state
    fn reset(&mut self);
}

/// In-process driver for a single block.
///
/// Holds the input the block has not consumed yet and keeps calling `work`
/// until the block stops making progress.
pub struct Stage<B: Block> {
    block: B,
    pending: Vec<B::Input>,
    scratch: Vec<B::Output>,
}

impl<B: Block> Stage<B> {
    pub fn new(block: B, chunk_size: usize) -> Self {
        Self {
            block,
            pending: Vec::new(),
            scratch: vec![B::Output::default(); chunk_size.max(1)],
        }
    }

    /// Queue `input` and run the block, returning everything it produced
    pub fn push(&mut self, input: &[B::Input]) -> Vec<B::Output> {
        let mut output = Vec::new();
        self.push_into(input, &mut output);
        output
    }

    pub fn push_into(&mut self, input: &[B::Input], output: &mut Vec<B::Output>) {
        self.pending.extend_from_slice(input);

        let mut offset = 0;
        loop {
            let work = self
                .block
                .work(&self.pending[offset..], &mut self.scratch);
            if work.is_idle() {
                break;
            }
            offset += work.consumed;
            output.extend_from_slice(&self.scratch[..work.produced]);
        }

        self.pending.drain(..offset);
        trace!(
            "stage consumed {} items, {} left pending",
            offset,
            self.pending.len()
        );
    }

    /// Items waiting for more input before the block can use them
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn block(&self) -> &B {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut B {
        &mut self.block
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.block.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits pairs: needs two inputs per output, like a tiny decimator
    struct PairSum;

    impl Block for PairSum {
        type Input = u8;
        type Output = u8;

        fn work(&mut self, input: &[u8], output: &mut [u8]) -> Work {
            let n = (input.len() / 2).min(output.len());
            for i in 0..n {
                output[i] = input[2 * i] + input[2 * i + 1];
            }
            Work::new(2 * n, n)
        }

        fn forecast(&self, noutput: usize) -> usize {
            noutput * 2
        }

        fn rate(&self) -> Rate {
            Rate::Decimate(2)
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn test_stage_keeps_unconsumed_input() {
        let mut stage = Stage::new(PairSum, 2);
        assert_eq!(stage.push(&[1, 2, 3]), vec![3]);
        assert_eq!(stage.pending(), 1);
        assert_eq!(stage.push(&[4, 5, 6]), vec![7, 11]);
        assert_eq!(stage.pending(), 0);
    }

    #[test]
    fn test_stage_runs_past_small_scratch() {
        let mut stage = Stage::new(PairSum, 1);
        let out = stage.push(&[1; 20]);
        assert_eq!(out, vec![2; 10]);
    }

    #[test]
    fn test_work_idle() {
        assert!(Work::default().is_idle());
        assert!(!Work::new(0, 1).is_idle());
    }
}
