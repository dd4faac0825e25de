/// OOK receiver: [CIC decimator] -> [AGC] -> envelope demodulator ->
/// symbol sync -> Manchester decoder -> Deframer
use super::config::LinkConfig;
use crate::block::Stage;
use crate::error::Result;
use crate::link::Deframer;
use crate::phy::{Bit, CicDecimator, FastAgc, ManchesterDecoder, OokDemodulator, SymbolSync};
use crate::transport::MessageUnpacker;
use num_complex::Complex32;
use tracing::{debug, info};

/// Link counters, cumulative since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub samples: u64,
    pub chips: u64,
    pub manchester_slips: u64,
    pub frames_accepted: u64,
    pub frames_rejected: u64,
}

pub struct OokReceiver {
    config: LinkConfig,
    decimator: Option<Stage<CicDecimator>>,
    agc: Option<Stage<FastAgc>>,
    demodulator: Stage<OokDemodulator>,
    sync: Stage<SymbolSync>,
    decoder: Stage<ManchesterDecoder>,
    deframer: Stage<Deframer>,
    unpacker: MessageUnpacker,
    samples: u64,
    chips: u64,
    // reused between calls
    baseband: Vec<Complex32>,
    levelled: Vec<Complex32>,
    soft: Vec<f32>,
    chip_buf: Vec<Bit>,
    bits: Vec<Bit>,
}

impl OokReceiver {
    pub fn new(config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let chunk = config.chunk_size;
        let decimator = match config.resample {
            Some(resample) => Some(Stage::new(
                CicDecimator::new(resample.factor, resample.stages)?,
                chunk,
            )),
            None => None,
        };
        let agc = match config.agc {
            Some(agc_config) => Some(Stage::new(FastAgc::new(agc_config)?, chunk)),
            None => None,
        };
        let demodulator = Stage::new(
            OokDemodulator::new(config.baud_rate, config.sample_rate)?,
            chunk,
        );
        let sync = Stage::new(SymbolSync::new(config.baud_rate, config.sample_rate)?, chunk);
        let decoder = Stage::new(ManchesterDecoder::new(config.invert), chunk);
        let deframer = Stage::new(Deframer::new(config.deframer), chunk);

        info!(
            "OokReceiver ready: {} baud, {} Hz (front end {} Hz), invert {}, AGC {}, latency {} samples",
            config.baud_rate,
            config.sample_rate,
            config.front_end_rate()?,
            config.invert,
            if agc.is_some() { "on" } else { "off" },
            demodulator.block().warmup_len()
        );

        Ok(Self {
            config,
            decimator,
            agc,
            demodulator,
            sync,
            decoder,
            deframer,
            unpacker: MessageUnpacker::new(),
            samples: 0,
            chips: 0,
            baseband: Vec::new(),
            levelled: Vec::new(),
            soft: Vec::new(),
            chip_buf: Vec::new(),
            bits: Vec::new(),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Demodulate samples into transport bytes (length-prefixed messages)
    pub fn receive(&mut self, samples: &[Complex32]) -> Vec<u8> {
        self.baseband.clear();
        self.levelled.clear();
        self.soft.clear();
        self.chip_buf.clear();
        self.bits.clear();

        let baseband = match self.decimator.as_mut() {
            Some(decimator) => {
                decimator.push_into(samples, &mut self.baseband);
                &self.baseband[..]
            }
            None => samples,
        };
        let levelled = match self.agc.as_mut() {
            Some(agc) => {
                agc.push_into(baseband, &mut self.levelled);
                &self.levelled[..]
            }
            None => baseband,
        };
        self.demodulator.push_into(levelled, &mut self.soft);
        self.sync.push_into(&self.soft, &mut self.chip_buf);
        self.decoder.push_into(&self.chip_buf, &mut self.bits);
        let bytes = self.deframer.push(&self.bits);

        self.samples += samples.len() as u64;
        self.chips += self.chip_buf.len() as u64;
        if !bytes.is_empty() {
            debug!("receive: {} samples -> {} bytes", samples.len(), bytes.len());
        }
        bytes
    }

    /// Demodulate samples, returning the messages completed so far
    pub fn receive_messages(&mut self, samples: &[Complex32]) -> Vec<Vec<u8>> {
        let bytes = self.receive(samples);
        self.unpacker.push(&bytes)
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            samples: self.samples,
            chips: self.chips,
            manchester_slips: self.decoder.block().slips(),
            frames_accepted: self.deframer.block().accepted(),
            frames_rejected: self.deframer.block().rejected(),
        }
    }

    pub fn reset(&mut self) {
        if let Some(decimator) = self.decimator.as_mut() {
            decimator.reset();
        }
        if let Some(agc) = self.agc.as_mut() {
            agc.reset();
        }
        self.demodulator.reset();
        self.sync.reset();
        self.decoder.reset();
        self.deframer.reset();
        self.unpacker = MessageUnpacker::new();
        self.samples = 0;
        self.chips = 0;
    }
}
