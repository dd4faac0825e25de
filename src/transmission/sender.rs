/// OOK sender: Framer -> Manchester encoder -> OOK modulator [-> CIC
/// interpolator]
use super::config::LinkConfig;
use crate::block::Stage;
use crate::error::{Result, TransportError};
use crate::link::Framer;
use crate::phy::{CicInterpolator, LineBit, ManchesterEncoder, OokModulator};
use crate::transport::pack_messages;
use num_complex::Complex32;
use tracing::{debug, info};

pub struct OokSender {
    config: LinkConfig,
    framer: Stage<Framer>,
    encoder: Stage<ManchesterEncoder>,
    modulator: Stage<OokModulator>,
    interpolator: Option<Stage<CicInterpolator>>,
    // reused between calls
    line: Vec<LineBit>,
    chips: Vec<LineBit>,
}

impl OokSender {
    pub fn new(config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let chunk = config.chunk_size;
        let framer = Stage::new(Framer::new(config.framer), chunk);
        let encoder = Stage::new(ManchesterEncoder::new(config.invert), chunk);
        let modulator = Stage::new(OokModulator::new(config.baud_rate, config.sample_rate)?, chunk);
        let interpolator = match config.resample {
            Some(resample) => Some(Stage::new(
                CicInterpolator::new(resample.factor, resample.stages)?,
                chunk,
            )),
            None => None,
        };

        info!(
            "OokSender ready: {} baud, {} Hz, invert {}, front end {} Hz",
            config.baud_rate,
            config.sample_rate,
            config.invert,
            config.front_end_rate()?
        );

        Ok(Self {
            config,
            framer,
            encoder,
            modulator,
            interpolator,
            line: Vec::new(),
            chips: Vec::new(),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Modulate transport bytes (length-prefixed messages, 0x00 for idle)
    pub fn transmit(&mut self, bytes: &[u8]) -> Vec<Complex32> {
        self.line.clear();
        self.chips.clear();
        self.framer.push_into(bytes, &mut self.line);
        self.encoder.push_into(&self.line, &mut self.chips);

        let mut samples = self.modulator.push(&self.chips);
        if let Some(interpolator) = self.interpolator.as_mut() {
            samples = interpolator.push(&samples);
        }
        debug!(
            "transmit: {} bytes -> {} line bits -> {} samples",
            bytes.len(),
            self.line.len(),
            samples.len()
        );
        samples
    }

    pub fn transmit_messages<M: AsRef<[u8]>>(
        &mut self,
        messages: &[M],
    ) -> std::result::Result<Vec<Complex32>, TransportError> {
        let bytes = pack_messages(messages)?;
        Ok(self.transmit(&bytes))
    }

    /// Push `idle_bytes` idle filler bytes onto the line so everything
    /// queued so far leaves the modulator
    pub fn flush(&mut self, idle_bytes: usize) -> Vec<Complex32> {
        let zeros = idle_bytes * self.config.framer.idle_decimation.max(1) as usize;
        self.transmit(&vec![0u8; zeros])
    }

    /// Frames started since construction
    pub fn frames(&self) -> u64 {
        self.framer.block().frames()
    }

    pub fn reset(&mut self) {
        self.framer.reset();
        self.encoder.reset();
        self.modulator.reset();
        if let Some(interpolator) = self.interpolator.as_mut() {
            interpolator.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transmission::ResampleConfig;

    fn small_config() -> LinkConfig {
        LinkConfig {
            baud_rate: 2,
            sample_rate: 8,
            ..LinkConfig::default()
        }
    }

    #[test]
    fn test_idle_is_carrier_off() {
        let mut sender = OokSender::new(small_config()).unwrap();
        let samples = sender.transmit(&[0; 4]);
        // 4 idle bytes = 64 chips at 4 samples per chip, minus the chip
        // still waiting in the modulator
        assert_eq!(samples.len(), 63 * 4 + 1);
        assert!(samples.iter().all(|s| s.re == 0.0 && s.im == 0.0));
    }

    #[test]
    fn test_frame_energy_and_length() {
        let mut sender = OokSender::new(small_config()).unwrap();
        let mut samples = sender.transmit_messages(&[b"hi"]).unwrap();
        samples.extend(sender.flush(1));
        assert_eq!(sender.frames(), 1);

        // header + length + 2 payload + 2 checksums + trailer + flush
        let chips = (10 + 1 + 2 + 2 + 1 + 1) * 16;
        assert_eq!(samples.len(), (chips - 1) * 4 + 1);

        // Manchester keeps the carrier on for half of every data chip pair
        let on = samples.iter().filter(|s| s.re == 1.0).count();
        assert!(on > 0);
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(&s.re)));
    }

    #[test]
    fn test_smallest_chunk_still_drains() {
        let small = LinkConfig {
            chunk_size: 8,
            ..small_config()
        };
        let mut sender = OokSender::new(small).unwrap();
        let mut samples = sender.transmit_messages(&[b"hello"]).unwrap();
        samples.extend(sender.flush(4));

        let mut reference = OokSender::new(small_config()).unwrap();
        let mut expected = reference.transmit_messages(&[b"hello"]).unwrap();
        expected.extend(reference.flush(4));
        assert!(!samples.is_empty());
        assert_eq!(samples, expected);

        assert!(OokSender::new(LinkConfig {
            chunk_size: 4,
            ..small_config()
        })
        .is_err());
    }

    #[test]
    fn test_interpolated_front_end() {
        let resampled = LinkConfig {
            resample: Some(ResampleConfig {
                factor: 4,
                stages: 1,
            }),
            ..small_config()
        };
        let mut sender = OokSender::new(resampled).unwrap();
        let mut plain = OokSender::new(small_config()).unwrap();

        let bytes = [2, 7, 9, 0, 0];
        let high = sender.transmit(&bytes);
        let low = plain.transmit(&bytes);
        assert_eq!(high.len(), low.len() * 4);
        // a single stage CIC holds each baseband sample
        for (group, &sample) in high.chunks(4).zip(&low) {
            for s in group {
                assert!((s.re - sample.re).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_rejects_bad_messages() {
        let mut sender = OokSender::new(small_config()).unwrap();
        assert_eq!(
            sender.transmit_messages(&[&[0u8; 256][..]]),
            Err(TransportError::TooLong(256))
        );
        assert!(OokSender::new(LinkConfig {
            sample_rate: 2,
            ..small_config()
        })
        .is_err());
    }
}
