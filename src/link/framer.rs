use super::checksum::Fletcher;
use crate::block::{Block, Rate, Work};
use crate::phy::bit::{LineBit, byte_to_line_bits};
use crate::utils::consts::{BITS_PER_BYTE, FRAME_HEADER, FRAME_TERMINATOR, HEADER_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Emit one idle filler byte per this many consecutive 0x00 inputs
    pub idle_decimation: u8,
    /// Append a 0xFF data byte after the checksums
    pub end_of_frame_marker: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            idle_decimation: 1,
            end_of_frame_marker: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    Idle,
    Header(usize),
    Length,
    Payload { remaining: u8 },
    Checksum0,
    Checksum1,
    Terminator,
    Trailer,
}

/// Length-prefixed bytes in, bit-serial frames out.
///
/// A 0x00 byte between messages is idle; any other value is the length of
/// the message that follows. Each transport byte becomes eight line bits,
/// LSB first, and idle becomes eight `LineBit::Idle`.
pub struct Framer {
    config: FramerConfig,
    state: FramerState,
    length: u8,
    checksum: Fletcher,
    idle_count: u8,
    frames: u64,
}

impl Framer {
    pub fn new(config: FramerConfig) -> Self {
        let config = FramerConfig {
            idle_decimation: config.idle_decimation.max(1),
            ..config
        };
        info!(
            "Framer initialized: idle decimation {}, end of frame marker {}",
            config.idle_decimation, config.end_of_frame_marker
        );

        Self {
            config,
            state: FramerState::Idle,
            length: 0,
            checksum: Fletcher::new(),
            idle_count: 0,
            frames: 0,
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Frames started since construction
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Between frames, waiting for a length byte
    pub fn is_idle(&self) -> bool {
        self.state == FramerState::Idle
    }

    fn start_frame(&mut self, length: u8) {
        self.idle_count = 0;
        self.length = length;
        self.checksum.reset();
        self.checksum.update(length);
        self.frames += 1;
        self.state = FramerState::Header(0);
        debug!("framing message of {} bytes", length);
    }
}

fn put_byte(output: &mut [LineBit], byte: u8) {
    output.copy_from_slice(&byte_to_line_bits(byte));
}

fn put_idle(output: &mut [LineBit]) {
    output.fill(LineBit::Idle);
}

impl Block for Framer {
    type Input = u8;
    type Output = LineBit;

    fn work(&mut self, input: &[u8], output: &mut [LineBit]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;

        while out_i + BITS_PER_BYTE <= output.len() {
            let slot = &mut output[out_i..out_i + BITS_PER_BYTE];
            match self.state {
                FramerState::Idle => {
                    let Some(&byte) = input.get(in_i) else {
                        break;
                    };
                    in_i += 1;
                    if byte != 0 {
                        self.start_frame(byte);
                    } else if self.idle_count == 0 {
                        put_idle(slot);
                        out_i += BITS_PER_BYTE;
                        self.idle_count = self.config.idle_decimation - 1;
                    } else {
                        self.idle_count -= 1;
                    }
                    continue;
                }
                FramerState::Header(i) => {
                    put_byte(slot, FRAME_HEADER[i]);
                    self.state = if i + 1 < HEADER_LEN {
                        FramerState::Header(i + 1)
                    } else {
                        FramerState::Length
                    };
                }
                FramerState::Length => {
                    put_byte(slot, self.length);
                    self.state = FramerState::Payload {
                        remaining: self.length,
                    };
                }
                FramerState::Payload { remaining } => {
                    let Some(&byte) = input.get(in_i) else {
                        break;
                    };
                    in_i += 1;
                    put_byte(slot, byte);
                    self.checksum.update(byte);
                    self.state = if remaining > 1 {
                        FramerState::Payload {
                            remaining: remaining - 1,
                        }
                    } else {
                        FramerState::Checksum0
                    };
                }
                FramerState::Checksum0 => {
                    put_byte(slot, self.checksum.check_bytes()[0]);
                    self.state = FramerState::Checksum1;
                }
                FramerState::Checksum1 => {
                    put_byte(slot, self.checksum.check_bytes()[1]);
                    self.state = if self.config.end_of_frame_marker {
                        FramerState::Terminator
                    } else {
                        FramerState::Trailer
                    };
                }
                FramerState::Terminator => {
                    put_byte(slot, FRAME_TERMINATOR);
                    self.state = FramerState::Trailer;
                }
                FramerState::Trailer => {
                    put_idle(slot);
                    self.state = FramerState::Idle;
                }
            }
            out_i += BITS_PER_BYTE;
        }

        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput / BITS_PER_BYTE
    }

    fn rate(&self) -> Rate {
        Rate::Interpolate(BITS_PER_BYTE)
    }

    fn reset(&mut self) {
        self.state = FramerState::Idle;
        self.length = 0;
        self.checksum.reset();
        self.idle_count = 0;
        self.frames = 0;
    }
}
