use super::checksum::Fletcher;
use crate::block::{Block, Rate, Work};
use crate::phy::bit::Bit;
use crate::utils::consts::{BITS_PER_BYTE, HEADER_SYNC_WORD, MAX_MESSAGE_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeframerConfig {
    /// While searching, emit a 0x00 byte for every eight set bits
    pub emit_idle_markers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeframerState {
    Searching,
    Length,
    Payload,
    Checksum0,
    Checksum1,
    /// Index into length byte + payload of the next byte to emit
    Draining(usize),
}

/// Bit-serial line in, length-prefixed messages out.
///
/// Header search is bit granular: every input bit shifts the correlation
/// register, so a frame can start at any bit offset and a rejected frame
/// gives the search back at the very next bit.
pub struct Deframer {
    config: DeframerConfig,
    state: DeframerState,
    register: u32,
    byte_acc: u8,
    bits_in_acc: usize,
    length: u8,
    payload: Vec<u8>,
    checksum: Fletcher,
    idle_count: u8,
    accepted: u64,
    rejected: u64,
}

impl Deframer {
    pub fn new(config: DeframerConfig) -> Self {
        info!(
            "Deframer initialized: idle markers {}",
            config.emit_idle_markers
        );

        Self {
            config,
            state: DeframerState::Searching,
            register: 0,
            byte_acc: 0,
            bits_in_acc: 0,
            length: 0,
            payload: Vec::with_capacity(MAX_MESSAGE_LEN),
            checksum: Fletcher::new(),
            idle_count: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Frames that passed both checksums
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Frames dropped on a checksum mismatch or zero length
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn is_searching(&self) -> bool {
        self.state == DeframerState::Searching
    }

    /// Shift one bit into the correlation register, returns true on lock
    fn correlate(&mut self, bit: Bit) -> bool {
        self.register >>= 1;
        if bit.is_set() {
            self.register |= 0x8000_0000;
        }
        if self.register == HEADER_SYNC_WORD {
            self.register = 0;
            self.byte_acc = 0;
            self.bits_in_acc = 0;
            debug!("frame header locked");
            return true;
        }
        false
    }

    /// Marker due for this set bit
    fn idle_marker(&mut self) -> bool {
        if self.idle_count == 0 {
            self.idle_count = (BITS_PER_BYTE - 1) as u8;
            true
        } else {
            self.idle_count -= 1;
            false
        }
    }

    /// LSB first byte assembly, returns the byte once eight bits are in
    fn accumulate(&mut self, bit: Bit) -> Option<u8> {
        self.byte_acc >>= 1;
        if bit.is_set() {
            self.byte_acc |= 0x80;
        }
        self.bits_in_acc += 1;
        if self.bits_in_acc < BITS_PER_BYTE {
            return None;
        }
        let byte = self.byte_acc;
        self.byte_acc = 0;
        self.bits_in_acc = 0;
        Some(byte)
    }

    fn accept_byte(&mut self, byte: u8) {
        match self.state {
            DeframerState::Length => {
                if byte == 0 {
                    self.reject("zero length");
                    return;
                }
                self.length = byte;
                self.payload.clear();
                self.checksum.reset();
                self.checksum.update(byte);
                self.state = DeframerState::Payload;
            }
            DeframerState::Payload => {
                self.payload.push(byte);
                self.checksum.update(byte);
                if self.payload.len() == self.length as usize {
                    self.state = DeframerState::Checksum0;
                }
            }
            DeframerState::Checksum0 => {
                if byte == self.checksum.check_bytes()[0] {
                    self.state = DeframerState::Checksum1;
                } else {
                    self.reject("first checksum mismatch");
                }
            }
            DeframerState::Checksum1 => {
                if byte == self.checksum.check_bytes()[1] {
                    self.accepted += 1;
                    debug!("frame of {} bytes received", self.length);
                    self.state = DeframerState::Draining(0);
                } else {
                    self.reject("second checksum mismatch");
                }
            }
            DeframerState::Searching | DeframerState::Draining(_) => {}
        }
    }

    fn reject(&mut self, reason: &str) {
        self.rejected += 1;
        debug!("frame dropped: {}", reason);
        self.state = DeframerState::Searching;
    }
}

impl Block for Deframer {
    type Input = Bit;
    type Output = u8;

    fn work(&mut self, input: &[Bit], output: &mut [u8]) -> Work {
        let mut in_i = 0;
        let mut out_i = 0;

        while out_i < output.len() {
            if let DeframerState::Draining(next) = self.state {
                output[out_i] = if next == 0 {
                    self.length
                } else {
                    self.payload[next - 1]
                };
                out_i += 1;
                self.state = if next < self.payload.len() {
                    DeframerState::Draining(next + 1)
                } else {
                    self.idle_count = 0;
                    DeframerState::Searching
                };
                continue;
            }

            let Some(&bit) = input.get(in_i) else {
                break;
            };
            in_i += 1;

            if self.state == DeframerState::Searching {
                if self.config.emit_idle_markers && bit.is_set() && self.idle_marker() {
                    output[out_i] = 0x00;
                    out_i += 1;
                }
                if self.correlate(bit) {
                    self.state = DeframerState::Length;
                }
            } else if let Some(byte) = self.accumulate(bit) {
                self.accept_byte(byte);
            }
        }

        Work::new(in_i, out_i)
    }

    fn forecast(&self, noutput: usize) -> usize {
        noutput * BITS_PER_BYTE
    }

    fn rate(&self) -> Rate {
        Rate::Variable
    }

    fn reset(&mut self) {
        self.state = DeframerState::Searching;
        self.register = 0;
        self.byte_acc = 0;
        self.bits_in_acc = 0;
        self.length = 0;
        self.payload.clear();
        self.checksum.reset();
        self.idle_count = 0;
        self.accepted = 0;
        self.rejected = 0;
    }
}
