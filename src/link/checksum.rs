// Fletcher-style frame checksum over {length, payload...}
// Two running sums, each reduced mod 255 only when the check bytes are taken.

use crate::utils::consts::CHECKSUM_MODULUS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fletcher {
    sum0: u32,
    sum1: u32,
}

impl Fletcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, byte: u8) {
        self.sum0 += byte as u32;
        self.sum1 += self.sum0;
    }

    /// Both check bytes, in transmission order
    pub fn check_bytes(&self) -> [u8; 2] {
        [
            (self.sum0 % CHECKSUM_MODULUS) as u8,
            (self.sum1 % CHECKSUM_MODULUS) as u8,
        ]
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Check bytes of a complete frame body (length byte first)
pub fn calculate_checksum(body: &[u8]) -> [u8; 2] {
    let mut fletcher = Fletcher::new();
    for &byte in body {
        fletcher.update(byte);
    }
    fletcher.check_bytes()
}

pub fn verify_checksum(body: &[u8], expected: [u8; 2]) -> bool {
    calculate_checksum(body) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_frames() {
        assert_eq!(calculate_checksum(&[4, 1, 2, 3, 4]), [0x0E, 0x28]);
        assert_eq!(
            calculate_checksum(&[8, 0x80, 0x91, 0xA2, 0xB3, 0xC4, 0xD5, 0xE6, 0xF7]),
            [0xE9, 0xF3]
        );
    }

    #[test]
    fn test_largest_frame_does_not_overflow() {
        let mut body = vec![0xFF];
        body.extend(1..=255u8);
        // 32895 % 255 and 2861440 % 255
        assert_eq!(calculate_checksum(&body), [0, 85]);
    }

    #[test]
    fn test_order_matters() {
        assert!(verify_checksum(&[2, 1, 2], calculate_checksum(&[2, 1, 2])));
        assert!(!verify_checksum(&[2, 2, 1], calculate_checksum(&[2, 1, 2])));
    }

    #[test]
    fn test_reset() {
        let mut fletcher = Fletcher::new();
        fletcher.update(9);
        fletcher.reset();
        assert_eq!(fletcher.check_bytes(), [0, 0]);
    }
}
