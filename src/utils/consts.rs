/// Log level used when RUST_LOG is not set
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// Wire format
// ============================================================================

/// Correlation header sent in front of every frame
pub const FRAME_HEADER: [u8; 10] =
    [0xA5, 0xF0, 0xA5, 0xF0, 0xA5, 0xF0, 0x7E, 0x81, 0xC3, 0x3C];

pub const HEADER_LEN: usize = FRAME_HEADER.len();

/// Last four header bytes as they appear in the deframer's shift register
/// (first received bit in bit 0)
pub const HEADER_SYNC_WORD: u32 = 0x3CC3_817E;

/// Line value for "no symbol"
pub const IDLE_BYTE: u8 = 0xFF;

/// Data byte optionally appended after the checksums
pub const FRAME_TERMINATOR: u8 = 0xFF;

pub const CHECKSUM_MODULUS: u32 = 255;

/// Largest payload a single length byte can announce
pub const MAX_MESSAGE_LEN: usize = 255;

/// Bits per transport byte on the bit-serial line
pub const BITS_PER_BYTE: usize = 8;

// ============================================================================
// Physical layer defaults
// ============================================================================

/// Line chip rate (Manchester chips per second)
pub const DEFAULT_BAUD_RATE: u32 = 1200;

/// Baseband sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Work buffer size used when driving stages in-process
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Idle transport bytes pushed after the last message so the modulator
/// and demodulator pipelines drain
pub const DEFAULT_FLUSH_BYTES: usize = 64;

/// Idle decimation of legacy transmitters
pub const LEGACY_IDLE_DECIMATION: u8 = 10;

// --- AGC ---
/// 'Alpha * Max + Beta * Min' magnitude estimator coefficients
pub const AGC_ESTIMATOR_ALPHA: f32 = 0.947_543_636_291;
pub const AGC_ESTIMATOR_BETA: f32 = 0.392_485_425_092;

// --- CIC ---
/// Fractional bits of the CIC fixed point format
pub const CIC_FRACTION_BITS: u32 = 32;
