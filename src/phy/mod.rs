// Physical layer: line coding, OOK baseband and timing recovery

pub mod agc;
pub mod bit;
pub mod cic;
pub mod manchester;
pub mod ook;
pub mod symbol_sync;

pub use agc::{AgcConfig, FastAgc};
pub use bit::{Bit, LineBit};
pub use cic::{CicDecimator, CicInterpolator};
pub use manchester::{ManchesterDecoder, ManchesterEncoder};
pub use ook::{OokDemodulator, OokModulator};
pub use symbol_sync::SymbolSync;
