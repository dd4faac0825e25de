/// Link layer: framing of length-prefixed messages on the bit-serial line
pub mod checksum;
pub mod deframer;
pub mod framer;

pub use checksum::{Fletcher, calculate_checksum, verify_checksum};
pub use deframer::{Deframer, DeframerConfig};
pub use framer::{Framer, FramerConfig};
