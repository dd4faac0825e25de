/// Transmission layer: complete sender and receiver chains
pub mod config;
pub mod receiver;
pub mod sender;

pub use config::*;
pub use receiver::*;
pub use sender::*;
