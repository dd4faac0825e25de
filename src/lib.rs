pub mod block;
pub mod error;
pub mod link;
pub mod phy;
pub mod transmission;
pub mod transport;
pub mod ui;
pub mod utils;
