pub mod channel;
pub mod consts;
pub mod logging;
pub mod wav;
