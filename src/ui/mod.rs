pub mod progress;

pub use progress::{ProgressManager, templates};

pub fn print_banner() {
    println!("ooklink-rs");
}
