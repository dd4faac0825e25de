use clap::{Parser, Subcommand};
use num_complex::Complex32;
use ooklink_rs::transmission::{LinkConfig, OokReceiver, OokSender};
use ooklink_rs::ui::{ProgressManager, print_banner, templates};
use ooklink_rs::utils::channel::Channel;
use ooklink_rs::utils::consts::DEFAULT_FLUSH_BYTES;
use ooklink_rs::utils::logging::init_logging;
use ooklink_rs::utils::wav::{read_iq_wav, write_iq_wav};
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "OOK radio link codec chain", long_about = None)]
struct Cli {
    /// JSON link configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modulate messages into an I/Q WAV file
    Tx {
        #[arg(short, long, required = true)]
        message: Vec<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Demodulate an I/Q WAV capture and print the messages
    Rx {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Run the sender into the receiver through a simulated channel
    Loopback {
        #[arg(short, long, required = true)]
        message: Vec<String>,
        /// Noise standard deviation per I/Q component
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        #[arg(short, long, default_value_t = 1.0)]
        gain: f32,
        /// Samples handed to the receiver per call
        #[arg(long, default_value_t = 4096)]
        chunk: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the effective link configuration as JSON
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<LinkConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(LinkConfig::from_json_file(path)?),
        None => Ok(LinkConfig::default()),
    }
}

fn modulate(config: &LinkConfig, messages: &[String]) -> Result<Vec<Complex32>, Box<dyn Error>> {
    let front_end_rate = config.front_end_rate()?;
    let mut sender = OokSender::new(config.clone())?;
    let mut samples = sender.flush(2);
    for message in messages {
        samples.extend(sender.transmit_messages(&[message.as_bytes()])?);
    }
    samples.extend(sender.flush(DEFAULT_FLUSH_BYTES));
    info!(
        "Modulated {} messages into {} samples ({:.2} s)",
        messages.len(),
        samples.len(),
        samples.len() as f32 / front_end_rate as f32
    );
    Ok(samples)
}

fn print_messages(messages: &[Vec<u8>]) {
    for message in messages {
        println!("{}", String::from_utf8_lossy(message));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tx { message, output } => {
            print_banner();
            let samples = modulate(&config, &message)?;
            write_iq_wav(&samples, config.front_end_rate()?, &output)?;
            info!("Wrote {}", output.display());
        }
        Commands::Rx { input } => {
            print_banner();
            let (samples, sample_rate) = read_iq_wav(&input)?;
            let expected_rate = config.front_end_rate()?;
            if sample_rate != expected_rate {
                warn!(
                    "Capture is {} Hz but the link expects {} Hz",
                    sample_rate, expected_rate
                );
            }

            let mut receiver = OokReceiver::new(config.clone())?;
            let progress = ProgressManager::new();
            progress.create_bar("rx", samples.len() as u64, templates::RECEIVER, "receiver")?;

            let mut messages = Vec::new();
            for chunk in samples.chunks(config.chunk_size) {
                messages.extend(receiver.receive_messages(chunk));
                progress.inc("rx", chunk.len() as u64)?;
            }
            progress.finish_all();

            info!("Receiver stats: {:?}", receiver.stats());
            print_messages(&messages);
        }
        Commands::Loopback {
            message,
            noise,
            gain,
            chunk,
            seed,
        } => {
            print_banner();
            let samples = modulate(&config, &message)?;
            let received = Channel::new(gain, noise, seed)?.apply(&samples);

            let mut receiver = OokReceiver::new(config.clone())?;
            let progress = ProgressManager::new();
            progress.create_bar("loop", received.len() as u64, templates::LOOPBACK, "loopback")?;

            let mut messages = Vec::new();
            for block in received.chunks(chunk.max(1)) {
                let decoded = receiver.receive_messages(block);
                if !decoded.is_empty() {
                    progress.set_message("loop", &format!("{} messages", messages.len() + decoded.len()))?;
                }
                messages.extend(decoded);
                progress.inc("loop", block.len() as u64)?;
            }
            progress.finish_all();

            let stats = receiver.stats();
            info!("Receiver stats: {:?}", stats);
            let sent: Vec<Vec<u8>> = message.iter().map(|m| m.as_bytes().to_vec()).collect();
            if messages == sent {
                info!("Loopback OK: {} of {} messages", messages.len(), sent.len());
            } else {
                warn!(
                    "Loopback mismatch: sent {}, received {}",
                    sent.len(),
                    messages.len()
                );
            }
            print_messages(&messages);
        }
        Commands::Config => {
            println!("{}", config.to_json()?);
        }
    }

    Ok(())
}
