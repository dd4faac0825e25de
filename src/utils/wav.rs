use num_complex::Complex32;
use std::io;
use std::path::Path;

fn wav_error(err: hound::Error) -> io::Error {
    io::Error::other(format!("{err}"))
}

/// Write baseband as a 2-channel (I, Q) 32-bit float WAV
pub fn write_iq_wav(samples: &[Complex32], sample_rate: u32, filename: &Path) -> io::Result<()> {
    if let Some(parent) = filename.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(filename, spec).map_err(wav_error)?;
    for sample in samples {
        writer.write_sample(sample.re).map_err(wav_error)?;
        writer.write_sample(sample.im).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

/// Read a capture as complex baseband. Mono files are taken as I only,
/// integer formats are scaled to [-1, 1).
pub fn read_iq_wav(filename: &Path) -> io::Result<(Vec<Complex32>, u32)> {
    let reader = hound::WavReader::open(filename).map_err(wav_error)?;
    let spec = reader.spec();

    let values: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let amplitude = (1i64 << spec.bits_per_sample.saturating_sub(1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / amplitude))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(wav_error)?
        }
    };

    let samples = match spec.channels {
        1 => values.iter().map(|&re| Complex32::new(re, 0.0)).collect(),
        2 => values
            .chunks_exact(2)
            .map(|iq| Complex32::new(iq[0], iq[1]))
            .collect(),
        n => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected 1 or 2 channels, found {n}"),
            ));
        }
    };
    Ok((samples, spec.sample_rate))
}
