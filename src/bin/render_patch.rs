//! Offline patch bounce: load a patch file, render it for a fixed duration,
//! and write the result to a stereo WAV file.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use patchcord::engine::{Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "render_patch", about = "Render a patch file to a WAV file")]
struct Args {
    /// Patch file to load
    patch: PathBuf,

    /// Output WAV file
    #[arg(short, long, default_value = "out.wav")]
    output: PathBuf,

    /// Seconds of audio to render
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f32,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 44100.0)]
    sample_rate: f32,

    /// Render quantum in samples
    #[arg(long, default_value_t = 512)]
    block_size: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let engine = Engine::new(EngineConfig {
        sample_rate: args.sample_rate,
        block_size: args.block_size,
    });
    engine.load_patch(&args.patch)?;
    info!(patch = %args.patch.display(), "patch loaded");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: args.sample_rate as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)?;

    let total_frames = (args.seconds * args.sample_rate) as usize;
    let mut buffer = vec![0.0f32; 2 * args.block_size];
    let mut written = 0usize;
    while written < total_frames {
        engine.render(&mut buffer);
        let frames = (total_frames - written).min(args.block_size);
        for sample in &buffer[..2 * frames] {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        written += frames;
    }
    writer.finalize()?;
    info!(
        output = %args.output.display(),
        frames = total_frames,
        "render complete"
    );
    Ok(())
}
