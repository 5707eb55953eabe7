//! Run the echo canceller core on a synthetic echo path and report ERLE.
//!
//! The far end is white noise at 16-bit scale; the near end is its echo
//! through a delayed, attenuated path, optionally with near-end talk added
//! halfway through. The residual can be written to a WAV file.
//!
//! ```sh
//! RUST_LOG=fdaec=debug cargo run -p fdaec --features examples --example simulate -- \
//!     --blocks 2000 --delay 150 --double-talk --output residual.wav
//! ```

use anyhow::{Context, Result, ensure};
use clap::Parser;
use hound::WavWriter;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fdaec::{AecConfig, AecCore, AnalysisSpectra, PART_LEN, SimdBackend, detect_backend};

#[derive(Parser, Debug)]
#[command(about = "Simulate the echo canceller core on a synthetic echo path")]
struct Args {
    /// Number of 64-sample blocks to process.
    #[arg(short, long, default_value_t = 1000)]
    blocks: usize,

    /// Stream sample rate in Hz.
    #[arg(long, default_value_t = 16_000)]
    sample_rate: u32,

    /// Filter length in partitions.
    #[arg(long)]
    partitions: Option<usize>,

    /// Use the extended filter.
    #[arg(long)]
    extended: bool,

    /// Echo delay in samples.
    #[arg(long, default_value_t = 100)]
    delay: usize,

    /// Echo path gain.
    #[arg(long, default_value_t = 0.5)]
    gain: f32,

    /// Add near-end talk during the second half.
    #[arg(long)]
    double_talk: bool,

    /// Force the scalar backend.
    #[arg(long)]
    scalar: bool,

    /// Write the linear residual to this WAV file.
    #[arg(short, long)]
    output: Option<String>,
}

/// Uniform noise from a linear congruential generator.
struct Noise(u32);

impl Noise {
    fn next(&mut self, amplitude: f32) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.0 >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    ensure!(args.blocks > 0, "--blocks must be positive");

    let mut config = AecConfig::for_sample_rate(args.sample_rate)
        .with_context(|| format!("sample rate {}", args.sample_rate))?;
    if args.extended {
        config = config.extended();
    }
    if let Some(partitions) = args.partitions {
        config.num_partitions = partitions;
    }
    let backend = if args.scalar {
        SimdBackend::Scalar
    } else {
        detect_backend()
    };
    let mut aec = AecCore::with_backend(config, backend).context("invalid configuration")?;
    info!(backend = backend.name(), ?config, "Starting simulation");

    let mut writer = match &args.output {
        Some(path) => {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: args.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            Some(WavWriter::create(path, spec).with_context(|| format!("creating {path}"))?)
        }
        None => None,
    };

    let mut far_noise = Noise(1);
    let mut near_noise = Noise(2);
    let mut far_signal = vec![0.0f32; args.delay];
    let mut error = [0.0f32; PART_LEN];
    let mut spectra = AnalysisSpectra::default();
    let (mut echo_energy, mut residual_energy) = (0.0f64, 0.0f64);
    let report_every = (args.blocks / 10).max(1);

    for block in 0..args.blocks {
        let start = far_signal.len();
        far_signal.extend((0..PART_LEN).map(|_| far_noise.next(4_000.0)));
        let far: [f32; PART_LEN] = std::array::from_fn(|i| far_signal[start + i]);

        let talking = args.double_talk && block >= args.blocks / 2;
        let near: [f32; PART_LEN] = std::array::from_fn(|i| {
            let talk = if talking { near_noise.next(2_000.0) } else { 0.0 };
            args.gain * far_signal[start + i - args.delay] + talk
        });

        aec.process_block(&far, &near, &mut error);
        let coherence = aec.subband_coherence(&mut spectra);
        let mut gain = coherence.cohde;
        aec.overdrive_and_suppress(&mut gain, 0.5, &mut spectra.error);

        echo_energy += near.iter().map(|&v| f64::from(v).powi(2)).sum::<f64>();
        residual_energy += error.iter().map(|&v| f64::from(v).powi(2)).sum::<f64>();

        if let Some(writer) = writer.as_mut() {
            for &sample in &error {
                writer.write_sample(sample / 32_768.0)?;
            }
        }

        if (block + 1) % report_every == 0 {
            let erle_db = 10.0 * (echo_energy / residual_energy.max(1e-12)).log10();
            let mean_cohde = coherence.cohde.iter().sum::<f32>() / coherence.cohde.len() as f32;
            info!(
                block = block + 1,
                erle_db,
                mean_cohde,
                delay_partition = aec.delay_partition(),
                diverged = aec.is_diverged(),
                "Progress"
            );
            echo_energy = 0.0;
            residual_energy = 0.0;
        }
    }

    if let Some(writer) = writer {
        writer.finalize().context("finalizing WAV output")?;
    }
    println!(
        "Processed {} blocks; estimated echo delay {} partitions ({} samples)",
        args.blocks,
        aec.delay_partition(),
        aec.delay_partition() * PART_LEN
    );
    Ok(())
}
