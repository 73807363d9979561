use anyhow::Context;
use clap::Parser;
use host::stats::Tally;
use inferb::{
    InferConfig, Inferrer, NativePlatform, Platform, SimulatedPlatform, DEFAULT_ITERATIONS,
    DEFAULT_RETRIES_IF_ZERO, DEFAULT_SPACING,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// # Infers the value of a byte in memory using cache timing analysis.
///
/// ## Example
/// `host --value 42 --spacing 16384 -i 20 -r 50`
///
#[derive(Parser)]
struct Options {
    /// The value to place in memory.
    #[arg(long = "value", default_value = "42")]
    value: u8,

    /// Place a random byte in memory on every trial. --value is ignored.
    #[arg(long = "random", default_value = "false")]
    random: bool,

    /// The seed of the random bytes, 0 by default
    #[arg(short = 's', long = "seed", default_value = "0")]
    seed: u64,

    /// How far apart the probe slots are, in bytes. Larger defeats the prefetcher
    /// better but runs slower.
    #[arg(long = "spacing", default_value_t = DEFAULT_SPACING)]
    spacing: usize,

    /// How many times every slot is probed per attempt.
    #[arg(short = 'i', long = "iterations", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Attempts spent before trusting a zero. 1 disables retrying.
    #[arg(short = 'r', long = "retries", default_value_t = DEFAULT_RETRIES_IF_ZERO)]
    retries: u32,

    /// Number of inferences to run and score.
    #[arg(short = 't', long = "trials", default_value = "1")]
    trials: usize,

    /// Pin the process to this core before measuring (Linux only).
    #[arg(long = "pin-core")]
    pin_core: Option<usize>,

    /// Measure a simulated cache instead of the hardware.
    #[arg(long = "simulate", default_value = "false")]
    simulate: bool,
}

fn main() -> anyhow::Result<()> {
    // Init logs
    env_logger::init();

    let opts = Options::parse();

    if let Some(core) = opts.pin_core {
        host::affinity::pin_to_core(core)
            .with_context(|| format!("Could not pin to core {}", core))?;
    }

    let config = InferConfig::default()
        .with_spacing(opts.spacing)
        .with_iterations(opts.iterations)
        .with_retries_if_zero(opts.retries);

    if opts.simulate {
        let inferrer = Inferrer::new(SimulatedPlatform::new(), config)
            .context("Invalid configuration")?;
        run(&inferrer, &opts)
    } else {
        let platform = NativePlatform::detect().context("Cache timing is unavailable")?;
        let inferrer = Inferrer::new(platform, config).context("Invalid configuration")?;
        run(&inferrer, &opts)
    }
}

fn run<P: Platform>(inferrer: &Inferrer<P>, opts: &Options) -> anyhow::Result<()> {
    let mut rnd = SmallRng::seed_from_u64(opts.seed);
    let mut tally = Tally::default();

    for trial in 0..opts.trials {
        let the_byte: u8 = if opts.random { rnd.gen() } else { opts.value };

        let inference = inferrer
            .infer(&the_byte)
            .with_context(|| format!("Trial {} failed", trial))?;
        tally.record(the_byte, inference.value);

        let result = if inference.value == the_byte {
            "✅"
        } else {
            "❌"
        };
        let secs = inference.elapsed_ns / (1000.0 * 1000.0 * 1000.0);
        println!(
            "{} Inferred value >>> {:3} <<< in {:03.04} seconds (spacing=0x{:x}, {} iterations, {} retries)",
            result,
            inference.value,
            secs,
            inferrer.config().spacing,
            inferrer.config().iterations,
            inferrer.config().retries_if_zero
        );
        log::debug!("trial {}: planted {}, {} attempt(s)", trial, the_byte, inference.attempts);
    }

    if tally.trials() > 1 {
        println!(
            "{}/{} correct ({:.1}%), BER {:.3}%",
            tally.correct(),
            tally.trials(),
            100.0 * tally.success_rate(),
            tally.ber()
        );
    }
    Ok(())
}
