use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::HarnessConfig;
use workflow::runner::Runner;
use zmptcore::telemetry::{CaptureObserver, CaptureTrace};

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "ZMPT101B sensor harness on a simulated ADC")]
struct Args {
    /// Load a harness config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    channel: u8,
    /// RMS of the simulated mains waveform
    #[arg(long, default_value_t = 230.0)]
    mains_volts: f64,
    #[arg(long, default_value_t = 3.0)]
    noise_mv: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long)]
    read_interval_ms: Option<u64>,
    #[arg(long)]
    init_retry_ms: Option<u64>,
    /// Stop after this many readings instead of running until Ctrl+C
    #[arg(long)]
    iterations: Option<usize>,
    /// Take a single reading without waiting between reads
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Write the last capture in the sample dump format
    #[arg(long)]
    dump: Option<PathBuf>,
    /// Print every reading as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = args.config.as_ref() {
        HarnessConfig::load(path)?
    } else {
        HarnessConfig::from_args(args.channel, args.mains_volts, args.noise_mv, args.seed)
    };
    if let Some(interval) = args.read_interval_ms {
        config.read_interval_ms = interval;
    }
    if let Some(interval) = args.init_retry_ms {
        config.init_retry_interval_ms = interval;
    }
    if args.iterations.is_some() {
        config.iterations = args.iterations;
    }
    if args.offline {
        config.iterations = Some(1);
        config.read_interval_ms = 0;
    }

    let runner = Runner::new(config);
    let trace = Arc::new(Mutex::new(CaptureTrace::new()));
    let observer = args
        .dump
        .as_ref()
        .map(|_| Box::new(trace.clone()) as Box<dyn CaptureObserver + Send>);
    let mut sensor = runner.build_sensor(observer);

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for harness loop")?;
    let json = args.json;
    let summary = runtime.block_on(async {
        tokio::select! {
            result = runner.run(&mut sensor, |reading| {
                if json {
                    match serde_json::to_string(reading) {
                        Ok(line) => println!("{}", line),
                        Err(err) => log::warn!("serializing reading: {}", err),
                    }
                }
            }) => result.map(Some),
            interrupted = signal::ctrl_c() => interrupted
                .context("awaiting Ctrl+C to exit")
                .map(|()| None),
        }
    })?;

    if let Some(summary) = summary.as_ref() {
        println!(
            "Harness run -> init attempts {}, readings {}",
            summary.init_attempts,
            summary.readings.len()
        );
    }
    let metrics = sensor.metrics();
    let last = metrics
        .last_rms
        .map(|rms| format!("{}V", rms))
        .unwrap_or_else(|| "none".into());
    println!(
        "Sensor metrics -> readings {}, errors {}, last {}",
        metrics.readings, metrics.errors, last
    );

    if let Some(path) = args.dump {
        let guard = trace
            .lock()
            .map_err(|_| anyhow::anyhow!("capture trace lock poisoned"))?;
        if let Some(dump) = guard.last() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, dump)
                .with_context(|| format!("writing capture dump {}", path.display()))?;
        }
    }

    Ok(())
}
