//! # uke-tuner - Console Ukulele Tuner
//!
//! Listens on the default microphone and shows, string by string, how far
//! the played note is from its target.
//!
//! ## Architecture
//! - **Capture**: CPAL callback slicing the input into fixed frames
//! - **Session**: single thread blocking on frames, estimating and smoothing
//! - **Display**: one meter line on stdout, logs on stderr

mod ui;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::info;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use uke_core::audio::{self, CpalFrameSource};
use uke_core::{ResetPolicy, SessionSummary, TunerConfig, Tuning, TuningSession, input};
use ui::banner::{terminal_width, write_banner};
use ui::meter::TerminalMeter;

/// Tune a ukulele (or anything else with a tuning table) from the console
#[derive(Parser, Debug)]
#[command(name = "uke-tuner", version, long_about = None)]
struct Args {
    /// Built-in tuning to use (see --list-tunings)
    #[arg(short, long, default_value = "standard")]
    tuning: String,

    /// JSON file with a custom tuning, overrides --tuning
    #[arg(long)]
    tuning_file: Option<PathBuf>,

    /// Print the built-in tunings and exit
    #[arg(long)]
    list_tunings: bool,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Samples per analysis frame
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Capture rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Number of estimates averaged for the display
    #[arg(long)]
    sample_size: Option<usize>,

    /// Percent jump of the average treated as noise
    #[arg(long)]
    threshold: Option<f64>,

    /// When the smoothing window starts over
    #[arg(long, value_enum)]
    reset_policy: Option<ResetArg>,

    /// Give up opening the microphone after this many attempts (default: never)
    #[arg(long)]
    max_open_attempts: Option<u32>,

    /// Seconds per string when stdin is not a terminal
    #[arg(long)]
    auto_advance: Option<f64>,

    /// Meter width in columns (default: terminal width, else $COLUMNS, else 80)
    #[arg(short, long)]
    width: Option<usize>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResetArg {
    /// Start every string from an empty window
    PerString,
    /// Keep the window across strings
    PerSession,
}

impl From<ResetArg> for ResetPolicy {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::PerString => ResetPolicy::PerString,
            ResetArg::PerSession => ResetPolicy::PerSession,
        }
    }
}

impl Args {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn tuning(&self) -> Result<Tuning> {
        if let Some(path) = &self.tuning_file {
            return Tuning::load(path).with_context(|| format!("loading tuning from {}", path.display()));
        }
        match Tuning::preset(&self.tuning) {
            Some(tuning) => Ok(tuning),
            None => bail!("unknown tuning '{}', try --list-tunings", self.tuning),
        }
    }

    fn config(&self) -> Result<TunerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                TunerConfig::load(path).with_context(|| format!("loading config from {}", path.display()))?
            }
            None => TunerConfig::default(),
        };

        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(threshold) = self.threshold {
            config.threshold_pct = threshold;
        }
        if let Some(policy) = self.reset_policy {
            config.reset_policy = policy.into();
        }
        if let Some(attempts) = self.max_open_attempts {
            config.retry.max_attempts = Some(attempts);
        }
        if let Some(secs) = self.auto_advance {
            config.auto_advance_secs = secs;
        }

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; keep them quiet by default so the meter stays on one line.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .format_timestamp_millis()
        .init();

    if args.list_tunings {
        print_tunings();
        return Ok(());
    }

    let tuning = args.tuning()?;
    let config = args.config()?;
    let width = terminal_width(args.width);
    info!("[MAIN] Tuning '{}' with {:?}", tuning.name, config);
    info!("[MAIN] One frame every {:?}", config.frame_duration());

    let advance_hint = if io::stdin().is_terminal() {
        "Press <Enter> to move on to the next string".to_string()
    } else {
        format!("Moving on to the next string every {} s", config.auto_advance_secs)
    };
    let title = format!("Ukulele Tuner v{}", env!("CARGO_PKG_VERSION"));
    let tuning_line = format!("Tuning: {}", tuning.name);
    write_banner(
        &mut io::stdout(),
        width,
        &[
            title.as_str(),
            tuning_line.as_str(),
            "",
            "You have to get the # to align with the |",
            advance_hint.as_str(),
        ],
    )?;

    info!("[MAIN] Opening audio input...");
    let source = audio::open_with_retry(
        || CpalFrameSource::open(config.chunk_size, config.sample_rate, config.read_timeout()),
        config.chunk_size,
        &config.retry,
    )
    .context("opening audio input")?;

    let advance = input::detect(config.auto_advance());
    let mut meter = TerminalMeter::new(io::stdout(), width, config.in_tune_tolerance);

    // The session owns the source; it is dropped (and the stream stopped) when run returns.
    let summary = TuningSession::new(&config, tuning, source, advance, &mut meter)?
        .run()
        .context("tuning session stopped")?;
    meter.take_error().context("writing to the terminal")?;

    print_summary(&summary);
    Ok(())
}

fn print_tunings() {
    for tuning in Tuning::presets() {
        let notes: Vec<String> = tuning
            .targets
            .iter()
            .map(|t| format!("{} {:.0} Hz", t.name, t.frequency))
            .collect();
        println!("{:<10} {}", tuning.name, notes.join(", "));
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    for result in &summary.strings {
        let target = &result.target;
        match result.last_average {
            Some(average) => println!(
                "{} (String {}): {:.1} Hz, target {:.0} Hz",
                target.name, target.label, average, target.frequency
            ),
            None => println!("{} (String {}): no stable reading", target.name, target.label),
        }
    }
    info!(
        "[MAIN] {} frames, {} shown, {} held",
        summary.frames, summary.accepted, summary.held
    );
}
