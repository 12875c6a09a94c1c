//! Telemetry Simulator
//!
//! Emits heart monitor firmware output on stdout: prediction reports in the
//! device's exact line format, interleaved with the boot banner and
//! low-signal warnings the real firmware prints.
//!
//! # Usage
//! ```bash
//! telemetry-sim --rate-hz 2 | vitals-monitor --stdin
//! telemetry-sim --count 600 --rate-hz 0 > session.log
//! ```

use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::Duration;

use vitals_monitor::types::StatusLabel;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "telemetry-sim")]
#[command(about = "Synthetic heart monitor telemetry for vitals-monitor testing")]
#[command(version)]
struct Args {
    /// Lines per second (0 = as fast as possible)
    #[arg(long, default_value = "1")]
    rate_hz: f64,

    /// Number of prediction reports to emit (0 = run forever)
    #[arg(long, default_value = "0")]
    count: u64,

    /// Fraction of lines that are diagnostic noise
    #[arg(long, default_value = "0.1")]
    noise_ratio: f64,

    /// Class mix to simulate
    #[arg(long, value_enum, default_value = "mixed")]
    scenario: Scenario,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Mostly normal with occasional events of every class
    Mixed,
    Normal,
    Stress,
    Motion,
    LowSpo2,
    Arrhythmia,
}

// ============================================================================
// Vital-sign ranges per class
// ============================================================================

struct ClassProfile {
    class_id: u32,
    hr: (f64, f64),
    spo2: (f64, f64),
    hrv: (f64, f64),
    accel: (f64, f64),
}

const PROFILES: [ClassProfile; 5] = [
    ClassProfile { class_id: 0, hr: (55.0, 95.0), spo2: (96.0, 99.9), hrv: (45.0, 120.0), accel: (0.90, 1.08) },
    ClassProfile { class_id: 1, hr: (100.0, 140.0), spo2: (95.0, 98.5), hrv: (15.0, 45.0), accel: (0.95, 1.20) },
    ClassProfile { class_id: 2, hr: (90.0, 160.0), spo2: (96.0, 99.5), hrv: (25.0, 75.0), accel: (1.80, 8.00) },
    ClassProfile { class_id: 3, hr: (85.0, 125.0), spo2: (80.0, 93.9), hrv: (30.0, 65.0), accel: (0.92, 1.15) },
    // Arrhythmia HR is bimodal; the low branch is chosen at sample time
    ClassProfile { class_id: 4, hr: (145.0, 190.0), spo2: (94.0, 99.0), hrv: (5.0, 22.0), accel: (0.85, 1.15) },
];

const BRADY_HR: (f64, f64) = (30.0, 50.0);

/// Mixed scenario weights for classes 0..=4
const MIXED_WEIGHTS: [u32; 5] = [70, 10, 10, 5, 5];

impl Scenario {
    fn pick_class(&self, rng: &mut StdRng) -> usize {
        match self {
            Scenario::Mixed => {
                let total: u32 = MIXED_WEIGHTS.iter().sum();
                let mut roll = rng.gen_range(0..total);
                for (i, w) in MIXED_WEIGHTS.iter().enumerate() {
                    if roll < *w {
                        return i;
                    }
                    roll -= w;
                }
                0
            }
            Scenario::Normal => 0,
            Scenario::Stress => 1,
            Scenario::Motion => 2,
            Scenario::LowSpo2 => 3,
            Scenario::Arrhythmia => 4,
        }
    }
}

fn sample(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    rng.gen_range(lo..=hi)
}

/// One prediction report in the firmware's format
fn prediction_line(rng: &mut StdRng, profile: &ClassProfile, jitter: &Normal<f64>) -> String {
    let hr_range = if profile.class_id == 4 && rng.gen_bool(0.3) {
        BRADY_HR
    } else {
        profile.hr
    };
    let hr = (sample(rng, hr_range) + jitter.sample(rng)).round().max(0.0) as u32;
    let spo2 = sample(rng, profile.spo2);
    let hrv = sample(rng, profile.hrv);
    let accel = sample(rng, profile.accel);

    format!(
        "| ML PREDICTION: Class {} ({}) | Inputs: HR={}, SpO2={:.1}, HRV={:.1}, Acc={:.2} |",
        profile.class_id,
        StatusLabel::firmware_text(profile.class_id),
        hr,
        spo2,
        hrv,
        accel
    )
}

fn noise_line(rng: &mut StdRng) -> String {
    if rng.gen_bool(0.7) {
        format!(
            "| WARNING: Low signal quality (Corr: {:.2}). Temp:{:.2}.",
            rng.gen_range(0.10..0.60),
            rng.gen_range(30.0..34.0)
        )
    } else {
        format!("MAX30102 FIFO overflow, {} samples dropped", rng.gen_range(1..8))
    }
}

const BOOT_BANNER: &[&str] = &[
    "ets Jun  8 2016 00:22:57",
    "rst:0x1 (POWERON_RESET),boot:0x13 (SPI_FAST_FLASH_BOOT)",
    "MAX30102 initialized",
    "MPU6050 initialized",
    "Model loaded: RandomForest (5 classes)",
];

fn emit(out: &mut impl Write, line: &str) -> io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}

fn run(args: &Args) -> io::Result<()> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let jitter = Normal::new(0.0, 2.0).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let noise_ratio = args.noise_ratio.clamp(0.0, 1.0);
    let delay = (args.rate_hz > 0.0).then(|| Duration::from_secs_f64(1.0 / args.rate_hz));

    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in BOOT_BANNER {
        emit(&mut out, line)?;
    }

    let mut emitted = 0u64;
    while args.count == 0 || emitted < args.count {
        if rng.gen_bool(noise_ratio) {
            emit(&mut out, &noise_line(&mut rng))?;
        } else {
            let profile = &PROFILES[args.scenario.pick_class(&mut rng)];
            // The firmware prints a blank line before each report
            emit(&mut out, "")?;
            emit(&mut out, &prediction_line(&mut rng, profile, &jitter))?;
            emitted += 1;
        }
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => {}
        // Reader went away (e.g. `| head`)
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => {
            eprintln!("telemetry-sim: {e}");
            std::process::exit(1);
        }
    }
}
