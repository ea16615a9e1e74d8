//! Synthetic-flight runner.
//!
//! Drives the full task set against mock sensors simulating a short
//! flight profile (takeoff roll, climb, slow-down toward stall) and prints
//! snapshot lines. Useful for eyeballing the fused outputs and the tone
//! advisor without hardware.

use anyhow::Result;
use clap::Parser;
use flight_software::config::{BackendKind, DeviceConfig};
use flight_software::scheduler::{Scheduler, TaskContext};
use flight_software::sensors::mock::{MockAnalog, MockFlaps, MockImu, MockOat, MockPressure};
use flight_software::sensors::{ImuSample, SensorSuite};
use flight_software::state::SharedState;
use flight_software::AttitudeEstimator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(about = "Run the fusion pipeline against a synthetic flight")]
struct Args {
    /// Seconds to run.
    #[arg(long, default_value_t = 10)]
    duration_s: u64,

    /// Attitude backend: madgwick or ekf6.
    #[arg(long, default_value = "ekf6")]
    backend: String,

    /// Print a snapshot line every this many milliseconds.
    #[arg(long, default_value_t = 500)]
    report_ms: u64,

    /// Verbose (debug-level) logging.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

/// Dynamic pressure in Pascals for a given IAS in knots.
fn pascals_for_ias(ias_kts: f32) -> f32 {
    let v = ias_kts / 1.94384;
    0.5 * 1.225 * v * v
}

/// Scripted airspeed profile: accelerate, cruise, then bleed speed toward
/// the on-speed band.
fn ias_profile(t_s: f32) -> f32 {
    match t_s {
        t if t < 3.0 => 30.0 * t,         // takeoff roll
        t if t < 6.0 => 90.0,             // climb-out
        t => (90.0 - (t - 6.0) * 6.0).max(45.0), // decelerating approach
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = DeviceConfig::with_default_flap();
    config.attitude.backend = match args.backend.as_str() {
        "madgwick" => BackendKind::Madgwick,
        _ => BackendKind::Ekf6,
    };
    config.validate()?;
    let config = Arc::new(config);

    info!(backend = ?config.attitude.backend, "building synthetic flight");

    // IMU: a gentle pitch-up during the climb segment, level otherwise.
    let imu = MockImu::from_fn(|n| {
        let t = n as f32 / 208.0;
        let theta = if (3.0..6.0).contains(&t) {
            ((t - 3.0) * 2.0).min(5.0f32).to_radians()
        } else {
            0.0
        };
        ImuSample {
            ax_g: theta.sin(),
            az_g: -theta.cos(),
            ..Default::default()
        }
    });

    // Pitot follows the airspeed profile; the 45-degree port rides at a
    // fixed fraction so Cp (and thus AOA) rises as speed bleeds off.
    let start = std::time::Instant::now();
    let pitot = MockPressureProfile::new(move || {
        let t = start.elapsed().as_secs_f32();
        pascals_for_ias(ias_profile(t))
    });
    let p45 = MockPressureProfile::new(move || {
        let t = start.elapsed().as_secs_f32();
        let pfwd = pascals_for_ias(ias_profile(t));
        // Higher fraction at low speed = higher Cp = higher AOA
        let frac = 0.75 - (ias_profile(t) / 200.0);
        pfwd * frac
    });

    let suite = SensorSuite {
        imu: Box::new(imu),
        pitot: Box::new(pitot),
        p45: Box::new(p45),
        p_static: Box::new(MockPressure::static_port(1013.25)),
        flaps: Box::new(MockFlaps::fixed(0, 0)),
        oat: Some(Box::new(MockOat::constant(15.0))),
        volume: Some(Box::new(MockAnalog::fixed(3000.0))),
    };

    let ctx = TaskContext {
        config: Arc::clone(&config),
        bus: Arc::new(Mutex::new(suite)),
        ahrs: Arc::new(Mutex::new(AttitudeEstimator::new(
            &config.attitude,
            &config.rates,
        ))),
        state: Arc::new(SharedState::new()),
    };
    let state = Arc::clone(&ctx.state);
    let audio = Arc::clone(&state.audio);

    let scheduler = Scheduler::start(ctx);

    let report_every = Duration::from_millis(args.report_ms.max(50));
    let end = std::time::Instant::now() + Duration::from_secs(args.duration_s);
    while std::time::Instant::now() < end {
        std::thread::sleep(report_every);
        let snap = state.snapshot();
        info!(
            t = format!("{:.1}s", start.elapsed().as_secs_f32()),
            ias = format!("{:.1}", snap.ias_kts),
            tas = format!("{:.1}", snap.tas_mps),
            aoa = format!("{:.2}", snap.aoa_deg),
            cp = format!("{:.3}", snap.cp),
            pitch = format!("{:.2}", snap.theta_deg),
            vsi = format!("{:.2}", snap.kalman_vsi_mps),
            tone = ?audio.tone(),
            pps = format!("{:.1}", audio.pulse_pps()),
            "snapshot"
        );
    }

    scheduler.stop();
    Ok(())
}

/// Pressure mock whose counts come from a closure (time-varying profiles).
struct MockPressureProfile {
    profile: Box<dyn FnMut() -> f32 + Send>,
}

impl MockPressureProfile {
    fn new(profile: impl FnMut() -> f32 + Send + 'static) -> Self {
        Self {
            profile: Box::new(profile),
        }
    }
}

impl flight_software::sensors::PressureSensor for MockPressureProfile {
    fn read_counts(&mut self) -> flight_software::errors::SensorResult<f32> {
        Ok((self.profile)())
    }

    fn counts_to_psi(&self, counts: f32) -> f32 {
        counts / 6894.76
    }

    fn read_millibars(&mut self) -> flight_software::errors::SensorResult<f32> {
        Ok(1013.25)
    }
}
