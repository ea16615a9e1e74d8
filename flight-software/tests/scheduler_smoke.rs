//! Threaded scheduler smoke tests: start the three tasks against mock
//! sensors, let them run briefly, and check that a consistent snapshot and
//! tone command come out the other side.

use flight_software::config::DeviceConfig;
use flight_software::scheduler::{Scheduler, TaskContext};
use flight_software::sensors::mock::{
    level_suite, MockAnalog, MockFlaps, MockImu, MockOat, MockPressure,
};
use flight_software::sensors::SensorSuite;
use flight_software::state::SharedState;
use flight_software::AttitudeEstimator;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn context(suite: SensorSuite, config: DeviceConfig) -> TaskContext {
    let config = Arc::new(config);
    TaskContext {
        ahrs: Arc::new(Mutex::new(AttitudeEstimator::new(
            &config.attitude,
            &config.rates,
        ))),
        config,
        bus: Arc::new(Mutex::new(suite)),
        state: Arc::new(SharedState::new()),
    }
}

#[test]
fn test_start_run_stop() {
    let suite = level_suite();
    let ctx = context(suite, DeviceConfig::with_default_flap());
    let state = Arc::clone(&ctx.state);

    let scheduler = Scheduler::start(ctx);
    std::thread::sleep(Duration::from_millis(300));
    scheduler.stop();

    let snap = state.snapshot();
    // Standard-day static port: pressure altitude near zero
    assert!(snap.palt_ft.abs() < 50.0, "palt {}", snap.palt_ft);
    assert!(snap.theta_deg.is_finite());
    assert!(snap.phi_deg.is_finite());
    assert_eq!(snap.ias_kts, 0.0);
    assert_eq!(snap.flap_index, 0);
    assert_eq!(snap.oat_c, Some(15.0));
}

#[test]
fn test_imu_task_runs_near_configured_rate() {
    let imu = MockImu::level();
    let counter = imu.read_counter();
    let suite = SensorSuite {
        imu: Box::new(imu),
        pitot: Box::new(MockPressure::from_pascals(0.0)),
        p45: Box::new(MockPressure::from_pascals(0.0)),
        p_static: Box::new(MockPressure::static_port(1013.25)),
        flaps: Box::new(MockFlaps::fixed(0, 0)),
        oat: Some(Box::new(MockOat::constant(15.0))),
        volume: Some(Box::new(MockAnalog::fixed(2048.0))),
    };
    let ctx = context(suite, DeviceConfig::with_default_flap());

    let scheduler = Scheduler::start(ctx);
    std::thread::sleep(Duration::from_millis(500));
    scheduler.stop();

    // Nominal 208 Hz for 0.5 s is 104 reads (plus the init read); allow a
    // generous band for scheduling jitter on loaded test machines.
    let reads = counter.load(Ordering::Relaxed);
    assert!(reads > 50, "only {reads} imu reads");
    assert!(reads < 200, "{reads} imu reads, scheduler running hot");
}

#[test]
fn test_flying_inputs_drive_tone_command() {
    use advisor::command::ToneKind;

    // 70 kts with a 45-degree port reading that puts Cp in the stall-warn
    // region of the default curve (aoa = 18 * cp).
    let pitot = MockPressure::for_ias_kts(70.0);
    let pfwd_pa = 0.5 * 1.225 * (70.0f32 / 1.94384).powi(2);
    let p45 = MockPressure::from_pascals(pfwd_pa * 0.05); // cp ~ 0.95 -> aoa ~ 17
    let suite = SensorSuite {
        imu: Box::new(MockImu::level()),
        pitot: Box::new(pitot),
        p45: Box::new(p45),
        p_static: Box::new(MockPressure::static_port(1013.25)),
        flaps: Box::new(MockFlaps::fixed(0, 0)),
        oat: Some(Box::new(MockOat::constant(15.0))),
        volume: Some(Box::new(MockAnalog::fixed(2048.0))),
    };
    let ctx = context(suite, DeviceConfig::with_default_flap());
    let state = Arc::clone(&ctx.state);

    let scheduler = Scheduler::start(ctx);
    std::thread::sleep(Duration::from_millis(1200));
    scheduler.stop();

    let snap = state.snapshot();
    assert!((snap.ias_kts - 70.0).abs() < 2.0, "ias {}", snap.ias_kts);
    assert!(snap.aoa_deg > 16.48, "aoa {}", snap.aoa_deg);
    assert_eq!(state.audio.tone(), ToneKind::High);
    assert_eq!(state.audio.pulse_pps(), 20.0);
}

#[test]
fn test_muted_taxi_is_silent() {
    use advisor::command::ToneKind;

    let suite = level_suite();
    let ctx = context(suite, DeviceConfig::with_default_flap());
    let state = Arc::clone(&ctx.state);
    state.set_audio_enabled(false);

    let scheduler = Scheduler::start(ctx);
    std::thread::sleep(Duration::from_millis(200));
    scheduler.stop();

    assert_eq!(state.audio.tone(), ToneKind::None);
}

#[test]
fn test_shutdown_is_prompt() {
    let suite = level_suite();
    let ctx = context(suite, DeviceConfig::with_default_flap());

    let scheduler = Scheduler::start(ctx);
    std::thread::sleep(Duration::from_millis(100));
    let start = std::time::Instant::now();
    scheduler.stop();
    // Tasks poll the flag at their scheduling points; the slowest is the
    // 10 Hz housekeeping loop.
    assert!(start.elapsed() < Duration::from_millis(500));
}
