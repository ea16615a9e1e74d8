//! Periodic task scheduling.
//!
//! Three cooperating threads share the sensor bus:
//!
//! - **IMU/AHRS** at the IMU rate (nominal 208 Hz) on a
//!   fractional-accumulator tick so the long-run rate is exact even though
//!   1e6 us does not divide evenly by 208.
//! - **Pressure/AOA** at the pressure rate (50 Hz) on deadline-based
//!   sleeps.
//! - **Housekeeping** at 10 Hz.
//!
//! Each task checks the shutdown flag at its scheduling point. Lateness
//! beyond 1 ms is logged (rate-limited to once per second) and the
//! schedule re-bases to now rather than trying to catch up.

use crate::airdata_task::{AirdataComputer, AirdataInputs};
use crate::config::{DeviceConfig, OatSource};
use crate::housekeeping::Housekeeping;
use crate::pipeline::{AirInputs, AttitudeEstimator};
use crate::sensors::SensorSuite;
use crate::state::SharedState;
use advisor::tone::select_tone;
use airdata::altitude::pressure_altitude_ft;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lateness beyond this is logged and the schedule re-based.
const LATE_THRESHOLD: Duration = Duration::from_millis(1);

/// Minimum spacing between lateness log lines.
const LATE_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Bound on housekeeping bus acquisitions.
const HOUSEKEEPING_LOCK_TIMEOUT: Duration = Duration::from_millis(5);

/// Microsecond tick generator with an integer remainder accumulator.
///
/// For a rate R, the base period is `floor(1e6 / R)` microseconds and the
/// remainder `1e6 mod R` accumulates per tick, adding one extra microsecond
/// on overflow. Over R ticks the periods sum to exactly one second.
#[derive(Debug, Clone)]
pub struct FractionalTicker {
    rate: u32,
    base_us: u32,
    remainder_us: u32,
    accumulator: u32,
}

impl FractionalTicker {
    pub fn new(rate_hz: u32) -> Self {
        let rate = rate_hz.max(1);
        Self {
            rate,
            base_us: 1_000_000 / rate,
            remainder_us: 1_000_000 % rate,
            accumulator: 0,
        }
    }

    /// Duration until the next tick.
    pub fn next_period(&mut self) -> Duration {
        self.accumulator += self.remainder_us;
        let mut period_us = self.base_us;
        if self.accumulator >= self.rate {
            self.accumulator -= self.rate;
            period_us += 1;
        }
        Duration::from_micros(period_us as u64)
    }

    /// Drop the accumulated remainder (used when re-basing after a late
    /// cycle).
    pub fn reset(&mut self) {
        self.accumulator = 0;
    }
}

/// Once-per-interval gate for log lines that would otherwise storm.
#[derive(Debug)]
pub struct RateLimitedLog {
    last: Option<Instant>,
    interval: Duration,
}

impl RateLimitedLog {
    pub fn new(interval: Duration) -> Self {
        Self {
            last: None,
            interval,
        }
    }

    /// True when the caller may log now.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(t) if now.duration_since(t) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Try to acquire a mutex within a bound, in short try-lock steps.
/// Returns `None` on contention past the deadline; callers fall through.
pub fn try_lock_for<T>(mutex: &Mutex<T>, timeout: Duration) -> Option<MutexGuard<'_, T>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(guard) = mutex.try_lock() {
            return Some(guard);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_micros(500));
    }
}

/// Everything a task needs, passed explicitly.
#[derive(Clone)]
pub struct TaskContext {
    pub config: Arc<DeviceConfig>,
    pub bus: Arc<Mutex<SensorSuite>>,
    pub ahrs: Arc<Mutex<AttitudeEstimator>>,
    pub state: Arc<SharedState>,
}

/// Running task set.
pub struct Scheduler {
    state: Arc<SharedState>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Initialize the estimator from a first sensor reading and spawn the
    /// three periodic tasks.
    pub fn start(ctx: TaskContext) -> Self {
        // Prime the estimator with a resting attitude and the current
        // pressure altitude before the loops begin.
        {
            let mut bus = ctx.bus.lock().unwrap();
            let static_bias = ctx.config.airdata.p_static_bias_mbar;
            let first_imu = bus.imu.read().unwrap_or_default();
            let palt = bus
                .p_static
                .read_millibars()
                .ok()
                .and_then(|mb| pressure_altitude_ft(mb, static_bias))
                .unwrap_or(0.0);
            ctx.ahrs.lock().unwrap().init(&first_imu, palt);
        }

        info!(
            imu_hz = ctx.config.rates.imu_hz,
            pressure_hz = ctx.config.rates.pressure_hz,
            housekeeping_hz = ctx.config.rates.housekeeping_hz,
            "starting scheduler"
        );

        let handles = vec![
            spawn("imu-ahrs", ctx.clone(), imu_task),
            spawn("pressure-aoa", ctx.clone(), pressure_task),
            spawn("housekeeping", ctx.clone(), housekeeping_task),
        ];

        Self {
            state: ctx.state,
            handles,
        }
    }

    /// Signal shutdown and join every task.
    pub fn stop(self) {
        self.state.request_shutdown();
        for handle in self.handles {
            let _ = handle.join();
        }
        info!("scheduler stopped");
    }
}

fn spawn(name: &str, ctx: TaskContext, body: fn(TaskContext)) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(ctx))
        .expect("spawning task thread")
}

/// IMU/AHRS task: read IMU + static pressure under one bus acquisition,
/// then run the attitude pipeline under the AHRS lock with measured dt.
fn imu_task(ctx: TaskContext) {
    let mut ticker = FractionalTicker::new(ctx.config.rates.imu_hz);
    let mut late_log = RateLimitedLog::new(LATE_LOG_INTERVAL);
    let mut read_fail_log = RateLimitedLog::new(LATE_LOG_INTERVAL);
    let static_bias = ctx.config.airdata.p_static_bias_mbar;

    let mut next_wake = Instant::now();
    let mut last_read: Option<Instant> = None;
    let mut palt_ft = ctx.state.snapshot().palt_ft;

    while !ctx.state.shutdown_requested() {
        next_wake += ticker.next_period();
        let now = Instant::now();
        if next_wake > now {
            std::thread::sleep(next_wake - now);
        }

        let late = Instant::now().saturating_duration_since(next_wake);
        if late > LATE_THRESHOLD {
            if late_log.allow() {
                warn!(late_us = late.as_micros() as u64, "imu task running late");
            }
            // Re-base instead of chasing the missed deadlines.
            next_wake = Instant::now();
            ticker.reset();
        }

        // Minimal bus hold: one IMU read plus the static port.
        let (imu_sample, static_mbar, read_instant) = {
            let mut bus = ctx.bus.lock().unwrap();
            let t = Instant::now();
            let imu = bus.imu.read();
            let mbar = bus.p_static.read_millibars();
            (imu, mbar, t)
        };

        let imu_sample = match imu_sample {
            Ok(s) => s,
            Err(e) => {
                if read_fail_log.allow() {
                    warn!(error = %e, "imu read failed, skipping cycle");
                }
                continue;
            }
        };

        let static_mbar = match static_mbar {
            Ok(mb) => mb,
            Err(e) => {
                if read_fail_log.allow() {
                    warn!(error = %e, "static pressure read failed, skipping cycle");
                }
                continue;
            }
        };

        if let Some(p) = pressure_altitude_ft(static_mbar, static_bias) {
            palt_ft = p;
        }

        let dt = match last_read {
            Some(prev) => read_instant.duration_since(prev).as_secs_f32(),
            None => 0.0, // pipeline substitutes the nominal period
        };
        last_read = Some(read_instant);

        let snap = ctx.state.snapshot();
        let air = AirInputs {
            ias_kts: snap.ias_kts,
            palt_ft,
            ias_update_us: snap.ias_update_us,
            oat_c: snap.oat_c,
        };

        let outputs = {
            let mut ahrs = ctx.ahrs.lock().unwrap();
            ahrs.update(&imu_sample, &air, dt)
        };

        ctx.state.update_snapshot(|s| {
            s.palt_ft = palt_ft;
            s.p_static_mbar = static_mbar;
            s.phi_deg = outputs.phi_deg;
            s.theta_deg = outputs.theta_deg;
            s.gamma_deg = outputs.gamma_deg;
            s.derived_aoa_deg = outputs.derived_aoa_deg;
            s.tas_mps = outputs.tas_mps;
            s.kalman_alt_m = outputs.kalman_alt_m;
            s.kalman_vsi_mps = outputs.kalman_vsi_mps;
            s.accel_fwd_corr_g = outputs.accel_fwd_corr_g;
            s.accel_lat_corr_g = outputs.accel_lat_corr_g;
            s.accel_vert_corr_g = outputs.accel_vert_corr_g;
            s.accel_fwd_smooth_g = outputs.accel_fwd_smooth_g;
            s.accel_lat_smooth_g = outputs.accel_lat_smooth_g;
            s.accel_vert_smooth_g = outputs.accel_vert_smooth_g;
            s.accel_fwd_comp_g = outputs.accel_fwd_comp_g;
            s.accel_lat_comp_g = outputs.accel_lat_comp_g;
            s.accel_vert_comp_g = outputs.accel_vert_comp_g;
            s.gyro_roll_dps = outputs.gyro_roll_dps;
            s.gyro_pitch_dps = outputs.gyro_pitch_dps;
            s.gyro_yaw_dps = outputs.gyro_yaw_dps;
        });
    }
}

/// Pressure/AOA task: 50 Hz deadline loop driving the airdata computer and
/// the tone advisor.
fn pressure_task(ctx: TaskContext) {
    let period = Duration::from_micros(1_000_000 / ctx.config.rates.pressure_hz as u64);
    let mut late_log = RateLimitedLog::new(LATE_LOG_INTERVAL);
    let mut read_fail_log = RateLimitedLog::new(LATE_LOG_INTERVAL);
    let mut debug_log = RateLimitedLog::new(Duration::from_secs(1));
    let mut computer = AirdataComputer::new(&ctx.config);
    let oat_configured = !matches!(ctx.config.airdata.oat_source, OatSource::None);

    let pfwd_bias = ctx.config.airdata.pfwd_bias_counts;
    let p45_bias = ctx.config.airdata.p45_bias_counts;

    let epoch = Instant::now();
    let mut next_wake = Instant::now();

    while !ctx.state.shutdown_requested() {
        next_wake += period;
        let now = Instant::now();
        if next_wake > now {
            std::thread::sleep(next_wake - now);
        } else if now.saturating_duration_since(next_wake) > LATE_THRESHOLD {
            if late_log.allow() {
                warn!("pressure task running late");
            }
            next_wake = Instant::now();
        }

        let now_ms = epoch.elapsed().as_millis() as u64;
        let now_us = epoch.elapsed().as_micros() as u64;
        let requests = computer.slow_sensor_requests(now_ms, oat_configured);

        // One bus acquisition for the port reads plus any due slow sensors.
        let reads = {
            let mut bus = ctx.bus.lock().unwrap();
            let pfwd = bus.pitot.read_counts();
            let p45 = bus.p45.read_counts();
            let flap = if requests.read_flaps {
                Some(bus.flaps.update())
            } else {
                None
            };
            let oat = match (&mut bus.oat, requests.read_oat) {
                (Some(sensor), true) => Some(sensor.read_c()),
                _ => None,
            };
            (pfwd, p45, flap, oat)
        };

        let (pfwd, p45, flap, oat) = reads;
        let (pfwd, p45) = match (pfwd, p45) {
            (Ok(f), Ok(a)) => (f - pfwd_bias, a - p45_bias),
            (f, a) => {
                if read_fail_log.allow() {
                    warn!(
                        pfwd_err = f.is_err(),
                        p45_err = a.is_err(),
                        "pressure read failed, skipping cycle"
                    );
                }
                continue;
            }
        };

        if let Some(Ok(flap_state)) = flap {
            computer.set_flap(flap_state, now_ms);
        }
        if let Some(Ok(oat_c)) = oat {
            computer.set_oat(oat_c, now_ms);
        }

        let inputs = AirdataInputs {
            pfwd_counts: pfwd,
            p45_counts: p45,
            now_ms,
            now_us: now_us.max(1),
        };
        // The PSI conversion is pure; the closure re-acquires the bus only
        // for the single conversion call, never across the filter math.
        let outputs = computer.process(&inputs, &ctx.config, |counts| {
            ctx.bus.lock().unwrap().pitot.counts_to_psi(counts)
        });

        ctx.state.update_snapshot(|s| {
            s.ias_kts = outputs.ias_kts;
            s.aoa_deg = outputs.aoa_deg;
            s.cp = outputs.cp;
            s.decel_rate_kts_s = outputs.decel_rate_kts_s;
            s.flap_position = outputs.flap.position;
            s.flap_index = outputs.flap.index;
            s.oat_c = outputs.oat_c;
            s.ias_update_us = outputs.ias_update_us;
        });

        // Drive the tone advisor from this cycle's consistent values.
        let thresholds = ctx.config.flap(outputs.flap.index).thresholds();
        let tone = select_tone(
            outputs.aoa_deg,
            outputs.ias_kts,
            ctx.state.audio_enabled(),
            &thresholds,
            ctx.config.audio.mute_under_ias_kts,
        );
        ctx.state.audio.set_tone(tone.tone);
        ctx.state.audio.set_pulse_pps(tone.pps);

        if debug_log.allow() {
            let s = ctx.state.snapshot();
            debug!(
                ias = s.ias_kts,
                aoa = s.aoa_deg,
                cp = s.cp,
                palt = s.palt_ft,
                pitch = s.theta_deg,
                roll = s.phi_deg,
                vsi = s.kalman_vsi_mps,
                flap = s.flap_index,
                "airdata"
            );
        }
    }
}

/// Housekeeping task: 10 Hz alert and utility loop.
fn housekeeping_task(ctx: TaskContext) {
    let period = Duration::from_micros(1_000_000 / ctx.config.rates.housekeeping_hz as u64);
    let mut housekeeping = Housekeeping::new(&ctx.config);
    let mut next_wake = Instant::now();

    while !ctx.state.shutdown_requested() {
        next_wake += period;
        let now = Instant::now();
        if next_wake > now {
            std::thread::sleep(next_wake - now);
        } else {
            next_wake = Instant::now();
        }

        let snap = ctx.state.snapshot();

        // The volume knob lives on the sensor bus; bound the wait so a
        // busy bus cannot stall this loop.
        let volume_raw = if ctx.config.audio.volume_control_enabled {
            try_lock_for(&ctx.bus, HOUSEKEEPING_LOCK_TIMEOUT)
                .and_then(|mut bus| bus.volume.as_mut().and_then(|v| v.read_raw().ok()))
        } else {
            None
        };

        housekeeping.tick(&snap, volume_raw, &ctx.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_ticker_exact_long_run_rate() {
        // 208 Hz: base 4807 us, remainder 144. Over one second of ticks the
        // periods must sum to exactly 1e6 us.
        let mut ticker = FractionalTicker::new(208);
        let total: u64 = (0..208).map(|_| ticker.next_period().as_micros() as u64).sum();
        assert_eq!(total, 1_000_000);
    }

    #[test]
    fn test_fractional_ticker_even_rate() {
        let mut ticker = FractionalTicker::new(50);
        for _ in 0..100 {
            assert_eq!(ticker.next_period(), Duration::from_micros(20_000));
        }
    }

    #[test]
    fn test_fractional_ticker_periods_differ_by_at_most_one_us() {
        let mut ticker = FractionalTicker::new(208);
        for _ in 0..1000 {
            let p = ticker.next_period().as_micros();
            assert!(p == 4807 || p == 4808, "period {p}");
        }
    }

    #[test]
    fn test_fractional_ticker_multi_second() {
        let mut ticker = FractionalTicker::new(208);
        let total: u64 = (0..208 * 10)
            .map(|_| ticker.next_period().as_micros() as u64)
            .sum();
        assert_eq!(total, 10_000_000);
    }

    #[test]
    fn test_rate_limited_log() {
        let mut log = RateLimitedLog::new(Duration::from_millis(50));
        assert!(log.allow());
        assert!(!log.allow());
        std::thread::sleep(Duration::from_millis(60));
        assert!(log.allow());
    }

    #[test]
    fn test_try_lock_for_uncontended() {
        let m = Mutex::new(5);
        assert!(try_lock_for(&m, Duration::from_millis(5)).is_some());
    }

    #[test]
    fn test_try_lock_for_contended_times_out() {
        let m = std::sync::Arc::new(Mutex::new(5));
        let m2 = std::sync::Arc::clone(&m);
        let _guard = m.lock().unwrap();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let result = try_lock_for(&m2, Duration::from_millis(5));
            (result.is_none(), start.elapsed())
        });
        let (timed_out, elapsed) = handle.join().unwrap();
        assert!(timed_out);
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(100));
    }
}
