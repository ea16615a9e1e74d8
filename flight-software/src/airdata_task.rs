//! Pressure-side airdata computer.
//!
//! Runs at the pressure cadence (~50 Hz). Each cycle despikes the pitot and
//! 45-degree port counts with a running median, smooths with a short moving
//! average, evaluates Cp and AOA against the active flap curve, and derives
//! IAS. Flap position and OAT are throttled to about once per second, and
//! the airspeed derivative (deceleration) updates at 10 Hz through the
//! Savitzky-Golay filter, scaled by the measured period.

use crate::config::DeviceConfig;
use crate::sensors::FlapState;
use airdata::airspeed::{cas_correct, ias_kts_from_dynamic_pressure};
use airdata::aoa::AoaCalculator;
use fusion::savgol::SgDerivative;
use shared::smoothing::{RunningAverage, RunningMedian};
use shared::units::psi2mb;

/// Moving-average window applied after the median despike.
const PRESSURE_AVG_WINDOW: usize = 10;

/// Throttle for flap and OAT reads, ms.
const SLOW_SENSOR_INTERVAL_MS: u64 = 1000;

/// Deceleration update interval, ms (10 Hz).
const DECEL_INTERVAL_MS: u64 = 100;

/// Savitzky-Golay window for the IAS derivative.
const DECEL_SG_WINDOW: usize = 15;

/// Raw inputs for one airdata cycle, read by the task under the bus lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirdataInputs {
    /// Pitot counts, bias already subtracted.
    pub pfwd_counts: f32,
    /// 45-degree port counts, bias already subtracted.
    pub p45_counts: f32,
    /// Millisecond timestamp of this cycle.
    pub now_ms: u64,
    /// Microsecond timestamp of this cycle.
    pub now_us: u64,
}

/// Published airdata state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirdataOutputs {
    pub ias_kts: f32,
    pub aoa_deg: f32,
    pub cp: f32,
    pub pfwd_smoothed: f32,
    pub p45_smoothed: f32,
    pub decel_rate_kts_s: f32,
    pub flap: FlapState,
    pub oat_c: Option<f32>,
    pub ias_update_us: u64,
}

/// Decisions the computer asks the task loop to act on this cycle
/// (reads that need the sensor bus).
#[derive(Debug, Clone, Copy, Default)]
pub struct SlowSensorRequests {
    pub read_flaps: bool,
    pub read_oat: bool,
}

/// Stateful pressure-side computer.
pub struct AirdataComputer {
    pfwd_median: RunningMedian,
    pfwd_avg: RunningAverage,
    p45_median: RunningMedian,
    p45_avg: RunningAverage,
    aoa: AoaCalculator,
    decel: SgDerivative,
    pfwd_bias_counts: f32,
    last_flap_read_ms: Option<u64>,
    last_oat_read_ms: Option<u64>,
    last_decel_ms: Option<u64>,
    outputs: AirdataOutputs,
}

impl AirdataComputer {
    pub fn new(config: &DeviceConfig) -> Self {
        let median_window = config.airdata.pressure_median_window.max(1);
        Self {
            pfwd_median: RunningMedian::new(median_window),
            pfwd_avg: RunningAverage::new(PRESSURE_AVG_WINDOW),
            p45_median: RunningMedian::new(median_window),
            p45_avg: RunningAverage::new(PRESSURE_AVG_WINDOW),
            aoa: AoaCalculator::new(config.airdata.aoa_lag_samples),
            decel: SgDerivative::new(DECEL_SG_WINDOW),
            pfwd_bias_counts: config.airdata.pfwd_bias_counts,
            last_flap_read_ms: None,
            last_oat_read_ms: None,
            last_decel_ms: None,
            outputs: AirdataOutputs::default(),
        }
    }

    /// Which slow sensors are due this cycle.
    pub fn slow_sensor_requests(&self, now_ms: u64, oat_configured: bool) -> SlowSensorRequests {
        let due = |last: Option<u64>| match last {
            None => true,
            Some(t) => now_ms.saturating_sub(t) > SLOW_SENSOR_INTERVAL_MS,
        };
        SlowSensorRequests {
            read_flaps: due(self.last_flap_read_ms),
            read_oat: oat_configured && due(self.last_oat_read_ms),
        }
    }

    /// Record a throttled flap read.
    pub fn set_flap(&mut self, flap: FlapState, now_ms: u64) {
        self.outputs.flap = flap;
        self.last_flap_read_ms = Some(now_ms);
    }

    /// Record a throttled OAT read; out-of-range values are rejected and
    /// the previous value retained.
    pub fn set_oat(&mut self, oat_c: f32, now_ms: u64) {
        self.last_oat_read_ms = Some(now_ms);
        if oat_c > -100.0 && oat_c < 100.0 {
            self.outputs.oat_c = Some(oat_c);
        }
    }

    /// One pressure cycle. `counts_to_psi` is the pitot sensor's pure
    /// conversion, applied to the smoothed counts with the bias restored.
    pub fn process(
        &mut self,
        inputs: &AirdataInputs,
        config: &DeviceConfig,
        counts_to_psi: impl Fn(f32) -> f32,
    ) -> AirdataOutputs {
        // Median despike, then a short moving average.
        self.pfwd_median.add(inputs.pfwd_counts);
        self.pfwd_avg.add(self.pfwd_median.median());
        let pfwd_smoothed = self.pfwd_avg.average();

        self.p45_median.add(inputs.p45_counts);
        self.p45_avg.add(self.p45_median.median());
        let p45_smoothed = self.p45_avg.average();

        // Cp and AOA against the active flap curve.
        let flap_setting = config.flap(self.outputs.flap.index);
        let aoa = self.aoa.calculate(pfwd_smoothed, p45_smoothed, &flap_setting.curve);

        // IAS from the smoothed dynamic pressure. The smoothed value has
        // the bias removed, so it goes back on for the PSI conversion.
        let pfwd_psi = counts_to_psi(pfwd_smoothed + self.pfwd_bias_counts);
        let pfwd_pascals = psi2mb(pfwd_psi) * 100.0;
        let mut ias = ias_kts_from_dynamic_pressure(pfwd_pascals);
        if ias > 0.0 {
            ias = cas_correct(ias, &config.airdata.cas_curve);
        }

        self.outputs.pfwd_smoothed = pfwd_smoothed;
        self.outputs.p45_smoothed = p45_smoothed;
        self.outputs.aoa_deg = aoa.aoa_deg;
        self.outputs.cp = aoa.cp;
        self.outputs.ias_kts = ias;
        self.outputs.ias_update_us = inputs.now_us;

        // Deceleration channel at 10 Hz, scaled by the measured period.
        match self.last_decel_ms {
            None => self.last_decel_ms = Some(inputs.now_ms),
            Some(last) => {
                let delta_ms = inputs.now_ms.saturating_sub(last);
                if delta_ms >= DECEL_INTERVAL_MS {
                    self.last_decel_ms = Some(inputs.now_ms);
                    let sample_hz = 1000.0 / delta_ms as f32;
                    self.outputs.decel_rate_kts_s =
                        self.decel.compute(ias as f64) * sample_hz;
                }
            }
        }

        self.outputs
    }

    pub fn outputs(&self) -> &AirdataOutputs {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use approx::assert_relative_eq;

    /// Mirror of the pascal-calibrated mock sensor conversion.
    fn pascals_to_psi(counts: f32) -> f32 {
        counts / 6894.76
    }

    fn config() -> DeviceConfig {
        let mut c = DeviceConfig::with_default_flap();
        // aoa = 18 * cp for easy arithmetic
        c.airdata.aoa_lag_samples = 1;
        c.airdata.pressure_median_window = 1;
        c
    }

    fn run_cycles(
        computer: &mut AirdataComputer,
        config: &DeviceConfig,
        pfwd: f32,
        p45: f32,
        n: usize,
    ) -> AirdataOutputs {
        let mut out = AirdataOutputs::default();
        for i in 0..n {
            let inputs = AirdataInputs {
                pfwd_counts: pfwd,
                p45_counts: p45,
                now_ms: (i as u64) * 20,
                now_us: (i as u64) * 20_000 + 1,
            };
            out = computer.process(&inputs, config, pascals_to_psi);
        }
        out
    }

    #[test]
    fn test_ias_from_known_dynamic_pressure() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        // 1621 Pa is about 100 kts
        let out = run_cycles(&mut computer, &config, 1621.0, 800.0, 30);
        assert_relative_eq!(out.ias_kts, 100.0, epsilon = 0.5);
    }

    #[test]
    fn test_negative_pressure_clamps_ias() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        let out = run_cycles(&mut computer, &config, -50.0, 0.0, 30);
        assert_eq!(out.ias_kts, 0.0);
    }

    #[test]
    fn test_cp_and_aoa() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        // Cp = (1000 - 400) / 1000 = 0.6; curve is aoa = 18 * cp
        let out = run_cycles(&mut computer, &config, 1000.0, 400.0, 30);
        assert_relative_eq!(out.cp, 0.6, epsilon = 1e-4);
        assert_relative_eq!(out.aoa_deg, 10.8, epsilon = 0.01);
    }

    #[test]
    fn test_median_rejects_spike() {
        let mut config = config();
        config.airdata.pressure_median_window = 5;
        let mut computer = AirdataComputer::new(&config);
        // Steady pressure with one wild spike in the middle
        for i in 0..20u64 {
            let pfwd = if i == 10 { 50_000.0 } else { 1000.0 };
            let inputs = AirdataInputs {
                pfwd_counts: pfwd,
                p45_counts: 400.0,
                now_ms: i * 20,
                now_us: i * 20_000 + 1,
            };
            computer.process(&inputs, &config, pascals_to_psi);
        }
        let out = computer.outputs();
        assert!(
            (out.pfwd_smoothed - 1000.0).abs() < 50.0,
            "spike leaked: {}",
            out.pfwd_smoothed
        );
    }

    #[test]
    fn test_decel_updates_at_10hz() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        // Constant IAS: the derivative must settle to zero once the SG
        // buffer fills (15 samples at 10 Hz = 1.5 s plus the first output).
        let out = run_cycles(&mut computer, &config, 1621.0, 800.0, 400);
        assert_relative_eq!(out.decel_rate_kts_s, 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_decel_sign_on_deceleration() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        // Dynamic pressure bleeding off
        let mut out = AirdataOutputs::default();
        for i in 0..600u64 {
            let pfwd = 1800.0 - (i as f32) * 2.0;
            let inputs = AirdataInputs {
                pfwd_counts: pfwd,
                p45_counts: 400.0,
                now_ms: i * 20,
                now_us: i * 20_000 + 1,
            };
            out = computer.process(&inputs, &config, pascals_to_psi);
        }
        assert!(out.decel_rate_kts_s < -0.1, "decel {}", out.decel_rate_kts_s);
    }

    #[test]
    fn test_slow_sensor_throttle() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        // First cycle: both due
        let req = computer.slow_sensor_requests(0, true);
        assert!(req.read_flaps);
        assert!(req.read_oat);

        computer.set_flap(FlapState { position: 1, index: 0 }, 0);
        computer.set_oat(12.0, 0);

        // 500 ms later: neither due
        let req = computer.slow_sensor_requests(500, true);
        assert!(!req.read_flaps);
        assert!(!req.read_oat);

        // 1.5 s later: both due again
        let req = computer.slow_sensor_requests(1500, true);
        assert!(req.read_flaps);
        assert!(req.read_oat);
    }

    #[test]
    fn test_oat_range_validation() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        computer.set_oat(15.0, 0);
        assert_eq!(computer.outputs().oat_c, Some(15.0));
        // A one-wire read failure often shows up as -127
        computer.set_oat(-127.0, 1000);
        assert_eq!(computer.outputs().oat_c, Some(15.0));
    }

    #[test]
    fn test_oat_not_requested_when_unconfigured() {
        let config = config();
        let computer = AirdataComputer::new(&config);
        let req = computer.slow_sensor_requests(0, false);
        assert!(!req.read_oat);
    }

    #[test]
    fn test_cas_curve_applied() {
        let mut config = config();
        config.airdata.cas_curve = airdata::curve::QuadraticCurve::new(0.0, 1.1, 0.0);
        let mut computer = AirdataComputer::new(&config);
        let out = run_cycles(&mut computer, &config, 1621.0, 800.0, 30);
        assert_relative_eq!(out.ias_kts, 110.0, epsilon = 0.6);
    }

    #[test]
    fn test_ias_update_timestamp_advances() {
        let config = config();
        let mut computer = AirdataComputer::new(&config);
        let out1 = run_cycles(&mut computer, &config, 1621.0, 800.0, 1);
        let inputs = AirdataInputs {
            pfwd_counts: 1621.0,
            p45_counts: 800.0,
            now_ms: 20,
            now_us: 20_001,
        };
        let out2 = computer.process(&inputs, &config, pascals_to_psi);
        assert!(out2.ias_update_us > out1.ias_update_us);
    }
}
