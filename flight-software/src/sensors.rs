//! Sensor abstraction layer.
//!
//! The fusion core never talks to hardware directly; it consumes these
//! traits so the same pipeline runs against the real SPI/I2C drivers in
//! production and against mocks in tests and the simulator binary.
//!
//! Conventions at this boundary: accelerometers in g (level flight reads
//! `(0, 0, -1)`), gyros in deg/s, pressures in raw ADC counts or millibars
//! per method, temperature in Celsius.

use crate::errors::{SensorError, SensorResult};

/// One IMU reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    /// Forward acceleration, g.
    pub ax_g: f32,
    /// Lateral (right positive) acceleration, g.
    pub ay_g: f32,
    /// Vertical (down positive) acceleration, g; level flight is -1.
    pub az_g: f32,
    /// Roll rate, deg/s.
    pub gx_dps: f32,
    /// Pitch rate, deg/s.
    pub gy_dps: f32,
    /// Yaw rate, deg/s.
    pub gz_dps: f32,
}

impl ImuSample {
    /// A motionless, level reading.
    pub fn level() -> Self {
        Self {
            az_g: -1.0,
            ..Default::default()
        }
    }
}

/// Flap sensor reading: raw position plus the index into the per-flap
/// configuration table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlapState {
    pub position: i32,
    pub index: usize,
}

/// Inertial measurement unit on the sensor bus.
pub trait ImuSensor: Send {
    fn read(&mut self) -> SensorResult<ImuSample>;
}

/// Differential or absolute pressure sensor.
pub trait PressureSensor: Send {
    /// Raw ADC counts; biases are subtracted by the caller.
    fn read_counts(&mut self) -> SensorResult<f32>;

    /// Pure conversion from counts to PSI for this sensor's scaling.
    fn counts_to_psi(&self, counts: f32) -> f32;

    /// Absolute pressure in millibars (static-port sensors).
    fn read_millibars(&mut self) -> SensorResult<f32>;
}

/// Flap position sensor.
pub trait FlapSensor: Send {
    fn update(&mut self) -> SensorResult<FlapState>;
}

/// Outside-air-temperature source: the one-wire probe or the EFIS feed,
/// selected by configuration. Readings outside (-100, 100) Celsius are
/// rejected by the caller.
pub trait OatSensor: Send {
    fn read_c(&mut self) -> SensorResult<f32>;
}

/// Raw analog input (the volume knob ADC).
pub trait AnalogInput: Send {
    fn read_raw(&mut self) -> SensorResult<f32>;
}

/// Everything on the shared sensor bus. The scheduler wraps this in the
/// bus mutex and tasks acquire it only around the minimal driver calls.
pub struct SensorSuite {
    pub imu: Box<dyn ImuSensor>,
    pub pitot: Box<dyn PressureSensor>,
    pub p45: Box<dyn PressureSensor>,
    pub p_static: Box<dyn PressureSensor>,
    pub flaps: Box<dyn FlapSensor>,
    pub oat: Option<Box<dyn OatSensor>>,
    pub volume: Option<Box<dyn AnalogInput>>,
}

pub mod mock {
    //! Mock sensors for tests and the simulator binary.

    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Pascals-per-PSI, used by the pascal-calibrated mock pressure sensor.
    const PA_PER_PSI: f32 = 6894.76;

    /// IMU driven by a closure of the sample index.
    pub struct MockImu {
        sample_fn: Box<dyn FnMut(u64) -> ImuSample + Send>,
        reads: Arc<AtomicU64>,
        fail: bool,
    }

    impl MockImu {
        pub fn from_fn(sample_fn: impl FnMut(u64) -> ImuSample + Send + 'static) -> Self {
            Self {
                sample_fn: Box::new(sample_fn),
                reads: Arc::new(AtomicU64::new(0)),
                fail: false,
            }
        }

        pub fn constant(sample: ImuSample) -> Self {
            Self::from_fn(move |_| sample)
        }

        pub fn level() -> Self {
            Self::constant(ImuSample::level())
        }

        /// Shared read counter, for asserting task cadence in tests.
        pub fn read_counter(&self) -> Arc<AtomicU64> {
            Arc::clone(&self.reads)
        }

        pub fn failing() -> Self {
            let mut imu = Self::level();
            imu.fail = true;
            imu
        }
    }

    impl ImuSensor for MockImu {
        fn read(&mut self) -> SensorResult<ImuSample> {
            if self.fail {
                return Err(SensorError::NotResponding("mock imu".into()));
            }
            let n = self.reads.fetch_add(1, Ordering::Relaxed);
            Ok((self.sample_fn)(n))
        }
    }

    /// Pressure sensor whose counts are calibrated as Pascals, which keeps
    /// test arithmetic transparent: `counts == dynamic pressure in Pa`.
    pub struct MockPressure {
        counts: f32,
        millibars: f32,
    }

    impl MockPressure {
        pub fn from_pascals(pascals: f32) -> Self {
            Self {
                counts: pascals,
                millibars: 1013.25,
            }
        }

        pub fn static_port(millibars: f32) -> Self {
            Self {
                counts: 0.0,
                millibars,
            }
        }

        /// Counts that produce a given IAS through the pipeline math.
        pub fn for_ias_kts(ias_kts: f32) -> Self {
            let v_mps = ias_kts / 1.94384;
            Self::from_pascals(0.5 * 1.225 * v_mps * v_mps)
        }

        pub fn set_counts(&mut self, counts: f32) {
            self.counts = counts;
        }

        pub fn set_millibars(&mut self, mb: f32) {
            self.millibars = mb;
        }
    }

    impl PressureSensor for MockPressure {
        fn read_counts(&mut self) -> SensorResult<f32> {
            Ok(self.counts)
        }

        fn counts_to_psi(&self, counts: f32) -> f32 {
            counts / PA_PER_PSI
        }

        fn read_millibars(&mut self) -> SensorResult<f32> {
            Ok(self.millibars)
        }
    }

    /// Fixed flap position.
    pub struct MockFlaps {
        state: FlapState,
    }

    impl MockFlaps {
        pub fn fixed(position: i32, index: usize) -> Self {
            Self {
                state: FlapState { position, index },
            }
        }
    }

    impl FlapSensor for MockFlaps {
        fn update(&mut self) -> SensorResult<FlapState> {
            Ok(self.state)
        }
    }

    /// Constant OAT.
    pub struct MockOat {
        celsius: f32,
    }

    impl MockOat {
        pub fn constant(celsius: f32) -> Self {
            Self { celsius }
        }
    }

    impl OatSensor for MockOat {
        fn read_c(&mut self) -> SensorResult<f32> {
            Ok(self.celsius)
        }
    }

    /// Fixed analog reading (volume knob).
    pub struct MockAnalog {
        raw: f32,
    }

    impl MockAnalog {
        pub fn fixed(raw: f32) -> Self {
            Self { raw }
        }
    }

    impl AnalogInput for MockAnalog {
        fn read_raw(&mut self) -> SensorResult<f32> {
            Ok(self.raw)
        }
    }

    /// A full suite of mocks for a motionless aircraft at sea level.
    pub fn level_suite() -> SensorSuite {
        SensorSuite {
            imu: Box::new(MockImu::level()),
            pitot: Box::new(MockPressure::from_pascals(0.0)),
            p45: Box::new(MockPressure::from_pascals(0.0)),
            p_static: Box::new(MockPressure::static_port(1013.25)),
            flaps: Box::new(MockFlaps::fixed(0, 0)),
            oat: Some(Box::new(MockOat::constant(15.0))),
            volume: Some(Box::new(MockAnalog::fixed(2048.0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn test_mock_imu_counts_reads() {
        let mut imu = MockImu::level();
        let counter = imu.read_counter();
        for _ in 0..5 {
            imu.read().unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 5);
    }

    #[test]
    fn test_mock_imu_failure() {
        let mut imu = MockImu::failing();
        assert!(imu.read().is_err());
    }

    #[test]
    fn test_mock_pressure_pascal_calibration() {
        let p = MockPressure::from_pascals(689.476);
        // 689.476 Pa = 0.1 PSI
        assert!((p.counts_to_psi(689.476) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_mock_pressure_for_ias() {
        let mut p = MockPressure::for_ias_kts(100.0);
        let counts = p.read_counts().unwrap();
        // 100 kts is about 1621 Pa of dynamic pressure
        assert!((counts - 1621.0).abs() < 5.0, "counts {counts}");
    }

    #[test]
    fn test_level_suite_reads() {
        let mut suite = level_suite();
        assert_eq!(suite.imu.read().unwrap(), ImuSample::level());
        assert_eq!(suite.p_static.read_millibars().unwrap(), 1013.25);
        assert_eq!(suite.flaps.update().unwrap().index, 0);
    }
}
