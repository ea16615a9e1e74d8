//! Housekeeping alert calculators: over-G warning, Vno chime, 3D-audio
//! channel gain, and volume mapping.
//!
//! These run at the 10 Hz housekeeping cadence. Each is a small stateful
//! struct so the task loop stays a straight-line composition.

use shared::smoothing::Ema;
use shared::units::map_range;

/// Housekeeping tick period assumed by the cooldown counters, ms.
const TICK_MS: u32 = 100;

/// Over-G repeat suppression, ticks (3 s at 10 Hz).
const GLIMIT_REPEAT_TICKS: u32 = 3000 / TICK_MS;

/// Sustained roll/yaw rate above which the load limits derate, deg/s.
const ASYMMETRIC_GYRO_LIMIT_DPS: f32 = 15.0;

/// Derate factor applied to both limits during rolling/yawing load.
const ASYMMETRIC_DERATE: f32 = 0.666;

/// Over-G monitor with asymmetric-load derate and a repeat cooldown.
#[derive(Debug, Clone, Default)]
pub struct GLimitMonitor {
    cooldown_ticks: u32,
}

impl GLimitMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One 10 Hz evaluation with the felt load factor in pilot g
    /// (+1 in level flight). Returns true when the over-G voice should
    /// fire.
    pub fn evaluate(
        &mut self,
        load_g: f32,
        roll_rate_dps: f32,
        yaw_rate_dps: f32,
        limit_positive_g: f32,
        limit_negative_g: f32,
    ) -> bool {
        if self.cooldown_ticks > 0 {
            self.cooldown_ticks -= 1;
            return false;
        }

        // Rolling or yawing G: derate the envelope.
        let (pos, neg) = if roll_rate_dps.abs() >= ASYMMETRIC_GYRO_LIMIT_DPS
            || yaw_rate_dps.abs() >= ASYMMETRIC_GYRO_LIMIT_DPS
        {
            (
                limit_positive_g * ASYMMETRIC_DERATE,
                limit_negative_g * ASYMMETRIC_DERATE,
            )
        } else {
            (limit_positive_g, limit_negative_g)
        };

        if load_g >= pos || load_g <= neg {
            self.cooldown_ticks = GLIMIT_REPEAT_TICKS;
            return true;
        }
        false
    }
}

/// Vno overspeed chime with a configurable repeat interval.
#[derive(Debug, Clone, Default)]
pub struct VnoChime {
    cooldown_ticks: u32,
}

impl VnoChime {
    pub fn new() -> Self {
        Self::default()
    }

    /// One 10 Hz evaluation. Returns true when the chime should sound.
    pub fn evaluate(&mut self, ias_kts: f32, vno_kts: f32, interval_s: u32) -> bool {
        if self.cooldown_ticks > 0 {
            self.cooldown_ticks -= 1;
            return false;
        }
        if ias_kts > vno_kts {
            self.cooldown_ticks = interval_s.max(1) * (1000 / TICK_MS);
            return true;
        }
        false
    }
}

/// 3D audio: move the tone with the slip/skid ball.
///
/// The lateral-G-to-gain curve saturates around 0.2 g; the smoothed channel
/// offset pans the tone left or right.
#[derive(Debug, Clone)]
pub struct BallTracker {
    smoothed: Ema,
}

impl Default for BallTracker {
    fn default() -> Self {
        Self {
            smoothed: Ema::new(0.1, 0.0),
        }
    }
}

impl BallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map lateral G to `(left_gain, right_gain)`.
    pub fn update(&mut self, lateral_g: f32) -> (f32, f32) {
        let x = lateral_g.abs();
        let mut curve = -92.822 * x * x + 20.025 * x;
        curve = curve.clamp(0.0, 1.0);
        let signed = curve.copysign(lateral_g);

        let channel = self.smoothed.update(signed).clamp(-1.0, 1.0);
        ((-1.0 + channel).abs(), (1.0 + channel).abs())
    }
}

/// Volume knob mapping with smoothing.
#[derive(Debug, Clone, Default)]
pub struct VolumeControl {
    smoothed: Option<f32>,
}

impl VolumeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw analog reading; returns the smoothed percent 0..=100.
    ///
    /// The first reading seeds the smoother so startup does not sweep the
    /// volume from zero.
    pub fn update(&mut self, raw: f32, low_analog: f32, high_analog: f32) -> i32 {
        let pos = match self.smoothed {
            None => raw,
            Some(prev) => 0.5 * raw + 0.5 * prev,
        };
        self.smoothed = Some(pos);
        map_range(pos, low_analog, high_analog, 0.0, 100.0).clamp(0.0, 100.0) as i32
    }
}
