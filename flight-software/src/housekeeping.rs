//! Housekeeping loop body: over-G warning, Vno chime, 3D-audio panning,
//! volume, and the heartbeat indicator.
//!
//! Runs at 10 Hz on snapshot data; it may observe sensor and AHRS values
//! from different cycles, which is acceptable because nothing here is
//! safety-critical at a single-cycle granularity.

use crate::config::DeviceConfig;
use crate::state::SharedState;
use advisor::alerts::{BallTracker, GLimitMonitor, VnoChime, VolumeControl};
use advisor::command::Voice;
use shared::snapshot::SensorSnapshot;
use tracing::debug;

/// Heartbeat toggle cadence in ticks: fast blink with audio enabled.
const HEARTBEAT_FAST_TICKS: u32 = 3;

/// Slow blink (muted): three fast periods per toggle.
const HEARTBEAT_SLOW_MULTIPLIER: u32 = 3;

/// Housekeeping state machine.
pub struct Housekeeping {
    glimit: GLimitMonitor,
    vno: VnoChime,
    ball: BallTracker,
    volume: VolumeControl,
    over_g_enabled: bool,
    limit_positive_g: f32,
    limit_negative_g: f32,
    vno_enabled: bool,
    vno_kts: f32,
    vno_interval_s: u32,
    audio_3d_enabled: bool,
    volume_low: f32,
    volume_high: f32,
    default_volume: i32,
    tick: u32,
    led_on: bool,
    slow_blink_counter: u32,
}

impl Housekeeping {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            glimit: GLimitMonitor::new(),
            vno: VnoChime::new(),
            ball: BallTracker::new(),
            volume: VolumeControl::new(),
            over_g_enabled: config.audio.over_g_warning_enabled,
            limit_positive_g: config.audio.load_limit_positive_g,
            limit_negative_g: config.audio.load_limit_negative_g,
            vno_enabled: config.audio.vno_chime_enabled,
            vno_kts: config.audio.vno_kts,
            vno_interval_s: config.audio.vno_chime_interval_s,
            audio_3d_enabled: config.audio.audio_3d_enabled,
            volume_low: config.audio.volume_low_analog,
            volume_high: config.audio.volume_high_analog,
            default_volume: config.audio.default_volume_percent,
            tick: 0,
            led_on: false,
            slow_blink_counter: 0,
        }
    }

    /// One 10 Hz tick. `volume_raw` is the knob ADC reading when the task
    /// managed to acquire the bus within its bound.
    pub fn tick(&mut self, snap: &SensorSnapshot, volume_raw: Option<f32>, state: &SharedState) {
        self.tick = self.tick.wrapping_add(1);

        // Load factor in pilot g: the vertical axis reads -1 in level
        // flight, so the felt load is the negated corrected acceleration.
        let load_g = -snap.accel_vert_corr_g;
        if self.over_g_enabled
            && self.glimit.evaluate(
                load_g,
                snap.gyro_roll_dps,
                snap.gyro_yaw_dps,
                self.limit_positive_g,
                self.limit_negative_g,
            )
        {
            state.audio.set_voice(Voice::GLimit);
            debug!(load_g, "over-G warning");
        }

        if self.vno_enabled
            && self
                .vno
                .evaluate(snap.ias_kts, self.vno_kts, self.vno_interval_s)
        {
            state.audio.set_voice(Voice::VnoChime);
            debug!(ias = snap.ias_kts, vno = self.vno_kts, "Vno chime");
        }

        if self.audio_3d_enabled {
            let (left, right) = self.ball.update(snap.accel_lat_corr_g);
            state.audio.set_gains(left, right);
        }

        // Volume at half the tick rate (200 ms), like the panel firmware.
        if self.tick % 2 == 0 {
            match volume_raw {
                Some(raw) => {
                    let percent = self.volume.update(raw, self.volume_low, self.volume_high);
                    state.audio.set_volume_percent(percent);
                }
                None => state.audio.set_volume_percent(self.default_volume),
            }
        }

        // Heartbeat: fast blink with audio enabled, slow when muted.
        if self.tick % HEARTBEAT_FAST_TICKS == 0 {
            if state.audio_enabled() {
                self.slow_blink_counter = 0;
                self.led_on = !self.led_on;
                state.set_led(self.led_on);
            } else {
                self.slow_blink_counter += 1;
                if self.slow_blink_counter >= HEARTBEAT_SLOW_MULTIPLIER {
                    self.slow_blink_counter = 0;
                    self.led_on = !self.led_on;
                    state.set_led(self.led_on);
                }
            }
        }
    }
}
