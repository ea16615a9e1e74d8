//! Lock-free audio command cell.
//!
//! The fusion tasks publish tone selections, pulse rates, volume, and
//! channel gains here; the audio playback collaborator (out of scope)
//! drains them at its own cadence. Every field is an independent atomic so
//! no path through the 208 Hz loop ever blocks on audio.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Pulse frequencies outside this range disable pulsing (solid tone).
const PULSE_PPS_MIN: f32 = 1.0;
const PULSE_PPS_MAX: f32 = 25.0;

/// Audio tone selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ToneKind {
    None = 0,
    Low = 1,
    High = 2,
}

impl ToneKind {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ToneKind::Low,
            2 => ToneKind::High,
            _ => ToneKind::None,
        }
    }
}

/// One-shot voice clips the housekeeping task can enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Voice {
    None = 0,
    GLimit = 1,
    OverG = 2,
    VnoChime = 3,
    Enabled = 4,
    Disabled = 5,
    LeftSpeaker = 6,
    RightSpeaker = 7,
}

impl Voice {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Voice::GLimit,
            2 => Voice::OverG,
            3 => Voice::VnoChime,
            4 => Voice::Enabled,
            5 => Voice::Disabled,
            6 => Voice::LeftSpeaker,
            7 => Voice::RightSpeaker,
            _ => Voice::None,
        }
    }
}

/// Shared audio state. All setters are wait-free stores.
#[derive(Debug)]
pub struct AudioCommand {
    tone: AtomicU8,
    /// f32 bits; 0.0 means solid (no pulse modulation).
    pulse_pps: AtomicU32,
    /// Volume 0..=100 percent.
    volume_percent: AtomicU8,
    /// f32 bits; nominal 1.0 each.
    left_gain: AtomicU32,
    right_gain: AtomicU32,
    voice: AtomicU8,
}

impl Default for AudioCommand {
    fn default() -> Self {
        Self {
            tone: AtomicU8::new(ToneKind::None as u8),
            pulse_pps: AtomicU32::new(0.0f32.to_bits()),
            volume_percent: AtomicU8::new(50),
            left_gain: AtomicU32::new(1.0f32.to_bits()),
            right_gain: AtomicU32::new(1.0f32.to_bits()),
            voice: AtomicU8::new(Voice::None as u8),
        }
    }
}

impl AudioCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tone(&self, tone: ToneKind) {
        self.tone.store(tone as u8, Ordering::Relaxed);
    }

    pub fn tone(&self) -> ToneKind {
        ToneKind::from_u8(self.tone.load(Ordering::Relaxed))
    }

    /// Command the pulse envelope. Rates outside [1, 25] PPS disable
    /// pulsing and the tone plays solid.
    pub fn set_pulse_pps(&self, pps: f32) {
        let effective = if (PULSE_PPS_MIN..=PULSE_PPS_MAX).contains(&pps) {
            pps
        } else {
            0.0
        };
        self.pulse_pps.store(effective.to_bits(), Ordering::Relaxed);
    }

    pub fn pulse_pps(&self) -> f32 {
        f32::from_bits(self.pulse_pps.load(Ordering::Relaxed))
    }

    pub fn set_volume_percent(&self, percent: i32) {
        self.volume_percent
            .store(percent.clamp(0, 100) as u8, Ordering::Relaxed);
    }

    pub fn volume_percent(&self) -> u8 {
        self.volume_percent.load(Ordering::Relaxed)
    }

    /// Channel gains for 3D audio; nominal 1.0 each.
    pub fn set_gains(&self, left: f32, right: f32) {
        self.left_gain.store(left.to_bits(), Ordering::Relaxed);
        self.right_gain.store(right.to_bits(), Ordering::Relaxed);
    }

    pub fn gains(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left_gain.load(Ordering::Relaxed)),
            f32::from_bits(self.right_gain.load(Ordering::Relaxed)),
        )
    }

    /// Enqueue a one-shot voice clip. The playback side takes and clears it.
    pub fn set_voice(&self, voice: Voice) {
        self.voice.store(voice as u8, Ordering::Relaxed);
    }

    /// Consume the pending voice request, if any.
    pub fn take_voice(&self) -> Voice {
        Voice::from_u8(self.voice.swap(Voice::None as u8, Ordering::Relaxed))
    }

    /// Zero the tone and pulse (used on mute and on audio-test stop).
    pub fn silence(&self) {
        self.set_tone(ToneKind::None);
        self.set_pulse_pps(0.0);
        self.set_voice(Voice::None);
    }
}
