//! Long-lived shared state threaded through the scheduler.
//!
//! No singletons: the configuration and this state block are constructed
//! in `main` (or a test) and handed to the tasks explicitly. Readers get
//! shared references; the snapshot is cloned out under its lock so no
//! consumer ever sees a torn value.

use advisor::command::AudioCommand;
use shared::snapshot::SensorSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// State shared between the periodic tasks and external consumers.
pub struct SharedState {
    snapshot: Mutex<SensorSnapshot>,
    /// Set once to stop every task at its next scheduling point.
    shutdown: AtomicBool,
    /// Pilot audio-enable (the panel button).
    audio_enabled: AtomicBool,
    /// Panel heartbeat LED state, driven by housekeeping.
    led_on: AtomicBool,
    pub audio: Arc<AudioCommand>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            snapshot: Mutex::new(SensorSnapshot::default()),
            shutdown: AtomicBool::new(false),
            audio_enabled: AtomicBool::new(true),
            led_on: AtomicBool::new(false),
            audio: Arc::new(AudioCommand::new()),
        }
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone out a consistent snapshot.
    pub fn snapshot(&self) -> SensorSnapshot {
        *self.snapshot.lock().unwrap()
    }

    /// Mutate the snapshot under its lock.
    pub fn update_snapshot(&self, f: impl FnOnce(&mut SensorSnapshot)) {
        let mut guard = self.snapshot.lock().unwrap();
        f(&mut guard);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled.load(Ordering::Relaxed)
    }

    pub fn set_led(&self, on: bool) {
        self.led_on.store(on, Ordering::Relaxed);
    }

    pub fn led_on(&self) -> bool {
        self.led_on.load(Ordering::Relaxed)
    }
}
