//! Savitzky-Golay first-derivative filter.
//!
//! Computes the smoothed first derivative of a sampled input using the
//! antisymmetric convolution coefficients for a quadratic/cubic fit
//! (Savitzky & Golay, Analytical Chemistry, 1964). Used for the
//! airspeed-derivative (deceleration) channel.
//!
//! The window must be odd and between 5 and 25; anything else falls back to
//! 15 with a warning. The buffer is f64: the derivative subtracts
//! nearly-equal neighboring samples, which sheds precision in f32.

use tracing::warn;

/// Largest supported window.
const MAX_WINDOW: usize = 25;

/// Smallest supported window.
const MIN_WINDOW: usize = 5;

/// Fallback window for invalid configuration.
const DEFAULT_WINDOW: usize = 15;

/// First-derivative filter over a sliding odd-length window.
///
/// Output is the derivative *per sample*; callers multiply by the sample
/// rate to get a per-second derivative. Returns 0 until the window has been
/// fully populated.
#[derive(Debug, Clone)]
pub struct SgDerivative {
    window: usize,
    /// Normalization 2 * sum(i^2) = k(k+1)(2k+1)/3 for k = (window-1)/2.
    norm: f64,
    buffer: [f64; MAX_WINDOW],
    fill_count: usize,
}

impl SgDerivative {
    /// Create a filter with the given odd window in `[5, 25]`.
    ///
    /// Invalid sizes default to 15 (logged once here).
    pub fn new(window: usize) -> Self {
        let window = if !(MIN_WINDOW..=MAX_WINDOW).contains(&window) || window % 2 == 0 {
            warn!(
                requested = window,
                fallback = DEFAULT_WINDOW,
                "invalid Savitzky-Golay window, using default"
            );
            DEFAULT_WINDOW
        } else {
            window
        };

        let k = ((window - 1) / 2) as f64;
        let norm = k * (k + 1.0) * (2.0 * k + 1.0) / 3.0;

        Self {
            window,
            norm,
            buffer: [0.0; MAX_WINDOW],
            fill_count: 0,
        }
    }

    /// The window actually in use (after fallback).
    pub fn window(&self) -> usize {
        self.window
    }

    /// Push a sample and return the smoothed per-sample derivative.
    ///
    /// The first `window` calls fill the buffer and return 0; from then on
    /// the window slides one sample per call.
    pub fn compute(&mut self, sample: f64) -> f32 {
        if self.fill_count < self.window {
            self.buffer[self.fill_count] = sample;
            self.fill_count += 1;
            return 0.0;
        }

        // Slide the window: shift left, append the new sample.
        for i in 0..self.window - 1 {
            self.buffer[i] = self.buffer[i + 1];
        }
        self.buffer[self.window - 1] = sample;

        // Antisymmetric coefficients: the center contributes nothing, each
        // pair (k+i, k-i) contributes i * (newer - older).
        let half = self.window / 2;
        let mut sum = 0.0;
        for i in 1..=half {
            sum += i as f64 * (self.buffer[half + i] - self.buffer[half - i]);
        }

        (sum / self.norm) as f32
    }

    /// Return to the unfilled state.
    pub fn reset(&mut self) {
        self.fill_count = 0;
        self.buffer = [0.0; MAX_WINDOW];
    }
}
