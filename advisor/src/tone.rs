//! Tone selection from AOA and per-flap thresholds.
//!
//! Pure functions of their arguments. The AOA regions, evaluated top-down
//! with first match winning:
//!
//! | Region          | Condition                           | Tone | PPS        |
//! |-----------------|-------------------------------------|------|------------|
//! | Stall           | AOA >= stall_warn                   | High | 20 (fixed) |
//! | Approach        | AOA >  onspeed_slow                 | High | 1.5..6.2   |
//! | On-speed        | AOA >= onspeed_fast                 | Low  | 0 (solid)  |
//! | Below on-speed  | AOA >= ldmax (and ldmax < fast)     | Low  | 1.5..8.2   |
//! | Quiet           | otherwise                           | None | 0          |
//!
//! The full-flap case where ldmax >= onspeed_fast collapses the pulsed-low
//! region; the guard on that row keeps the solid-low band contiguous.

use crate::command::ToneKind;
use shared::units::map_range;

/// Fixed pulse rate of the stall warning.
pub const HIGH_TONE_STALL_PPS: f32 = 20.0;
/// Pulse-rate range of the approach (slow side) band.
pub const HIGH_TONE_PPS_MIN: f32 = 1.5;
pub const HIGH_TONE_PPS_MAX: f32 = 6.2;
/// Pulse-rate range of the below-on-speed (fast side) band.
pub const LOW_TONE_PPS_MIN: f32 = 1.5;
pub const LOW_TONE_PPS_MAX: f32 = 8.2;

/// Per-flap AOA thresholds, degrees. Monotone except that full flaps may
/// have `ldmax >= onspeed_fast`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneThresholds {
    pub ldmax: f32,
    pub onspeed_fast: f32,
    pub onspeed_slow: f32,
    pub stall_warn: f32,
}

/// Selected tone and pulse rate. `pps == 0` is a solid tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneResult {
    pub tone: ToneKind,
    pub pps: f32,
}

impl ToneResult {
    pub const SILENT: ToneResult = ToneResult {
        tone: ToneKind::None,
        pps: 0.0,
    };
}

/// Normal-mode tone selection.
pub fn calculate_tone(aoa_deg: f32, th: &ToneThresholds) -> ToneResult {
    if aoa_deg >= th.stall_warn {
        return ToneResult {
            tone: ToneKind::High,
            pps: HIGH_TONE_STALL_PPS,
        };
    }

    if aoa_deg > th.onspeed_slow {
        let pps = map_range(
            aoa_deg,
            th.onspeed_slow,
            th.stall_warn,
            HIGH_TONE_PPS_MIN,
            HIGH_TONE_PPS_MAX,
        );
        return ToneResult {
            tone: ToneKind::High,
            pps,
        };
    }

    if aoa_deg >= th.onspeed_fast {
        return ToneResult {
            tone: ToneKind::Low,
            pps: 0.0,
        };
    }

    if aoa_deg >= th.ldmax && th.ldmax < th.onspeed_fast {
        let pps = map_range(
            aoa_deg,
            th.ldmax,
            th.onspeed_fast,
            LOW_TONE_PPS_MIN,
            LOW_TONE_PPS_MAX,
        );
        return ToneResult {
            tone: ToneKind::Low,
            pps,
        };
    }

    ToneResult::SILENT
}

/// Muted-mode selection: only the stall warning passes, and only with
/// airspeed above the mute threshold.
pub fn calculate_tone_muted(
    aoa_deg: f32,
    ias_kts: f32,
    stall_warn: f32,
    mute_under_ias_kts: f32,
) -> ToneResult {
    if aoa_deg >= stall_warn && ias_kts > mute_under_ias_kts {
        return ToneResult {
            tone: ToneKind::High,
            pps: HIGH_TONE_STALL_PPS,
        };
    }
    ToneResult::SILENT
}

/// Top-level selection as the pressure task applies it each cycle.
///
/// - Audio disabled by the pilot: muted mode (stall only).
/// - Audio enabled but IAS at or below the mute threshold (taxi): silent,
///   with a high internal pulse rate so the tone picks up immediately when
///   airspeed comes alive.
/// - Otherwise: the normal region table.
pub fn select_tone(
    aoa_deg: f32,
    ias_kts: f32,
    audio_enabled: bool,
    th: &ToneThresholds,
    mute_under_ias_kts: f32,
) -> ToneResult {
    if !audio_enabled {
        calculate_tone_muted(aoa_deg, ias_kts, th.stall_warn, mute_under_ias_kts)
    } else if ias_kts <= mute_under_ias_kts {
        ToneResult {
            tone: ToneKind::None,
            pps: HIGH_TONE_STALL_PPS,
        }
    } else {
        calculate_tone(aoa_deg, th)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Typical clean-configuration thresholds.
    const CLEAN: ToneThresholds = ToneThresholds {
        ldmax: 8.03,
        onspeed_fast: 11.25,
        onspeed_slow: 13.84,
        stall_warn: 16.48,
    };

    // Full flaps: ldmax >= onspeed_fast collapses the pulsed-low region.
    const FULL_FLAPS: ToneThresholds = ToneThresholds {
        ldmax: 10.0,
        onspeed_fast: 9.0,
        onspeed_slow: 12.0,
        stall_warn: 15.0,
    };

    #[test]
    fn test_below_ldmax_quiet() {
        let r = calculate_tone(5.0, &CLEAN);
        assert_eq!(r.tone, ToneKind::None);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_at_ldmax_pulsed_low_min() {
        let r = calculate_tone(CLEAN.ldmax, &CLEAN);
        assert_eq!(r.tone, ToneKind::Low);
        assert_relative_eq!(r.pps, LOW_TONE_PPS_MIN, epsilon = 0.01);
    }

    #[test]
    fn test_midway_pulsed_low() {
        let mid = (CLEAN.ldmax + CLEAN.onspeed_fast) / 2.0;
        let r = calculate_tone(mid, &CLEAN);
        assert_eq!(r.tone, ToneKind::Low);
        assert_relative_eq!(
            r.pps,
            (LOW_TONE_PPS_MIN + LOW_TONE_PPS_MAX) / 2.0,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_at_onspeed_fast_solid_low() {
        let r = calculate_tone(CLEAN.onspeed_fast, &CLEAN);
        assert_eq!(r.tone, ToneKind::Low);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_onspeed_band_solid_low() {
        let mid = (CLEAN.onspeed_fast + CLEAN.onspeed_slow) / 2.0;
        let r = calculate_tone(mid, &CLEAN);
        assert_eq!(r.tone, ToneKind::Low);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_at_onspeed_slow_still_solid_low() {
        let r = calculate_tone(CLEAN.onspeed_slow, &CLEAN);
        assert_eq!(r.tone, ToneKind::Low);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_just_above_onspeed_slow_pulsed_high() {
        let r = calculate_tone(CLEAN.onspeed_slow + 0.01, &CLEAN);
        assert_eq!(r.tone, ToneKind::High);
        assert!(r.pps >= HIGH_TONE_PPS_MIN);
        assert!(r.pps < HIGH_TONE_PPS_MAX);
    }

    #[test]
    fn test_midway_pulsed_high() {
        let mid = (CLEAN.onspeed_slow + CLEAN.stall_warn) / 2.0;
        let r = calculate_tone(mid, &CLEAN);
        assert_eq!(r.tone, ToneKind::High);
        assert_relative_eq!(
            r.pps,
            (HIGH_TONE_PPS_MIN + HIGH_TONE_PPS_MAX) / 2.0,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_at_stall_warn_fixed_pps() {
        let r = calculate_tone(CLEAN.stall_warn, &CLEAN);
        assert_eq!(r.tone, ToneKind::High);
        assert_relative_eq!(r.pps, HIGH_TONE_STALL_PPS);
    }

    #[test]
    fn test_far_above_stall_warn() {
        let r = calculate_tone(25.0, &CLEAN);
        assert_eq!(r.tone, ToneKind::High);
        assert_relative_eq!(r.pps, HIGH_TONE_STALL_PPS);
    }

    #[test]
    fn test_full_flaps_collapsed_region_goes_solid() {
        // Between onspeed_fast (9) and ldmax (10): the pulsed-low guard is
        // false, so this is solid low.
        let r = calculate_tone(9.5, &FULL_FLAPS);
        assert_eq!(r.tone, ToneKind::Low);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_full_flaps_below_both_quiet() {
        let r = calculate_tone(7.0, &FULL_FLAPS);
        assert_eq!(r.tone, ToneKind::None);
    }

    #[test]
    fn test_muted_stall_passes_with_airspeed() {
        let r = calculate_tone_muted(17.0, 80.0, CLEAN.stall_warn, 25.0);
        assert_eq!(r.tone, ToneKind::High);
        assert_relative_eq!(r.pps, HIGH_TONE_STALL_PPS);
    }

    #[test]
    fn test_muted_stall_blocked_below_mute_ias() {
        let r = calculate_tone_muted(17.0, 20.0, CLEAN.stall_warn, 25.0);
        assert_eq!(r.tone, ToneKind::None);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_muted_normal_aoa_silent() {
        let r = calculate_tone_muted(12.0, 80.0, CLEAN.stall_warn, 25.0);
        assert_eq!(r.tone, ToneKind::None);
    }

    #[test]
    fn test_select_tone_taxi_silent_with_high_internal_pps() {
        let r = select_tone(12.0, 20.0, true, &CLEAN, 25.0);
        assert_eq!(r.tone, ToneKind::None);
        assert_relative_eq!(r.pps, HIGH_TONE_STALL_PPS);
    }

    #[test]
    fn test_select_tone_normal_path() {
        let r = select_tone(12.0, 80.0, true, &CLEAN, 25.0);
        assert_eq!(r.tone, ToneKind::Low);
        assert_eq!(r.pps, 0.0);
    }

    #[test]
    fn test_select_tone_muted_path() {
        let r = select_tone(17.0, 80.0, false, &CLEAN, 25.0);
        assert_eq!(r.tone, ToneKind::High);
        let r = select_tone(17.0, 20.0, false, &CLEAN, 25.0);
        assert_eq!(r.tone, ToneKind::None);
    }

    #[test]
    fn test_monotone_escalation() {
        // Sweeping AOA upward never de-escalates the tone ordering
        // quiet -> pulsed low -> solid low -> pulsed high -> stall.
        fn severity(r: &ToneResult, th: &ToneThresholds, aoa: f32) -> u8 {
            match (r.tone, r.pps) {
                (ToneKind::None, _) => 0,
                (ToneKind::Low, pps) if pps > 0.0 => 1,
                (ToneKind::Low, _) => 2,
                (ToneKind::High, pps) if aoa < th.stall_warn && pps < HIGH_TONE_STALL_PPS => 3,
                (ToneKind::High, _) => 4,
            }
        }

        let mut prev = 0u8;
        let mut aoa = 0.0f32;
        while aoa < 20.0 {
            let r = calculate_tone(aoa, &CLEAN);
            let sev = severity(&r, &CLEAN, aoa);
            assert!(sev >= prev, "tone de-escalated at AOA {aoa}: {sev} < {prev}");
            prev = sev;
            aoa += 0.01;
        }
        assert_eq!(prev, 4);
    }
}
