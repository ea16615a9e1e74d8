//! Pressure altitude from static pressure via the ISA model.

/// Pressure altitude in feet from bias-corrected static pressure in
/// millibars.
///
/// Returns `None` when the corrected pressure is non-positive (sensor fault
/// or absurd bias); callers hold the previous altitude in that case.
pub fn pressure_altitude_ft(static_mbar: f32, static_bias_mbar: f32) -> Option<f32> {
    let corrected = static_mbar - static_bias_mbar;
    if corrected <= 0.0 {
        return None;
    }
    Some(145_366.45 * (1.0 - (corrected / 1013.25).powf(0.190_284)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_atmosphere_is_zero() {
        let palt = pressure_altitude_ft(1013.25, 0.0).unwrap();
        assert_relative_eq!(palt, 0.0, epsilon = 0.5);
    }

    #[test]
    fn test_known_altitudes() {
        // ISA: ~850 mbar corresponds to roughly 4,780 ft
        let palt = pressure_altitude_ft(850.0, 0.0).unwrap();
        assert!((4500.0..5100.0).contains(&palt), "palt {palt}");

        // ~700 mbar is close to 9,880 ft
        let palt = pressure_altitude_ft(700.0, 0.0).unwrap();
        assert!((9500.0..10300.0).contains(&palt), "palt {palt}");
    }

    #[test]
    fn test_bias_is_subtracted() {
        let unbiased = pressure_altitude_ft(1013.25, 0.0).unwrap();
        let biased = pressure_altitude_ft(1015.25, 2.0).unwrap();
        assert_relative_eq!(unbiased, biased, epsilon = 0.1);
    }

    #[test]
    fn test_non_positive_pressure_rejected() {
        assert!(pressure_altitude_ft(0.0, 0.0).is_none());
        assert!(pressure_altitude_ft(5.0, 10.0).is_none());
    }

    #[test]
    fn test_low_pressure_is_high_altitude() {
        let low = pressure_altitude_ft(900.0, 0.0).unwrap();
        let high = pressure_altitude_ft(1000.0, 0.0).unwrap();
        assert!(low > high);
    }
}
