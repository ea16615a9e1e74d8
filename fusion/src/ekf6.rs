//! Six-state extended Kalman filter for attitude and angle-of-attack.
//!
//! State vector `x = [phi, theta, alpha, bp, bq, br]`:
//!
//! | Index | Symbol | Description          | Units |
//! |-------|--------|----------------------|-------|
//! | 0     | phi    | Roll angle           | rad   |
//! | 1     | theta  | Pitch angle          | rad   |
//! | 2     | alpha  | Angle of attack      | rad   |
//! | 3     | bp     | Roll-rate gyro bias  | rad/s |
//! | 4     | bq     | Pitch-rate gyro bias | rad/s |
//! | 5     | br     | Yaw-rate gyro bias   | rad/s |
//!
//! Measurements `z = [ax, ay, az, alpha_meas]` with `alpha_meas = theta -
//! gamma`, gamma being the flight path angle from the vertical channel.
//!
//! The predict step integrates the Euler-angle kinematics with
//! bias-corrected rates; the correct step fuses the gravity direction seen
//! by the accelerometers plus the derived alpha. Both steps exploit the
//! sparsity of F (identity rows 2..5) and H (six non-zero entries) with
//! scalar locals; the covariance update uses the Joseph form to keep P
//! symmetric positive-definite in f32 arithmetic. The test module carries a
//! frozen dense reference and asserts equivalence every cycle.
//!
//! Known limitation: the Euler representation is singular at theta = ±90
//! degrees. The `SINGULARITY_THRESHOLD` clamp keeps tan(theta) finite, so
//! the filter survives aerobatic attitudes but does not track them
//! accurately.
//!
//! Accelerometer sign convention: body NED (x forward, y right, z down),
//! sensors report the reaction to gravity, so level flight reads
//! `az = -g`. Non-gravitational accelerations (TAS-dot, centripetal) are
//! removed upstream before the filter sees the data.

use serde::{Deserialize, Serialize};
use shared::units::{rad2deg, GRAVITY_MPS2};

/// Number of states.
pub const N_STATES: usize = 6;

/// Number of measurements.
pub const N_MEAS: usize = 4;

/// Clamp for |cos(theta)| near the +/-90 degree pitch singularity.
/// Limits tan(theta) to roughly +/-1000.
const SINGULARITY_THRESHOLD: f32 = 1e-3;

/// Pivot floor for the 4x4 innovation inversion; below this the correction
/// step is skipped and state/covariance are left untouched.
const PIVOT_FLOOR: f32 = 1e-10;

/// Filter tuning parameters.
///
/// Process noise (Q diagonal) trades model trust against measurement trust;
/// measurement noise (R diagonal) describes the sensors; the P0 diagonal is
/// the starting uncertainty restored by [`Ekf6::init`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ekf6Config {
    /// Attitude process noise (rad^2).
    pub q_attitude: f32,
    /// Alpha process noise (rad^2).
    pub q_alpha: f32,
    /// Gyro-bias drift ((rad/s)^2).
    pub q_bias: f32,
    /// Accelerometer measurement variance ((m/s^2)^2).
    pub r_accel: f32,
    /// Alpha measurement variance (rad^2).
    pub r_alpha: f32,
    /// Initial attitude uncertainty (rad^2).
    pub p_attitude: f32,
    /// Initial alpha uncertainty (rad^2).
    pub p_alpha: f32,
    /// Initial bias uncertainty ((rad/s)^2).
    pub p_bias: f32,
}

impl Default for Ekf6Config {
    fn default() -> Self {
        Self {
            q_attitude: 1e-3,
            q_alpha: 1e-4,
            q_bias: 1e-8,
            r_accel: 0.5,
            r_alpha: 1e-2,
            p_attitude: 0.1,
            p_alpha: 0.1,
            p_bias: 1e-2,
        }
    }
}

/// Sensor inputs for one update cycle, SI units.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ekf6Measurements {
    /// Forward accelerometer (m/s^2), positive forward.
    pub ax: f32,
    /// Lateral accelerometer (m/s^2), positive right.
    pub ay: f32,
    /// Vertical accelerometer (m/s^2), positive down; level flight reads -g.
    pub az: f32,
    /// Roll rate (rad/s).
    pub p: f32,
    /// Pitch rate (rad/s).
    pub q: f32,
    /// Yaw rate (rad/s).
    pub r: f32,
    /// Flight path angle (rad), asin(VSI/TAS).
    pub gamma: f32,
}

/// State estimate with degree-convenience accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ekf6State {
    pub phi: f32,
    pub theta: f32,
    pub alpha: f32,
    pub bp: f32,
    pub bq: f32,
    pub br: f32,
}

impl Ekf6State {
    pub fn phi_deg(&self) -> f32 {
        rad2deg(self.phi)
    }

    pub fn theta_deg(&self) -> f32 {
        rad2deg(self.theta)
    }

    pub fn alpha_deg(&self) -> f32 {
        rad2deg(self.alpha)
    }

    pub fn bp_dps(&self) -> f32 {
        rad2deg(self.bp)
    }

    pub fn bq_dps(&self) -> f32 {
        rad2deg(self.bq)
    }

    pub fn br_dps(&self) -> f32 {
        rad2deg(self.br)
    }
}

/// Six-state extended Kalman filter.
#[derive(Debug, Clone)]
pub struct Ekf6 {
    config: Ekf6Config,
    x: [f32; N_STATES],
    p: [[f32; N_STATES]; N_STATES],
    /// Process noise diagonal.
    q: [f32; N_STATES],
    /// Measurement noise diagonal.
    r: [f32; N_MEAS],
}

impl Default for Ekf6 {
    fn default() -> Self {
        Self::new(Ekf6Config::default())
    }
}

impl Ekf6 {
    pub fn new(config: Ekf6Config) -> Self {
        let q = [
            config.q_attitude,
            config.q_attitude,
            config.q_alpha,
            config.q_bias,
            config.q_bias,
            config.q_bias,
        ];
        let r = [config.r_accel, config.r_accel, config.r_accel, config.r_alpha];
        let mut ekf = Self {
            config,
            x: [0.0; N_STATES],
            p: [[0.0; N_STATES]; N_STATES],
            q,
            r,
        };
        ekf.init(0.0, 0.0);
        ekf
    }

    /// Reset the filter to a known attitude.
    ///
    /// Call at startup with the accelerometer-derived attitude, or after a
    /// sensor dropout to restart estimation.
    pub fn init(&mut self, initial_phi: f32, initial_theta: f32) {
        self.x = [initial_phi, initial_theta, 0.0, 0.0, 0.0, 0.0];
        self.p = [[0.0; N_STATES]; N_STATES];
        self.p[0][0] = self.config.p_attitude;
        self.p[1][1] = self.config.p_attitude;
        self.p[2][2] = self.config.p_alpha;
        self.p[3][3] = self.config.p_bias;
        self.p[4][4] = self.config.p_bias;
        self.p[5][5] = self.config.p_bias;
    }

    /// One predict + correct cycle. `dt` must be positive; callers substitute
    /// the nominal sample period when the measured value is not.
    pub fn update(&mut self, meas: &Ekf6Measurements, dt: f32) {
        self.predict(meas.p, meas.q, meas.r, dt);
        self.correct(meas.ax, meas.ay, meas.az, meas.gamma, GRAVITY_MPS2);
    }

    pub fn state(&self) -> Ekf6State {
        Ekf6State {
            phi: self.x[0],
            theta: self.x[1],
            alpha: self.x[2],
            bp: self.x[3],
            bq: self.x[4],
            br: self.x[5],
        }
    }

    pub fn config(&self) -> &Ekf6Config {
        &self.config
    }

    /// Zero row and column 2 of P and restore `P[2][2] = p_alpha`.
    ///
    /// Invoked when airspeed first rises above the alive threshold so the
    /// first in-flight alpha correction is not biased by stale ground
    /// covariance.
    pub fn reset_alpha_cov(&mut self) {
        for i in 0..N_STATES {
            self.p[2][i] = 0.0;
            self.p[i][2] = 0.0;
        }
        self.p[2][2] = self.config.p_alpha;
    }

    #[cfg(test)]
    pub(crate) fn x_raw(&self) -> &[f32; N_STATES] {
        &self.x
    }

    #[cfg(test)]
    pub(crate) fn p_raw(&self) -> &[[f32; N_STATES]; N_STATES] {
        &self.p
    }

    /// Prediction step: propagate state and covariance using the gyros.
    ///
    /// Euler-angle kinematics with bias-corrected rates:
    ///
    /// ```text
    /// phi_dot   = p_c + q_c sin(phi) tan(theta) + r_c cos(phi) tan(theta)
    /// theta_dot = q_c cos(phi) - r_c sin(phi)
    /// alpha_dot = 0, bias_dot = 0
    /// ```
    fn predict(&mut self, p_meas: f32, q_meas: f32, r_meas: f32, dt: f32) {
        let phi = self.x[0];
        let theta = self.x[1];

        let p_corr = p_meas - self.x[3];
        let q_corr = q_meas - self.x[4];
        let r_corr = r_meas - self.x[5];

        let sph = phi.sin();
        let cph = phi.cos();
        let mut cth = theta.cos();

        // Singularity protection at theta = +/-90 degrees.
        if cth.abs() < SINGULARITY_THRESHOLD {
            cth = if cth >= 0.0 {
                SINGULARITY_THRESHOLD
            } else {
                -SINGULARITY_THRESHOLD
            };
        }

        let sth = theta.sin();
        let tth = sth / cth;

        let phi_dot = p_corr + q_corr * sph * tth + r_corr * cph * tth;
        let theta_dot = q_corr * cph - r_corr * sph;

        // Forward-Euler state integration; alpha and biases are modeled as
        // constant (drift enters through Q).
        self.x[0] = phi + dt * phi_dot;
        self.x[1] = theta + dt * theta_dot;

        // State-transition Jacobian F = I + dt * A. Rows 2..5 are identity,
        // so only the eight non-trivial entries are kept as scalars.
        let f00 = 1.0 + dt * (q_corr * cph * tth - r_corr * sph * tth);
        let sec2th = 1.0 + tth * tth;
        let f01 = dt * (q_corr * sph * sec2th + r_corr * cph * sec2th);
        let f03 = -dt;
        let f04 = -dt * sph * tth;
        let f05 = -dt * cph * tth;

        let f10 = dt * (-q_corr * sph - r_corr * cph);
        let f14 = -dt * cph;
        let f15 = dt * sph;

        // FP = F * P. Rows 2..5 of F are identity, so those rows of FP are
        // the corresponding rows of P copied through.
        let mut fp = [[0.0f32; N_STATES]; N_STATES];
        for j in 0..N_STATES {
            fp[0][j] = f00 * self.p[0][j]
                + f01 * self.p[1][j]
                + f03 * self.p[3][j]
                + f04 * self.p[4][j]
                + f05 * self.p[5][j];
            fp[1][j] =
                f10 * self.p[0][j] + self.p[1][j] + f14 * self.p[4][j] + f15 * self.p[5][j];
        }
        for i in 2..N_STATES {
            fp[i] = self.p[i];
        }

        // P_new = FP * F'. Columns 2..5 of F' are identity, so only columns
        // 0 and 1 need dot products; the rest copy through from FP.
        let mut p_new = [[0.0f32; N_STATES]; N_STATES];
        for i in 0..N_STATES {
            p_new[i][0] = fp[i][0] * f00
                + fp[i][1] * f01
                + fp[i][3] * f03
                + fp[i][4] * f04
                + fp[i][5] * f05;
            p_new[i][1] = fp[i][0] * f10 + fp[i][1] + fp[i][4] * f14 + fp[i][5] * f15;
            p_new[i][2] = fp[i][2];
            p_new[i][3] = fp[i][3];
            p_new[i][4] = fp[i][4];
            p_new[i][5] = fp[i][5];
        }

        // Q is diagonal.
        for i in 0..N_STATES {
            p_new[i][i] += self.q[i];
        }

        self.p = p_new;
    }

    /// Correction step: fuse accelerometers and the derived alpha.
    ///
    /// Predicted measurement (gravity in body frame, 1G flight assumption):
    ///
    /// ```text
    /// ax_pred =  g sin(theta)
    /// ay_pred = -g cos(theta) sin(phi)
    /// az_pred = -g cos(theta) cos(phi)
    /// alpha_pred = alpha
    /// ```
    fn correct(&mut self, ax: f32, ay: f32, az: f32, gamma: f32, g: f32) {
        let phi = self.x[0];
        let theta = self.x[1];
        let alpha = self.x[2];

        let sph = phi.sin();
        let cph = phi.cos();
        let sth = theta.sin();
        let cth = theta.cos();

        let z_pred = [g * sth, -g * cth * sph, -g * cth * cph, alpha];

        // Measurement Jacobian H (4x6) has six non-zero entries, kept as
        // scalars. H[3][2] = 1 is implicit.
        let h01 = g * cth;
        let h10 = -g * cth * cph;
        let h11 = g * sth * sph;
        let h20 = g * cth * sph;
        let h21 = g * sth * cph;

        let alpha_meas = theta - gamma;
        let z = [ax, ay, az, alpha_meas];

        let mut y = [0.0f32; N_MEAS];
        for i in 0..N_MEAS {
            y[i] = z[i] - z_pred[i];
        }

        // HP = H * P: each H row touches at most two states.
        let mut hp = [[0.0f32; N_STATES]; N_MEAS];
        for j in 0..N_STATES {
            hp[0][j] = h01 * self.p[1][j];
            hp[1][j] = h10 * self.p[0][j] + h11 * self.p[1][j];
            hp[2][j] = h20 * self.p[0][j] + h21 * self.p[1][j];
            hp[3][j] = self.p[2][j];
        }

        // S = HP * H' + R.
        let mut s = [[0.0f32; N_MEAS]; N_MEAS];
        for i in 0..N_MEAS {
            s[i][0] = hp[i][1] * h01;
            s[i][1] = hp[i][0] * h10 + hp[i][1] * h11;
            s[i][2] = hp[i][0] * h20 + hp[i][1] * h21;
            s[i][3] = hp[i][2];
            s[i][i] += self.r[i];
        }

        // Singular innovation: skip this correction, recover on the next
        // in-range measurement.
        let s_inv = match invert4x4(&s) {
            Some(inv) => inv,
            None => return,
        };

        // PHt = P * H'.
        let mut pht = [[0.0f32; N_MEAS]; N_STATES];
        for i in 0..N_STATES {
            pht[i][0] = self.p[i][1] * h01;
            pht[i][1] = self.p[i][0] * h10 + self.p[i][1] * h11;
            pht[i][2] = self.p[i][0] * h20 + self.p[i][1] * h21;
            pht[i][3] = self.p[i][2];
        }

        // K = PHt * S_inv (dense; S_inv is generally full).
        let mut k = [[0.0f32; N_MEAS]; N_STATES];
        for i in 0..N_STATES {
            for j in 0..N_MEAS {
                let mut acc = 0.0;
                for m in 0..N_MEAS {
                    acc += pht[i][m] * s_inv[m][j];
                }
                k[i][j] = acc;
            }
        }

        // x = x + K y.
        for i in 0..N_STATES {
            for j in 0..N_MEAS {
                self.x[i] += k[i][j] * y[j];
            }
        }

        // IKH = I - K*H. H columns 3..5 are zero, so those IKH columns are
        // identity columns.
        let mut ikh = [[0.0f32; N_STATES]; N_STATES];
        for (i, row) in ikh.iter_mut().enumerate() {
            row[0] = if i == 0 { 1.0 } else { 0.0 };
            row[0] -= k[i][1] * h10 + k[i][2] * h20;
            row[1] = if i == 1 { 1.0 } else { 0.0 };
            row[1] -= k[i][0] * h01 + k[i][1] * h11 + k[i][2] * h21;
            row[2] = if i == 2 { 1.0 } else { 0.0 };
            row[2] -= k[i][3];
            row[3] = if i == 3 { 1.0 } else { 0.0 };
            row[4] = if i == 4 { 1.0 } else { 0.0 };
            row[5] = if i == 5 { 1.0 } else { 0.0 };
        }

        // IKHP = IKH * P.
        let mut ikhp = [[0.0f32; N_STATES]; N_STATES];
        for i in 0..N_STATES {
            for j in 0..N_STATES {
                let mut acc = 0.0;
                for m in 0..N_STATES {
                    acc += ikh[i][m] * self.p[m][j];
                }
                ikhp[i][j] = acc;
            }
        }

        // Joseph form: P = IKHP * IKH' + K * R * K'.
        let mut p_new = [[0.0f32; N_STATES]; N_STATES];
        for i in 0..N_STATES {
            for j in 0..N_STATES {
                let mut acc = 0.0;
                for m in 0..N_STATES {
                    acc += ikhp[i][m] * ikh[j][m];
                }
                for m in 0..N_MEAS {
                    acc += k[i][m] * self.r[m] * k[j][m];
                }
                p_new[i][j] = acc;
            }
        }

        self.p = p_new;
    }
}

/// Invert a 4x4 matrix by Gauss-Jordan elimination with partial pivoting.
///
/// Returns `None` when the largest available pivot falls below the floor,
/// which the caller treats as a transient singular innovation.
fn invert4x4(a: &[[f32; N_MEAS]; N_MEAS]) -> Option<[[f32; N_MEAS]; N_MEAS]> {
    // Augmented [A | I].
    let mut work = [[0.0f32; N_MEAS * 2]; N_MEAS];
    for i in 0..N_MEAS {
        for j in 0..N_MEAS {
            work[i][j] = a[i][j];
        }
        work[i][i + N_MEAS] = 1.0;
    }

    for col in 0..N_MEAS {
        // Partial pivot: pick the row with the largest magnitude in this
        // column.
        let mut max_row = col;
        let mut max_val = work[col][col].abs();
        for (row, w) in work.iter().enumerate().skip(col + 1) {
            let val = w[col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < PIVOT_FLOOR {
            return None;
        }

        if max_row != col {
            work.swap(col, max_row);
        }

        let pivot = work[col][col];
        for j in 0..N_MEAS * 2 {
            work[col][j] /= pivot;
        }

        for row in 0..N_MEAS {
            if row != col {
                let factor = work[row][col];
                for j in 0..N_MEAS * 2 {
                    work[row][j] -= factor * work[col][j];
                }
            }
        }
    }

    let mut inv = [[0.0f32; N_MEAS]; N_MEAS];
    for i in 0..N_MEAS {
        for j in 0..N_MEAS {
            inv[i][j] = work[i][j + N_MEAS];
        }
    }
    Some(inv)
}
