//! Universal-variable two-body propagation.
//!
//! The universal anomaly χ parameterises elliptic, parabolic and hyperbolic motion
//! alike, so a single Newton iteration covers every conic. Time of flight is strictly
//! increasing in χ, which lets the iteration keep a bracket and fall back to bisection
//! whenever a Newton step would leave it.

use std::f64::consts::TAU;

use maneuver_core::vector::{self, Vector3};

use crate::OrbitError;

/// |ψ| below which the Stumpff functions are evaluated from their series.
const SERIES_BAND: f64 = 1e-2;
/// Dimensionless `α·r₀` below which a state is treated as parabolic for the guess.
const PARABOLIC_BAND: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagatorSettings {
    /// Relative tolerance on the universal anomaly.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PropagatorSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-13,
            max_iterations: 100,
        }
    }
}

/// Stumpff functions `c2(ψ)` and `c3(ψ)`.
pub fn stumpff(psi: f64) -> (f64, f64) {
    if psi.abs() < SERIES_BAND {
        // c2 = Σ (-ψ)^k / (2k+2)!, c3 = Σ (-ψ)^k / (2k+3)!
        let mut c2 = 0.0;
        let mut c3 = 0.0;
        let mut term2 = 0.5;
        let mut term3 = 1.0 / 6.0;
        for k in 0..8 {
            c2 += term2;
            c3 += term3;
            let k = k as f64;
            term2 *= -psi / ((2.0 * k + 3.0) * (2.0 * k + 4.0));
            term3 *= -psi / ((2.0 * k + 4.0) * (2.0 * k + 5.0));
        }
        (c2, c3)
    } else if psi > 0.0 {
        let s = psi.sqrt();
        let half = (0.5 * s).sin();
        (2.0 * half * half / psi, (s - s.sin()) / (s * psi))
    } else {
        let s = (-psi).sqrt();
        let half = (0.5 * s).sinh();
        (-2.0 * half * half / psi, (s.sinh() - s) / (s * -psi))
    }
}

/// Advance `(r0, v0)` by `dt` seconds about a body with gravitational parameter `mu`.
pub fn propagate(mu: f64, dt: f64, r0: &Vector3, v0: &Vector3) -> Result<(Vector3, Vector3), OrbitError> {
    propagate_with(mu, dt, r0, v0, &PropagatorSettings::default())
}

/// [`propagate`] with explicit tolerance and iteration cap.
pub fn propagate_with(
    mu: f64,
    dt: f64,
    r0: &Vector3,
    v0: &Vector3,
    settings: &PropagatorSettings,
) -> Result<(Vector3, Vector3), OrbitError> {
    if !(mu > 0.0) || !mu.is_finite() {
        return Err(OrbitError::InvalidInput(format!(
            "gravitational parameter must be positive, got {mu}"
        )));
    }
    if !dt.is_finite() || !vector::is_finite(r0) || !vector::is_finite(v0) {
        return Err(OrbitError::InvalidInput("non-finite propagation input".into()));
    }
    let r0_norm = vector::norm(r0);
    if r0_norm == 0.0 {
        return Err(OrbitError::InvalidInput("position vector has zero length".into()));
    }
    if dt == 0.0 {
        return Ok((*r0, *v0));
    }

    let sqrt_mu = mu.sqrt();
    let v0_sq = vector::dot(v0, v0);
    let sigma0 = vector::dot(r0, v0) / sqrt_mu;
    let alpha = 2.0 / r0_norm - v0_sq / mu;

    let mut dt_eff = dt;
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;
    if alpha * r0_norm > PARABOLIC_BAND {
        let period = TAU / (alpha.powf(1.5) * sqrt_mu);
        dt_eff = dt.rem_euclid(period);
        lo = 0.0;
        hi = TAU / alpha.sqrt();
    }
    let target = sqrt_mu * dt_eff;

    let mut chi = initial_guess(mu, dt_eff, r0, v0, r0_norm, alpha);
    if lo.is_finite() && hi.is_finite() && !(chi > lo && chi < hi) {
        chi = 0.5 * (lo + hi);
    }

    for _ in 0..settings.max_iterations {
        let chi_sq = chi * chi;
        let psi = chi_sq * alpha;
        let (c2, c3) = stumpff(psi);
        let r = chi_sq * c2 + sigma0 * chi * (1.0 - psi * c3) + r0_norm * (1.0 - psi * c2);
        let t = chi_sq * chi * c3 + sigma0 * chi_sq * c2 + r0_norm * chi * (1.0 - psi * c3);
        let residual = target - t;

        if !r.is_finite() || !t.is_finite() {
            break;
        }
        if residual == 0.0 {
            return Ok(lagrange_state(mu, dt_eff, r0, v0, r0_norm, alpha, chi));
        }
        if residual > 0.0 {
            lo = lo.max(chi);
        } else {
            hi = hi.min(chi);
        }

        let newton = if r > 0.0 { chi + residual / r } else { f64::NAN };
        let next = if newton > lo && newton < hi {
            newton
        } else if lo.is_finite() && hi.is_finite() {
            0.5 * (lo + hi)
        } else if newton.is_finite() {
            newton
        } else {
            break;
        };

        if (next - chi).abs() <= settings.tolerance * next.abs().max(1.0) {
            return Ok(lagrange_state(mu, dt_eff, r0, v0, r0_norm, alpha, next));
        }
        chi = next;
    }

    Err(OrbitError::PropagationDidNotConverge {
        iterations: settings.max_iterations,
    })
}

fn initial_guess(mu: f64, dt: f64, r0: &Vector3, v0: &Vector3, r0_norm: f64, alpha: f64) -> f64 {
    let sqrt_mu = mu.sqrt();
    let linear = sqrt_mu * dt / r0_norm;

    if alpha * r0_norm > PARABOLIC_BAND {
        return sqrt_mu * dt * alpha;
    }

    if alpha * r0_norm < -PARABOLIC_BAND {
        let a = 1.0 / alpha;
        let sign = dt.signum();
        let denominator =
            vector::dot(r0, v0) + sign * (-mu * a).sqrt() * (1.0 - r0_norm * alpha);
        let argument = (-2.0 * mu * alpha * dt) / denominator;
        if argument > 0.0 && argument.is_finite() {
            let guess = sign * (-a).sqrt() * argument.ln();
            if guess.is_finite() && guess * sign > 0.0 {
                return guess;
            }
        }
        return linear;
    }

    // Barker's equation for the parabolic case.
    let h = vector::norm(&vector::cross(r0, v0));
    let p = h * h / mu;
    if p <= 0.0 {
        return linear;
    }
    let s = 0.5 * (1.0 / (3.0 * (mu / p.powi(3)).sqrt() * dt)).atan();
    let w = s.tan().cbrt().atan();
    let guess = p.sqrt() * 2.0 / (2.0 * w).tan();
    if guess.is_finite() { guess } else { linear }
}

fn lagrange_state(
    mu: f64,
    dt: f64,
    r0: &Vector3,
    v0: &Vector3,
    r0_norm: f64,
    alpha: f64,
    chi: f64,
) -> (Vector3, Vector3) {
    let sqrt_mu = mu.sqrt();
    let sigma0 = vector::dot(r0, v0) / sqrt_mu;
    let chi_sq = chi * chi;
    let psi = chi_sq * alpha;
    let (c2, c3) = stumpff(psi);
    let r = chi_sq * c2 + sigma0 * chi * (1.0 - psi * c3) + r0_norm * (1.0 - psi * c2);

    let f = 1.0 - chi_sq * c2 / r0_norm;
    let g = dt - chi_sq * chi * c3 / sqrt_mu;
    let f_dot = sqrt_mu / (r * r0_norm) * chi * (psi * c3 - 1.0);
    let g_dot = 1.0 - chi_sq * c2 / r;

    let position = vector::add(&vector::scale(r0, f), &vector::scale(v0, g));
    let velocity = vector::add(&vector::scale(r0, f_dot), &vector::scale(v0, g_dot));
    (position, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const MU: f64 = 398_600.4418;

    #[test]
    fn stumpff_series_matches_closed_form_at_band_edge() {
        let inside = stumpff(SERIES_BAND * 0.999);
        let outside = stumpff(SERIES_BAND * 1.001);
        assert!((inside.0 - outside.0).abs() < 1e-6);
        assert!((inside.1 - outside.1).abs() < 1e-6);
        assert!((stumpff(0.0).0 - 0.5).abs() < 1e-15);
    }

    #[test]
    fn circular_orbit_quarter_period() {
        let r = 7_000.0;
        let v = (MU / r).sqrt();
        let quarter = 0.5 * PI * (r.powi(3) / MU).sqrt();
        let (r1, v1) = propagate(MU, quarter, &[r, 0.0, 0.0], &[0.0, v, 0.0]).unwrap();
        assert!(r1[0].abs() < 1e-6, "{r1:?}");
        assert!((r1[1] - r).abs() < 1e-6, "{r1:?}");
        assert!((v1[0] + v).abs() < 1e-9, "{v1:?}");
    }

    #[test]
    fn circular_radius_holds_across_dense_time_grid() {
        let r = 26_571.0;
        let v = (MU / r).sqrt();
        for step in 0..=4_000 {
            let dt = 18_000.0 + 0.5 * step as f64;
            let (r1, v1) = propagate(MU, dt, &[r, 0.0, 0.0], &[0.0, v, 0.0]).unwrap();
            let radius = vector::norm(&r1);
            assert!((radius - r).abs() < 1e-5, "dt = {dt}: |r| = {radius}");
            assert!((vector::norm(&v1) - v).abs() < 1e-9, "dt = {dt}: {v1:?}");
            let angle = r1[1].atan2(r1[0]).rem_euclid(TAU);
            let expected = (v / r * dt).rem_euclid(TAU);
            let diff = (angle - expected + PI).rem_euclid(TAU) - PI;
            assert!(diff.abs() < 1e-8, "dt = {dt}: angle off by {diff}");
        }
    }

    #[test]
    fn iteration_cap_is_reported() {
        let settings = PropagatorSettings {
            tolerance: 1e-13,
            max_iterations: 1,
        };
        let err = propagate_with(MU, 1_000.0, &[7_000.0, 0.0, 0.0], &[0.0, 9.0, 0.5], &settings).unwrap_err();
        assert_eq!(err, OrbitError::PropagationDidNotConverge { iterations: 1 });
    }

    #[test]
    fn zero_length_position_is_rejected() {
        let err = propagate(MU, 10.0, &[0.0; 3], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, OrbitError::InvalidInput(_)));
    }
}
