//! Closed-form Hohmann reference between circular, coplanar orbits.
//!
//! The window search and the global search are checked against these numbers.

use std::f64::consts::PI;

use crate::ManeuverError;

/// Burns, coast time and departure phase of the half-ellipse joining two circles.
///
/// Burn values carry a sign: positive is prograde, negative retrograde. Lowering the
/// orbit therefore yields two negative burns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HohmannResult {
    pub departure_delta_v: f64,
    pub arrival_delta_v: f64,
    /// Sum of the burn magnitudes.
    pub total_delta_v: f64,
    /// Half the period of the transfer ellipse, in seconds.
    pub transfer_time: f64,
    /// Angle the target must lead the vessel by at departure, in radians.
    pub phase_angle: f64,
}

/// Hohmann transfer from radius `from` to radius `to` about a body with parameter `mu`.
pub fn hohmann(from: f64, to: f64, mu: f64) -> Result<HohmannResult, ManeuverError> {
    if !(from > 0.0 && to > 0.0 && mu > 0.0) {
        return Err(ManeuverError::InvalidInput(format!(
            "Hohmann transfer needs positive radii and mu (from = {from}, to = {to}, mu = {mu})"
        )));
    }

    let semi_major_axis = 0.5 * (from + to);
    let vis_viva = |r: f64| (mu * (2.0 / r - 1.0 / semi_major_axis)).sqrt();
    let circular = |r: f64| (mu / r).sqrt();

    let departure_delta_v = vis_viva(from) - circular(from);
    let arrival_delta_v = circular(to) - vis_viva(to);
    let transfer_time = PI * (semi_major_axis.powi(3) / mu).sqrt();
    let target_sweep = transfer_time * (mu / to.powi(3)).sqrt();

    Ok(HohmannResult {
        departure_delta_v,
        arrival_delta_v,
        total_delta_v: departure_delta_v.abs() + arrival_delta_v.abs(),
        transfer_time,
        phase_angle: PI - target_sweep,
    })
}
