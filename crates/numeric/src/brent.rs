//! Bracketed scalar root finding (Brent–Dekker).

use std::time::{Duration, Instant};

use maneuver_core::ErrorKind;
use thiserror::Error;

/// Termination budget for [`find_root`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootFinderSettings {
    /// Absolute tolerance on the abscissa.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Optional wall-clock budget checked once per iteration.
    pub time_budget: Option<Duration>,
}

impl Default for RootFinderSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            time_budget: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RootFindError {
    #[error("interval [{a}, {b}] does not bracket a sign change (f(a) = {fa}, f(b) = {fb})")]
    InvalidBracket { a: f64, b: f64, fa: f64, fb: f64 },
    #[error("root finder exhausted its budget after {iterations} iterations")]
    Timeout { iterations: usize },
    #[error("function returned a non-finite value at x = {x}")]
    NonFiniteValue { x: f64 },
}

impl RootFindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RootFindError::InvalidBracket { .. } => ErrorKind::InvalidInput,
            RootFindError::Timeout { .. } | RootFindError::NonFiniteValue { .. } => {
                ErrorKind::NoConvergence
            }
        }
    }
}

/// Locate a root of `f` inside `[a, b]`.
///
/// `f(a)` and `f(b)` must have opposite signs (or one of them must be zero). The
/// iteration mixes inverse quadratic interpolation, the secant rule and bisection and
/// always keeps the root bracketed.
pub fn find_root<F>(mut f: F, a: f64, b: f64, settings: &RootFinderSettings) -> Result<f64, RootFindError>
where
    F: FnMut(f64) -> f64,
{
    let started = Instant::now();
    let (mut a, mut b) = (a, b);
    let mut fa = f(a);
    let mut fb = f(b);

    if !a.is_finite() || !b.is_finite() || !fa.is_finite() || !fb.is_finite() || fa * fb > 0.0 {
        return Err(RootFindError::InvalidBracket { a, b, fa, fb });
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }

    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let tolerance = settings.tolerance.max(f64::EPSILON);
    let mut c = a;
    let mut fc = fa;
    let mut d = c;
    let mut bisected = true;

    for _ in 0..settings.max_iterations {
        if fb == 0.0 || (b - a).abs() < tolerance {
            return Ok(b);
        }
        if settings
            .time_budget
            .is_some_and(|budget| started.elapsed() > budget)
        {
            break;
        }

        let mut s = if fa != fc && fb != fc {
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            b - fb * (b - a) / (fb - fa)
        };

        let quarter = (3.0 * a + b) / 4.0;
        let outside = !((s > quarter && s < b) || (s < quarter && s > b));
        let slow_after_bisect = bisected && (s - b).abs() >= (b - c).abs() / 2.0;
        let slow_after_interp = !bisected && (s - b).abs() >= (c - d).abs() / 2.0;
        let tiny_after_bisect = bisected && (b - c).abs() < tolerance;
        let tiny_after_interp = !bisected && (c - d).abs() < tolerance;

        if outside || slow_after_bisect || slow_after_interp || tiny_after_bisect || tiny_after_interp {
            s = 0.5 * (a + b);
            bisected = true;
        } else {
            bisected = false;
        }

        let fs = f(s);
        if !fs.is_finite() {
            return Err(RootFindError::NonFiniteValue { x: s });
        }

        d = c;
        c = b;
        fc = fb;

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(RootFindError::Timeout {
        iterations: settings.max_iterations,
    })
}
