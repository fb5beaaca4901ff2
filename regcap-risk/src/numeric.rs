//! Normal distribution approximations used by the IRB formula
//!
//! Both functions are pure and deterministic. Error bounds are against the
//! exact standard normal distribution:
//!
//! | function   | method                                   | max abs error        |
//! |------------|------------------------------------------|----------------------|
//! | `norm_cdf` | Abramowitz & Stegun 26.2.17              | 7.5e-8 on all reals  |
//! | `norm_inv` | Winitzki erf⁻¹ (a = 0.147), odd symmetry | 8e-3 on (0, 1)       |
//!
//! `norm_inv` loses accuracy in the tails; at p = 0.999 it returns
//! 3.08464 against an exact 3.09023.

use std::f64::consts::{PI, SQRT_2};

const AS_P: f64 = 0.231_641_9;
const AS_B: [f64; 5] = [
    0.319_381_530,
    -0.356_563_782,
    1.781_477_937,
    -1.821_255_978,
    1.330_274_429,
];

const WINITZKI_A: f64 = 0.147;

/// Standard normal density
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Cumulative standard normal N(x)
pub fn norm_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let ax = x.abs();
    let t = 1.0 / (1.0 + AS_P * ax);
    let poly = t * (AS_B[0] + t * (AS_B[1] + t * (AS_B[2] + t * (AS_B[3] + t * AS_B[4]))));
    let upper = 1.0 - norm_pdf(ax) * poly;
    if x >= 0.0 {
        upper
    } else {
        1.0 - upper
    }
}

/// Inverse error function (Winitzki closed form)
fn erf_inv(x: f64) -> f64 {
    let ln = (1.0 - x * x).ln();
    let t = 2.0 / (PI * WINITZKI_A) + ln / 2.0;
    let magnitude = ((t * t - ln / WINITZKI_A).sqrt() - t).sqrt();
    magnitude.copysign(x)
}

/// Inverse cumulative standard normal G(p).
///
/// Returns NaN outside the open interval (0, 1); callers guard the
/// boundary before calling.
pub fn norm_inv(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    if p < 0.5 {
        return -norm_inv(1.0 - p);
    }
    SQRT_2 * erf_inv(2.0 * p - 1.0)
}
