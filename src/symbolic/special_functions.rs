//! Numeric values of the special functions that close non-elementary antiderivatives.
//!
//! All of them are evaluated from their power series, which is accurate enough for the
//! argument ranges the engine probes (equality checks at small integers, plotting-size
//! domains). The Gaussian integrals use the all-positive form of the series, so `erf`
//! does not lose digits to cancellation.
use std::f64::consts::PI;

pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const MAX_TERMS: usize = 500;
const EPS: f64 = 1e-17;

/// Sums `Σ p_n * w(n)` where `p_0 = first` and `p_n = p_{n-1} * ratio(n)`.
fn weighted_series<R, W>(first: f64, ratio: R, weight: W) -> f64
where
    R: Fn(usize) -> f64,
    W: Fn(usize) -> f64,
{
    let mut power = first;
    let mut sum = power * weight(0);
    for n in 1..MAX_TERMS {
        power *= ratio(n);
        let term = power * weight(n);
        sum += term;
        if n > 2 && term.abs() <= EPS * sum.abs() {
            break;
        }
    }
    sum
}

pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x.abs() > 6.0 {
        return x.signum();
    }
    let x2 = x * x;
    let series = weighted_series(x, |n| 2.0 * x2 / (2 * n + 1) as f64, |_| 1.0);
    2.0 / PI.sqrt() * (-x2).exp() * series
}

pub fn erfc(x: f64) -> f64 {
    1.0 - erf(x)
}

pub fn erfi(x: f64) -> f64 {
    let x2 = x * x;
    2.0 / PI.sqrt() * weighted_series(x, |n| x2 / n as f64, |n| 1.0 / (2 * n + 1) as f64)
}

/// Sine integral.
pub fn si(x: f64) -> f64 {
    let x2 = x * x;
    weighted_series(
        x,
        |n| -x2 / ((2 * n) * (2 * n + 1)) as f64,
        |n| 1.0 / (2 * n + 1) as f64,
    )
}

/// Hyperbolic sine integral.
pub fn shi(x: f64) -> f64 {
    let x2 = x * x;
    weighted_series(
        x,
        |n| x2 / ((2 * n) * (2 * n + 1)) as f64,
        |n| 1.0 / (2 * n + 1) as f64,
    )
}

fn even_tail(x: f64, sign: f64) -> f64 {
    let x2 = x * x;
    weighted_series(
        1.0,
        |n| sign * x2 / ((2 * n - 1) * (2 * n)) as f64,
        |n| if n == 0 { 0.0 } else { 1.0 / (2 * n) as f64 },
    )
}

/// Cosine integral, real for x > 0.
pub fn ci(x: f64) -> f64 {
    if x < 0.0 || x.is_nan() {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    EULER_GAMMA + x.ln() + even_tail(x, -1.0)
}

/// Hyperbolic cosine integral, real for x > 0.
pub fn chi(x: f64) -> f64 {
    if x < 0.0 || x.is_nan() {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    EULER_GAMMA + x.ln() + even_tail(x, 1.0)
}

/// Exponential integral Ei.
pub fn ei(x: f64) -> f64 {
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    EULER_GAMMA
        + x.abs().ln()
        + weighted_series(
            1.0,
            |n| x / n as f64,
            |n| if n == 0 { 0.0 } else { 1.0 / n as f64 },
        )
}

pub fn fresnel_s(x: f64) -> f64 {
    let h = PI / 2.0;
    let x4 = x.powi(4);
    weighted_series(
        h * x.powi(3),
        |n| -h * h * x4 / ((2 * n) * (2 * n + 1)) as f64,
        |n| 1.0 / (4 * n + 3) as f64,
    )
}

pub fn fresnel_c(x: f64) -> f64 {
    let h = PI / 2.0;
    let x4 = x.powi(4);
    weighted_series(
        x,
        |n| -h * h * x4 / ((2 * n - 1) * (2 * n)) as f64,
        |n| 1.0 / (4 * n + 1) as f64,
    )
}

/// Polylogarithm Li_s(z) for |z| <= 1 from its defining series.
pub fn polylog(s: f64, z: f64) -> f64 {
    if z.abs() > 1.0 || z.is_nan() || s.is_nan() {
        return f64::NAN;
    }
    if z == 1.0 && s <= 1.0 {
        return f64::INFINITY;
    }
    let mut power = 1.0;
    let mut sum = 0.0;
    for k in 1..200_000 {
        power *= z;
        let term = power / (k as f64).powf(s);
        sum += term;
        if term.abs() < EPS {
            break;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_error_functions() {
        assert_relative_eq!(erf(0.0), 0.0);
        assert_relative_eq!(erf(1.0), 0.842_700_792_949_714_9, epsilon = 1e-13);
        assert_relative_eq!(erf(-2.0), -0.995_322_265_018_952_7, epsilon = 1e-13);
        assert_relative_eq!(erfc(0.5), 0.479_500_122_186_953_5, epsilon = 1e-13);
        assert_relative_eq!(erfi(1.0), 1.650_425_758_797_542_8, epsilon = 1e-13);
    }

    #[test]
    fn test_trigonometric_integrals() {
        assert_relative_eq!(si(1.0), 0.946_083_070_367_183, epsilon = 1e-13);
        assert_relative_eq!(ci(1.0), 0.337_403_922_900_968_1, epsilon = 1e-13);
        assert_relative_eq!(shi(1.0), 1.057_250_875_375_728_5, epsilon = 1e-13);
        assert_relative_eq!(chi(1.0), 0.837_866_940_980_208_2, epsilon = 1e-13);
        assert_relative_eq!(ei(1.0), 1.895_117_816_355_936_8, epsilon = 1e-13);
        assert!(ci(-1.0).is_nan());
    }

    #[test]
    fn test_fresnel_and_polylog() {
        assert_relative_eq!(fresnel_s(1.0), 0.438_259_147_390_354_8, epsilon = 1e-12);
        assert_relative_eq!(fresnel_c(1.0), 0.779_893_400_376_822_8, epsilon = 1e-12);
        assert_relative_eq!(polylog(2.0, 0.5), 0.582_240_526_465_012_5, epsilon = 1e-12);
        assert!(polylog(2.0, 2.0).is_nan());
    }
}
