//! Globally adaptive Gauss-Legendre quadrature.
//!
//! Every panel is integrated with an `n`-point and a `2n+1`-point Gauss-Legendre rule;
//! `|G_2n+1 - G_n|` is the panel error estimate. The panel with the largest estimate is
//! bisected first until the summed estimate meets the tolerance or the panel budget is
//! spent. Running out of budget is not an error: the result carries its estimate and the
//! caller decides whether it is good enough.
use gauss_quad::GaussLegendre;
use itertools::Itertools;
use log::debug;
use std::cell::{Cell, RefCell};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadratureError {
    #[error("could not build a Gauss-Legendre rule of degree {degree}: {reason}")]
    Rule { degree: usize, reason: String },
    #[error("integration bounds must be finite, got [{0}, {1}]")]
    InvalidBounds(f64, f64),
    #[error("integrand is not finite near x = {0}")]
    NonFinite(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureResult {
    pub value: f64,
    /// summed error estimate of all panels
    pub error: f64,
    /// number of integrand evaluations
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy)]
struct Panel {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

pub struct AdaptiveQuadrature {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_panels: usize,
    order: usize,
    low: GaussLegendre,
    high: GaussLegendre,
}

impl AdaptiveQuadrature {
    /// `order` is the point count of the low rule, the high rule uses `2*order + 1`.
    pub fn new(
        order: usize,
        abs_tolerance: f64,
        rel_tolerance: f64,
        max_panels: usize,
    ) -> Result<Self, QuadratureError> {
        let rule = |degree: usize| {
            GaussLegendre::new(degree).map_err(|e| QuadratureError::Rule {
                degree,
                reason: format!("{:?}", e),
            })
        };
        Ok(Self {
            abs_tolerance,
            rel_tolerance,
            max_panels: max_panels.max(1),
            order,
            low: rule(order)?,
            high: rule(2 * order + 1)?,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn evaluations_per_panel(&self) -> usize {
        3 * self.order + 1
    }

    fn panel<F>(&self, f: &F, a: f64, b: f64) -> Result<Panel, QuadratureError>
    where
        F: Fn(f64) -> f64,
    {
        let coarse = self.low.integrate(a, b, f);
        let fine = self.high.integrate(a, b, f);
        if !coarse.is_finite() || !fine.is_finite() {
            return Err(QuadratureError::NonFinite(0.5 * (a + b)));
        }
        Ok(Panel {
            a,
            b,
            value: fine,
            error: (fine - coarse).abs(),
        })
    }

    pub fn integrate<F>(&self, f: F, a: f64, b: f64) -> Result<QuadratureResult, QuadratureError>
    where
        F: Fn(f64) -> f64,
    {
        if !a.is_finite() || !b.is_finite() {
            return Err(QuadratureError::InvalidBounds(a, b));
        }
        if a == b {
            return Ok(QuadratureResult {
                value: 0.0,
                error: 0.0,
                evaluations: 0,
            });
        }
        if a > b {
            let reversed = self.integrate(f, b, a)?;
            return Ok(QuadratureResult {
                value: -reversed.value,
                ..reversed
            });
        }

        let mut panels = vec![self.panel(&f, a, b)?];
        let mut evaluations = self.evaluations_per_panel();
        loop {
            let value: f64 = panels.iter().map(|p| p.value).sum();
            let error: f64 = panels.iter().map(|p| p.error).sum();
            let result = QuadratureResult {
                value,
                error,
                evaluations,
            };
            if error <= self.abs_tolerance.max(self.rel_tolerance * value.abs()) {
                return Ok(result);
            }
            if panels.len() >= self.max_panels {
                debug!(
                    "quadrature budget of {} panels spent on [{}, {}]: estimate {:e}",
                    self.max_panels, a, b, error
                );
                return Ok(result);
            }
            let Some(worst) = panels.iter().position_max_by(|l, r| l.error.total_cmp(&r.error))
            else {
                return Ok(result);
            };
            let Panel { a: left, b: right, .. } = panels.swap_remove(worst);
            let middle = 0.5 * (left + right);
            if middle <= left || middle >= right {
                debug!("panel [{}, {}] cannot be split further", left, right);
                return Ok(result);
            }
            panels.push(self.panel(&f, left, middle)?);
            panels.push(self.panel(&f, middle, right)?);
            evaluations += 2 * self.evaluations_per_panel();
        }
    }

    /// Integrates `f(x, y)` over `x` from `a` to `b` and `y` across `y_breaks(x)`.
    ///
    /// `y_breaks(x)` lists the inner limits in ascending order together with every point
    /// where `f(x, ·)` jumps; each piece between neighbours is integrated on its own, so a
    /// discontinuous indicator never lands inside a panel. The inner rule is this same
    /// quadrature; the largest inner estimate times the outer width is added to the outer
    /// estimate.
    pub fn integrate_2d<F, G>(
        &self,
        f: F,
        a: f64,
        b: f64,
        y_breaks: G,
    ) -> Result<QuadratureResult, QuadratureError>
    where
        F: Fn(f64, f64) -> f64,
        G: Fn(f64) -> Vec<f64>,
    {
        let inner_error = Cell::new(0.0_f64);
        let inner_evaluations = Cell::new(0_usize);
        let inner_failure: RefCell<Option<QuadratureError>> = RefCell::new(None);
        let outer = self.integrate(
            |x| {
                let mut total = 0.0;
                for piece in y_breaks(x).windows(2) {
                    if piece[1] <= piece[0] {
                        continue;
                    }
                    match self.integrate(|y| f(x, y), piece[0], piece[1]) {
                        Ok(inner) => {
                            inner_error.set(inner_error.get().max(inner.error));
                            inner_evaluations.set(inner_evaluations.get() + inner.evaluations);
                            total += inner.value;
                        }
                        Err(e) => {
                            inner_failure.borrow_mut().get_or_insert(e);
                        }
                    }
                }
                total
            },
            a,
            b,
        )?;
        if let Some(e) = inner_failure.into_inner() {
            return Err(e);
        }
        Ok(QuadratureResult {
            value: outer.value,
            error: outer.error + inner_error.get() * (b - a).abs(),
            evaluations: inner_evaluations.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn quadrature() -> AdaptiveQuadrature {
        AdaptiveQuadrature::new(7, 1e-10, 1e-10, 200).unwrap()
    }

    #[test]
    fn test_polynomial_is_exact_on_one_panel() {
        let result = quadrature().integrate(|x| 3.0 * x * x + 1.0, 0.0, 2.0).unwrap();
        assert_relative_eq!(result.value, 10.0, epsilon = 1e-12);
        assert_eq!(result.evaluations, 22);
    }

    #[test]
    fn test_smooth_and_reversed_bounds() {
        let q = quadrature();
        let forward = q.integrate(|x: f64| x.sin(), 0.0, PI).unwrap();
        assert_relative_eq!(forward.value, 2.0, epsilon = 1e-10);
        let backward = q.integrate(|x: f64| x.sin(), PI, 0.0).unwrap();
        assert_relative_eq!(backward.value, -2.0, epsilon = 1e-10);
        assert_eq!(q.integrate(|x: f64| x.sin(), 1.0, 1.0).unwrap().value, 0.0);
    }

    #[test]
    fn test_kink_is_refined() {
        // |x - 1/3| on [0, 1]: 1/18 + 2/9
        let result = quadrature().integrate(|x: f64| (x - 1.0 / 3.0).abs(), 0.0, 1.0).unwrap();
        assert_relative_eq!(result.value, 5.0 / 18.0, epsilon = 1e-9);
        assert!(result.evaluations > 22);
    }

    #[test]
    fn test_budget_returns_estimate() {
        let q = AdaptiveQuadrature::new(3, 1e-14, 0.0, 2).unwrap();
        let result = q.integrate(|x: f64| if x < 0.3 { 0.0 } else { 1.0 }, 0.0, 1.0).unwrap();
        assert!(result.error > 1e-14);
        assert_relative_eq!(result.value, 0.7, epsilon = 0.2);
    }

    #[test]
    fn test_errors() {
        let q = quadrature();
        assert!(matches!(
            q.integrate(|x| x, 0.0, f64::INFINITY),
            Err(QuadratureError::InvalidBounds(_, _))
        ));
        assert!(matches!(
            q.integrate(|x: f64| 1.0 / (x - x), 0.0, 1.0),
            Err(QuadratureError::NonFinite(_))
        ));
    }

    #[test]
    fn test_disk_area_in_polar_coordinates() {
        let q = AdaptiveQuadrature::new(5, 1e-9, 1e-9, 64).unwrap();
        let result = q
            .integrate_2d(|_theta, r| r, 0.0, 2.0 * PI, |_| vec![0.0, 2.0])
            .unwrap();
        assert_relative_eq!(result.value, 4.0 * PI, epsilon = 1e-9);
        assert!(result.error < 1e-6);
    }

    #[test]
    fn test_inner_breakpoints_resolve_a_jump() {
        // annulus 1 < r < 2 written as an indicator on [0, 3]
        let q = AdaptiveQuadrature::new(5, 1e-9, 1e-9, 64).unwrap();
        let ring = |_theta: f64, r: f64| if (1.0..=2.0).contains(&r) { r } else { 0.0 };
        let result = q
            .integrate_2d(ring, 0.0, 2.0 * PI, |_| vec![0.0, 1.0, 2.0, 3.0])
            .unwrap();
        assert_relative_eq!(result.value, 3.0 * PI, epsilon = 1e-9);
    }
}
