//! Area between two curves given in polar form.
//!
//! The area is the set of points inside the region traced by `r = inner(θ)` and not
//! inside `r = outer(θ)` for `θ` in `[theta_start, theta_end)`. The engine picks one of
//! three paths:
//! 1. curves that never cross: difference of the single-curve areas `0.5 ∫ r² dθ`, each
//!    over its own natural domain;
//! 2. crossing curves whose squared radii never cross: degeneracy shortcut;
//! 3. everything else: polar quadrature of `0.5 (r_in² - r_out²)` or, for complicated
//!    curves, a Cartesian double integral over the bounding disk.
//!
//! Negative radii follow the usual convention: the point `(θ, r < 0)` is the point
//! `(θ + π, |r|)`.
use crate::numerical::quadrature::{AdaptiveQuadrature, QuadratureError, QuadratureResult};
use crate::numerical::root_finding::{bisection, find_roots, linspace, sign_change_indices};
use crate::symbolic::parse_expr::validate_variable_name;
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::cell::Cell;
use std::f64::consts::{PI, TAU};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolarError {
    /// invalid curves, domain or method
    #[error("{0}")]
    Value(String),
    /// non-finite or low-confidence quadrature
    #[error("{0}")]
    Integration(String),
}

impl From<QuadratureError> for PolarError {
    fn from(e: QuadratureError) -> Self {
        PolarError::Integration(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum AreaMethod {
    Auto,
    Polar,
    Cartesian,
}

/// Gauss-Legendre order, tolerances and panel budget of one adaptive quadrature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureSettings {
    pub order: usize,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_panels: usize,
}

impl QuadratureSettings {
    pub fn build(&self) -> Result<AdaptiveQuadrature, QuadratureError> {
        AdaptiveQuadrature::new(
            self.order,
            self.abs_tolerance,
            self.rel_tolerance,
            self.max_panels,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolarConfig {
    /// grid size for the intersection and degeneracy scans
    pub intersection_samples: usize,
    /// grid size for locating zero crossings of a single curve
    pub crossing_samples: usize,
    /// grid size for the bounding disk of the Cartesian fallback
    pub bounding_samples: usize,
    /// samples within this distance of zero count as being on either side
    pub side_tolerance: f64,
    pub root_tolerance: f64,
    pub dominance_tolerance: f64,
    /// radii above `-radius_tolerance` count as non-negative
    pub radius_tolerance: f64,
    /// Auto picks the Cartesian fallback above this combined operation count
    pub ops_threshold: usize,
    pub seam_epsilon: f64,
    pub polar_quadrature: QuadratureSettings,
    pub cartesian_quadrature: QuadratureSettings,
    pub warn_error: f64,
    pub max_error: f64,
}

impl Default for PolarConfig {
    fn default() -> Self {
        Self {
            intersection_samples: 2000,
            crossing_samples: 1000,
            bounding_samples: 1000,
            side_tolerance: 1e-10,
            root_tolerance: 1e-10,
            dominance_tolerance: 1e-8,
            radius_tolerance: 1e-12,
            ops_threshold: 15,
            seam_epsilon: 1e-10,
            polar_quadrature: QuadratureSettings {
                order: 7,
                abs_tolerance: 1e-10,
                rel_tolerance: 1e-10,
                max_panels: 400,
            },
            cartesian_quadrature: QuadratureSettings {
                order: 5,
                abs_tolerance: 1e-8,
                rel_tolerance: 1e-8,
                max_panels: 200,
            },
            warn_error: 1e-6,
            max_error: 1e-3,
        }
    }
}

/// Two curves `r = inner(θ)`, `r = outer(θ)` over `[theta_start, theta_end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarCurvePair {
    pub inner: Expr,
    pub outer: Expr,
    pub angle_var: String,
    pub theta_start: f64,
    pub theta_end: f64,
}

impl PolarCurvePair {
    /// Validates the domain and that both curves depend on `angle_var` only.
    pub fn new(
        inner: Expr,
        outer: Expr,
        angle_var: &str,
        theta_start: f64,
        theta_end: f64,
    ) -> Result<Self, PolarError> {
        validate_variable_name(angle_var)
            .map_err(|e| PolarError::Value(format!("Invalid angle variable: {}", e)))?;
        if !theta_start.is_finite() || !theta_end.is_finite() {
            return Err(PolarError::Value(
                "theta_start and theta_end must be finite numbers".to_string(),
            ));
        }
        if theta_start > theta_end {
            return Err(PolarError::Value(format!(
                "theta_start ({}) must not exceed theta_end ({})",
                theta_start, theta_end
            )));
        }
        for curve in [&inner, &outer] {
            if let Some(other) = curve.extract_variables().into_iter().find(|v| v != angle_var) {
                return Err(PolarError::Value(format!(
                    "curve {} depends on '{}', only '{}' is allowed",
                    curve, other, angle_var
                )));
            }
        }
        Ok(Self {
            inner,
            outer,
            angle_var: angle_var.to_string(),
            theta_start,
            theta_end,
        })
    }

    pub fn from_text(
        inner: &str,
        outer: &str,
        angle_var: &str,
        theta_start: f64,
        theta_end: f64,
    ) -> Result<Self, PolarError> {
        let parse = |text: &str| {
            Expr::parse_expression(text)
                .map_err(|e| PolarError::Value(format!("Could not parse curve '{}': {}", text, e)))
        };
        Self::new(parse(inner)?, parse(outer)?, angle_var, theta_start, theta_end)
    }

    pub fn width(&self) -> f64 {
        self.theta_end - self.theta_start
    }
}

pub type Radius = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Non-finite values count as the pole.
fn finite_or_zero(r: &Radius, theta: f64) -> f64 {
    let v = r(theta);
    if v.is_finite() { v } else { 0.0 }
}

#[derive(Debug, Clone, Default)]
pub struct PolarAreaSolver {
    pub config: PolarConfig,
}

impl PolarAreaSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PolarConfig) -> Self {
        Self { config }
    }

    /// Parses and validates the curves, then computes the area.
    /// `method` is `auto`, `polar` or `cartesian`.
    pub fn solve(
        &self,
        inner: &str,
        outer: &str,
        angle_var: &str,
        theta_start: f64,
        theta_end: f64,
        method: &str,
    ) -> Result<f64, PolarError> {
        let method = AreaMethod::from_str(method).map_err(|_| {
            PolarError::Value(format!(
                "method must be 'auto', 'cartesian', or 'polar', got '{}'",
                method
            ))
        })?;
        let pair = PolarCurvePair::from_text(inner, outer, angle_var, theta_start, theta_end)?;
        self.solve_pair(&pair, method)
    }

    pub fn solve_pair(&self, pair: &PolarCurvePair, method: AreaMethod) -> Result<f64, PolarError> {
        if pair.width() == 0.0 {
            return Ok(0.0);
        }
        let r_in = pair.inner.lambdify1D(&pair.angle_var);
        let r_out = pair.outer.lambdify1D(&pair.angle_var);
        let (start, end) = (pair.theta_start, pair.theta_end);

        if !self.curves_intersect(&r_in, &r_out, start, end) {
            let (a_in, b_in) = self.natural_domain(&r_in, start, end);
            let (a_out, b_out) = self.natural_domain(&r_out, start, end);
            let area_in = self.single_area(&r_in, a_in, b_in)?;
            let area_out = self.single_area(&r_out, a_out, b_out)?;
            info!(
                "curves {} and {} do not cross: single areas {} and {}",
                pair.inner, pair.outer, area_in, area_out
            );
            return Ok((area_in.max(area_out) - area_in.min(area_out)).max(0.0));
        }

        if let Some(area) = self.degenerate_area(pair, &r_in, &r_out)? {
            return Ok(area);
        }

        let end = if (end - start - TAU).abs() < self.config.seam_epsilon {
            start + TAU - self.config.seam_epsilon
        } else {
            end
        };
        let method = match method {
            AreaMethod::Auto => self.choose_method(&pair.inner, &pair.outer),
            forced => forced,
        };
        info!("integrating area between {} and {} with the {} method", pair.inner, pair.outer, method);
        let area = match method {
            AreaMethod::Cartesian => self.cartesian_area(&r_in, &r_out, start, end)?,
            _ => self.polar_area(&r_in, &r_out, start, end)?,
        };
        if !area.is_finite() {
            return Err(PolarError::Integration(format!("Integration resulted in {}", area)));
        }
        Ok(area)
    }

    /// True when `r_in - r_out` changes sign strictly somewhere on the domain.
    pub fn curves_intersect(&self, r_in: &Radius, r_out: &Radius, start: f64, end: f64) -> bool {
        let grid = linspace(start, end, self.config.intersection_samples.max(2));
        let difference = |t: f64| finite_or_zero(r_in, t) - finite_or_zero(r_out, t);
        let values: Vec<f64> = grid.par_iter().map(|&t| difference(t)).collect();
        let tol = self.config.side_tolerance;
        if values.iter().all(|v| *v >= -tol) || values.iter().all(|v| *v <= tol) {
            return false;
        }
        match sign_change_indices(&values).first() {
            None => false,
            Some(&i) => {
                match bisection(difference, grid[i], grid[i + 1], self.config.root_tolerance, 200) {
                    Ok(root) => debug!("curves cross near θ = {}", root),
                    Err(e) => debug!("crossing in [{}, {}] not refined: {}", grid[i], grid[i + 1], e),
                }
                true
            }
        }
    }

    /// Domain over which a curve traces its boundary once.
    ///
    /// Only the full turn `[0, 2π]` is adjusted: when `r` changes sign at least twice the
    /// domain becomes the span between its first two zero crossings.
    pub fn natural_domain(&self, r: &Radius, start: f64, end: f64) -> (f64, f64) {
        if start.abs() > 0.01 || (end - TAU).abs() > 0.01 {
            return (start, end);
        }
        let crossings = find_roots(
            |t| finite_or_zero(r, t),
            0.0,
            TAU,
            self.config.crossing_samples,
        );
        match crossings.as_slice() {
            [first, second, ..] => (*first, *second),
            _ => (start, end),
        }
    }

    /// `0.5 ∫ r² dθ` over `[start, end]`.
    pub fn single_area(&self, r: &Radius, start: f64, end: f64) -> Result<f64, PolarError> {
        let quadrature = self.config.polar_quadrature.build()?;
        let result = quadrature.integrate(
            |t| {
                let v = finite_or_zero(r, t);
                0.5 * v * v
            },
            start,
            end,
        )?;
        Ok(self.accept(result, "single area")?.max(0.0))
    }

    /// Shortcut for crossing curves whose squares never cross: the signed difference of the
    /// single areas when the inner square dominates everywhere, 0 when it does not.
    fn degenerate_area(
        &self,
        pair: &PolarCurvePair,
        r_in: &Radius,
        r_out: &Radius,
    ) -> Result<Option<f64>, PolarError> {
        if pair.inner.same_after_simplify(&pair.outer) {
            return Ok(Some(0.0));
        }
        let (start, end) = (pair.theta_start, pair.theta_end);
        let squares = |t: f64| {
            let (a, b) = (finite_or_zero(r_in, t), finite_or_zero(r_out, t));
            a * a - b * b
        };
        let samples = self.config.intersection_samples;
        if !find_roots(squares, start, end, samples).is_empty() {
            return Ok(None);
        }
        let tol = self.config.dominance_tolerance;
        let dominates = linspace(start, end, samples)
            .par_iter()
            .all(|&t| squares(t) >= -tol);
        if !dominates {
            info!("{} lies inside {} everywhere", pair.inner, pair.outer);
            return Ok(Some(0.0));
        }
        let area = self.single_area(r_in, start, end)? - self.single_area(r_out, start, end)?;
        info!("squared radii never cross, area is the single-area difference {}", area);
        Ok(Some(area))
    }

    pub fn choose_method(&self, inner: &Expr, outer: &Expr) -> AreaMethod {
        if inner.count_ops() + outer.count_ops() > self.config.ops_threshold {
            AreaMethod::Cartesian
        } else {
            AreaMethod::Polar
        }
    }

    /// Largest non-negative distance at which the curve meets the ray at `theta`.
    fn effective_radius(&self, r: &Radius, theta: f64) -> f64 {
        let tol = self.config.radius_tolerance;
        let direct = finite_or_zero(r, theta);
        let opposite = finite_or_zero(r, theta - PI);
        let mut candidate = 0.0_f64;
        if direct >= -tol {
            candidate = candidate.max(direct);
        }
        if opposite < -tol {
            candidate = candidate.max(opposite.abs());
        }
        candidate
    }

    pub fn polar_area(
        &self,
        r_in: &Radius,
        r_out: &Radius,
        start: f64,
        end: f64,
    ) -> Result<f64, PolarError> {
        let quadrature = self.config.polar_quadrature.build()?;
        let result = quadrature.integrate(
            |t| {
                let a = self.effective_radius(r_in, t);
                let b = self.effective_radius(r_out, t);
                if a > b + 1e-14 { 0.5 * (a * a - b * b) } else { 0.0 }
            },
            start,
            end,
        )?;
        Ok(self.accept(result, "polar method")?.max(0.0))
    }

    /// Double integral of the region indicator over the disk that bounds both curves.
    ///
    /// The disk is swept ray by ray. Along the ray at `θ` the indicator only jumps where the
    /// ray meets a curve, at the effective radii of both curves, and the inner rule gets
    /// those radii as breakpoints.
    pub fn cartesian_area(
        &self,
        r_in: &Radius,
        r_out: &Radius,
        start: f64,
        end: f64,
    ) -> Result<f64, PolarError> {
        let n = self.config.bounding_samples.max(2);
        let max_radius = 1.1
            * linspace(start, end, n)
                .par_iter()
                .map(|&t| finite_or_zero(r_in, t).abs().max(finite_or_zero(r_out, t).abs()))
                .reduce(|| 0.0, f64::max);
        if max_radius <= 0.0 {
            warn!("bounding radius is zero, area is 0");
            return Ok(0.0);
        }

        let tol = self.config.radius_tolerance;
        // effective radii at the last outer angle
        let radii: Cell<Option<(f64, f64, f64)>> = Cell::new(None);
        let radii_at = |theta: f64| match radii.get() {
            Some((t, a, b)) if t == theta => (a, b),
            _ => {
                let a = self.effective_radius(r_in, theta);
                let b = self.effective_radius(r_out, theta);
                radii.set(Some((theta, a, b)));
                (a, b)
            }
        };
        let breakpoints = |theta: f64| {
            let (a, b) = radii_at(theta);
            let mut points = vec![0.0, a.min(max_radius), b.min(max_radius), max_radius];
            points.sort_by(f64::total_cmp);
            points.dedup();
            points
        };
        let indicator = |theta: f64, rho: f64| {
            let (x, y) = (rho * theta.cos(), rho * theta.sin());
            let r = x.hypot(y);
            if r < tol {
                return 0.0;
            }
            let (a, b) = radii_at(theta);
            let inside_inner = r <= a + tol && a > tol;
            let inside_outer = r <= b + tol && b > tol;
            if inside_inner && !inside_outer { 1.0 } else { 0.0 }
        };

        let quadrature = self.config.cartesian_quadrature.build()?;
        let result = quadrature.integrate_2d(
            |theta, rho| rho * indicator(theta, rho),
            start,
            end,
            breakpoints,
        )?;
        Ok(self.accept(result, "Cartesian method")?.max(0.0))
    }

    fn accept(&self, result: QuadratureResult, what: &str) -> Result<f64, PolarError> {
        if !result.value.is_finite() {
            return Err(PolarError::Integration(format!(
                "{} resulted in {}",
                what, result.value
            )));
        }
        if result.error > self.config.max_error {
            return Err(PolarError::Integration(format!(
                "{} error estimate {:e} exceeds {:e}",
                what, result.error, self.config.max_error
            )));
        }
        if result.error > self.config.warn_error {
            warn!("High integration error in {}: {:e}", what, result.error);
        }
        Ok(result.value)
    }
}

/// Area inside `inner` and outside `outer`, both functions of `angle_var`, with the
/// default configuration.
pub fn solve_polar_area(
    inner: &str,
    outer: &str,
    angle_var: &str,
    theta_start: f64,
    theta_end: f64,
    method: &str,
) -> Result<f64, PolarError> {
    PolarAreaSolver::default().solve(inner, outer, angle_var, theta_start, theta_end, method)
}

/// [`solve_polar_area`] over the full turn `[0, 2π)` with automatic method choice.
pub fn solve_polar_area_full_turn(inner: &str, outer: &str, angle_var: &str) -> Result<f64, PolarError> {
    solve_polar_area(inner, outer, angle_var, 0.0, TAU, "auto")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn radius(text: &str) -> Radius {
        Expr::parse_expression(text).unwrap().lambdify1D("theta")
    }

    #[test]
    fn test_rose_against_pole() {
        let area = solve_polar_area_full_turn("sin(2*theta)", "0", "theta").unwrap();
        assert_relative_eq!(area, PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_nested_cardioids_give_single_area_difference() {
        let area = solve_polar_area_full_turn("1 + cos(theta)", "2 + cos(theta)", "theta").unwrap();
        assert_relative_eq!(area, 3.0 * PI, epsilon = 1e-6);
    }

    #[test]
    fn test_dominating_circles() {
        let area = solve_polar_area("2", "1", "theta", 0.0, TAU, "auto").unwrap();
        assert_relative_eq!(area, 3.0 * PI, epsilon = 1e-6);
        let area = solve_polar_area("3", "1", "theta", 0.0, PI, "polar").unwrap();
        assert_relative_eq!(area, 4.0 * PI, epsilon = 1e-6);
        let area = solve_polar_area("1", "0.5", "theta", 0.0, TAU, "auto").unwrap();
        assert_relative_eq!(area, 0.75 * PI, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_width_domain() {
        assert_eq!(
            solve_polar_area("1 + cos(theta)", "1", "theta", 1.0, 1.0, "auto").unwrap(),
            0.0
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let value_error = |r: Result<f64, PolarError>| matches!(r, Err(PolarError::Value(_)));
        assert!(value_error(solve_polar_area("1", "0", "theta", 2.0, 1.0, "auto")));
        assert!(value_error(solve_polar_area("1", "0", "theta", 0.0, f64::NAN, "auto")));
        assert!(value_error(solve_polar_area("1", "0", "theta", 0.0, 1.0, "simpson")));
        assert!(value_error(solve_polar_area("sin(", "0", "theta", 0.0, 1.0, "auto")));
        assert!(value_error(solve_polar_area("x*theta", "0", "theta", 0.0, 1.0, "auto")));
    }

    #[test]
    fn test_cardioid_outside_unit_circle_both_methods() {
        // ∫_{-π/2}^{π/2} ((1 + cos θ)² - 1)/2 dθ = 2 + π/4
        let expected = 2.0 + PI / 4.0;
        let polar = solve_polar_area("1 + cos(theta)", "1", "theta", 0.0, TAU, "polar").unwrap();
        assert_relative_eq!(polar, expected, epsilon = 1e-6);
        let cartesian =
            solve_polar_area("1 + cos(theta)", "1", "theta", 0.0, TAU, "cartesian").unwrap();
        assert_relative_eq!(cartesian, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_cartesian_agrees_with_polar_for_pole_crossing_curve() {
        // r = 2 cos θ is negative on (π/2, 3π/2) and traces its circle once
        let expected = PI / 3.0 + 3.0_f64.sqrt() / 2.0;
        for method in ["polar", "cartesian"] {
            let area = solve_polar_area("2*cos(theta)", "1", "theta", 0.0, TAU, method).unwrap();
            assert_relative_eq!(area, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_busy_curves_agree_across_methods() {
        let inner = "2 + sin(theta)^2*cos(3*theta)/2 + exp(sin(theta))/(3 + cos(theta)^2)";
        let outer = "1 + 2*cos(theta)";
        let polar = solve_polar_area(inner, outer, "theta", 0.0, TAU, "polar").unwrap();
        let cartesian = solve_polar_area(inner, outer, "theta", 0.0, TAU, "cartesian").unwrap();
        assert!(polar > 0.0);
        assert_relative_eq!(cartesian, polar, epsilon = 1e-6);
        let partial_polar = solve_polar_area(inner, outer, "theta", 0.5, 2.5, "polar").unwrap();
        let partial_cartesian =
            solve_polar_area(inner, outer, "theta", 0.5, 2.5, "cartesian").unwrap();
        assert_relative_eq!(partial_cartesian, partial_polar, epsilon = 1e-6);
    }

    #[test]
    fn test_negative_radius_uses_opposite_ray() {
        let solver = PolarAreaSolver::default();
        // r = -1 traces the unit circle through the opposite ray
        assert_relative_eq!(solver.effective_radius(&radius("-1"), 0.3), 1.0);
        // cos(2.5) < 0 and cos(2.5 - π) > 0: the ray at 2.5 meets nothing
        assert_eq!(solver.effective_radius(&radius("cos(theta)"), 2.5), 0.0);
        assert_relative_eq!(
            solver.effective_radius(&radius("cos(theta)"), 2.5 + PI),
            2.5_f64.cos().abs(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_natural_domain_of_pole_crossing_circle() {
        let solver = PolarAreaSolver::default();
        let (a, b) = solver.natural_domain(&radius("cos(theta)"), 0.0, TAU);
        assert_relative_eq!(a, PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(b, 3.0 * PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(solver.single_area(&radius("cos(theta)"), a, b).unwrap(), PI / 4.0, epsilon = 1e-9);
        // partial domains are left alone
        assert_eq!(solver.natural_domain(&radius("cos(theta)"), 0.0, 1.0), (0.0, 1.0));
    }

    #[test]
    fn test_method_choice_by_operation_count() {
        let solver = PolarAreaSolver::default();
        let simple = Expr::parse_expression("1 + cos(theta)").unwrap();
        let busy = Expr::parse_expression("1 + sin(theta)^2*cos(3*theta) - exp(sin(theta))/(2 + cos(theta)^2) + theta^3*sin(theta)").unwrap();
        assert_eq!(solver.choose_method(&simple, &simple), AreaMethod::Polar);
        assert_eq!(solver.choose_method(&busy, &simple), AreaMethod::Cartesian);
        let names: Vec<String> = AreaMethod::iter().map(|m| m.to_string()).collect();
        assert_eq!(names, ["auto", "polar", "cartesian"]);
    }

    #[test]
    fn test_equal_curves_have_no_area() {
        let area = solve_polar_area("2*cos(theta)", "cos(theta) + cos(theta)", "theta", 0.0, TAU, "auto")
            .unwrap();
        assert_eq!(area, 0.0);
    }
}
