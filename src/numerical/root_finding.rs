//! Scalar root bracketing and refinement: uniform grids, sign-change scans and bisection.
use itertools::Itertools;
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RootFindingError {
    #[error("Invalid interval for bisection method: f(a) and f(b) must have opposite signs")]
    InvalidInterval,
    #[error("Maximum iterations reached ({0})")]
    MaxIterationsReached(usize),
    #[error("Function is not finite at x = {0}")]
    NonFinite(f64),
}

/// `n` equally spaced points from `a` to `b`, both ends included.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let h = (b - a) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { b } else { a + h * i as f64 })
                .collect()
        }
    }
}

/// Indices `i` where `values[i]` and `values[i + 1]` have strictly opposite signs.
pub fn sign_change_indices(values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (l, r))| **l * **r < 0.0)
        .map(|(i, _)| i)
        .collect()
}

/// Bisection method for finding roots
/// Requires that f(a) and f(b) have opposite signs
pub fn bisection<F>(
    function: F,
    mut a: f64,
    mut b: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, RootFindingError>
where
    F: Fn(f64) -> f64,
{
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    let mut fa = function(a);
    let fb = function(b);
    if !fa.is_finite() {
        return Err(RootFindingError::NonFinite(a));
    }
    if !fb.is_finite() {
        return Err(RootFindingError::NonFinite(b));
    }
    // root at the endpoints
    if fa.abs() < tolerance {
        return Ok(a);
    }
    if fb.abs() < tolerance {
        return Ok(b);
    }
    if fa * fb > 0.0 {
        return Err(RootFindingError::InvalidInterval);
    }

    for _ in 0..max_iterations {
        let c = 0.5 * (a + b);
        let fc = function(c);
        if !fc.is_finite() {
            return Err(RootFindingError::NonFinite(c));
        }
        if fc.abs() < tolerance || 0.5 * (b - a) < tolerance {
            return Ok(c);
        }
        if fa * fc < 0.0 {
            b = c;
        } else {
            a = c;
            fa = fc;
        }
    }
    Err(RootFindingError::MaxIterationsReached(max_iterations))
}

/// Roots of `function` on `[a, b]` found by scanning `samples` grid points for sign
/// changes and refining each bracket by bisection. Brackets whose refinement fails are
/// skipped. Roots that only touch zero without a sign change are not reported.
pub fn find_roots<F>(function: F, a: f64, b: f64, samples: usize) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    let grid = linspace(a, b, samples.max(2));
    let values: Vec<f64> = grid
        .iter()
        .map(|&x| {
            let v = function(x);
            if v.is_finite() { v } else { 0.0 }
        })
        .collect();
    let mut roots = Vec::new();
    for i in sign_change_indices(&values) {
        match bisection(&function, grid[i], grid[i + 1], 1e-12, 200) {
            Ok(root) => roots.push(root),
            Err(e) => debug!("bracket [{}, {}] dropped: {}", grid[i], grid[i + 1], e),
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bisection_simple_quadratic() {
        let root = bisection(|x| x * x - 4.0, 0.0, 3.0, 1e-12, 200).unwrap();
        assert_relative_eq!(root, 2.0, epsilon = 1e-10);
        let root = bisection(|x| x * x - 4.0, -3.0, 0.0, 1e-12, 200).unwrap();
        assert_relative_eq!(root, -2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_bisection_cubic() {
        // f(x) = x^3 - x - 1, root approximately at x = 1.324717957
        let root = bisection(|x| x * x * x - x - 1.0, 2.0, 1.0, 1e-12, 200).unwrap();
        assert_relative_eq!(root, 1.324717957244746, epsilon = 1e-9);
    }

    #[test]
    fn test_bisection_errors() {
        assert_eq!(
            bisection(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100),
            Err(RootFindingError::InvalidInterval)
        );
        assert_eq!(
            bisection(|x: f64| x.cos() - x, 0.0, 1.0, 0.0, 5),
            Err(RootFindingError::MaxIterationsReached(5))
        );
        assert!(matches!(
            bisection(|x: f64| x.ln(), -1.0, 2.0, 1e-12, 100),
            Err(RootFindingError::NonFinite(_))
        ));
    }

    #[test]
    fn test_linspace_ends() {
        let grid = linspace(0.0, 1.0, 5);
        assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
    }

    #[test]
    fn test_sign_changes_ignore_touching_zero() {
        let values = [1.0, -1.0, 0.0, 2.0, -3.0];
        assert_eq!(sign_change_indices(&values), vec![0, 3]);
    }

    #[test]
    fn test_find_roots_of_sine() {
        let roots = find_roots(|x: f64| x.sin(), 0.5, 10.0, 1000);
        assert_eq!(roots.len(), 3);
        for (root, k) in roots.iter().zip(1..) {
            assert_relative_eq!(*root, k as f64 * std::f64::consts::PI, epsilon = 1e-9);
        }
        // sin^2 touches zero without crossing
        assert!(find_roots(|x: f64| x.sin().powi(2), 0.5, 10.0, 1000).is_empty());
    }
}
