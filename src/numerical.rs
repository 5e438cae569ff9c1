/// bisection, uniform grids and sign-change scans
///  Example#1
/// ```rust, ignore
/// use RustedCalculus::numerical::root_finding::{bisection, find_roots};
/// let root = bisection(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 200).unwrap();
/// let roots = find_roots(|x: f64| x.sin(), 0.5, 10.0, 1000);
/// println!("sqrt(2) = {}, roots of sin = {:?}", root, roots);
/// ```
pub mod root_finding;
///________________________________________________________________________________________________________________________________________________
/// globally adaptive Gauss-Legendre quadrature in one and two dimensions
///  Example#1
/// ```rust, ignore
/// use RustedCalculus::numerical::quadrature::AdaptiveQuadrature;
/// let quad = AdaptiveQuadrature::new(7, 1e-10, 1e-10, 200).unwrap();
/// let result = quad.integrate(|x: f64| x.sin(), 0.0, std::f64::consts::PI).unwrap();
/// println!("value {} error {} evaluations {}", result.value, result.error, result.evaluations);
/// // area of the disk of radius 2 in polar coordinates
/// let disk = quad
///     .integrate_2d(|_theta, r| r, 0.0, 2.0 * std::f64::consts::PI, |_| vec![0.0, 2.0])
///     .unwrap();
/// ```
pub mod quadrature;
///________________________________________________________________________________________________________________________________________________
/// # Polar area
/// area inside one polar curve and outside another: intersection scan, natural domains of
/// curves through the pole, degeneracy shortcuts, polar quadrature with the negative
/// radius convention and a Cartesian fallback for complicated curves
///  Example#1
/// ```rust, ignore
/// use RustedCalculus::numerical::polar_area::{PolarAreaSolver, solve_polar_area};
/// // four-petal rose: pi/2
/// let area = solve_polar_area("sin(2*theta)", "0", "theta", 0.0, 2.0 * std::f64::consts::PI, "auto").unwrap();
/// // cardioid outside the unit circle, forced Cartesian fallback
/// let solver = PolarAreaSolver::default();
/// let area2 = solver
///     .solve("1 + cos(theta)", "1", "theta", 0.0, 2.0 * std::f64::consts::PI, "cartesian")
///     .unwrap();
/// ```
pub mod polar_area;
