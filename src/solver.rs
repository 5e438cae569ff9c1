#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// ordered derivation trail of one solve call, with checkpoints for abandoned attempts
pub mod step_log;
///____________________________________________________________________________________________________________________________
/// # Technique router
/// fixed priority chain of integration techniques, sum splitting, recursion guard and
/// cooperative cancellation; every recognizer can route sub-integrals back through it
///# Example
/// ```rust, ignore
/// use RustedCalculus::solver::router::{SolveContext, TechniqueRouter};
/// let router = TechniqueRouter::new();
/// let mut ctx = SolveContext::default();
/// let f = Expr::parse_expression("x*exp(x)").unwrap();
/// let F = router.route(&f, "x", &mut ctx).unwrap();
/// println!("{} with steps {:?}", F, ctx.log.steps());
/// ```
pub mod router;
/// elementary forms, cyclic sin/cos*exp, trigonometric substitution, partial fractions,
/// integration by parts with LIATE ordering and the direct fallback
pub mod techniques;
/// substitution candidate search and validation for u-substitution
pub mod u_substitution;
///________________________________________________________________________________________________________________________________________________
/// # Integral solver
/// top-level entry: parsing, worker thread with deadline, direct-integration retry and
/// typed failures
///# Example
/// ```rust, ignore
/// use RustedCalculus::solver::supervisor::solve_integral;
/// let solution = solve_integral("2*x*exp(x^2)", "x").unwrap();
/// assert_eq!(solution.result_text, "exp(x**2)");
/// for step in solution.steps {
///     println!("{}", step);
/// }
/// ```
pub mod supervisor;
/// area under a parametric curve through the integral solver
pub mod parametric;
