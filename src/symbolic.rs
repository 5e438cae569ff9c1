#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// turns a String expression into a symbolic expression
///
///# Example
/// ```rust, ignore
/// use RustedCalculus::symbolic::symbolic_engine::Expr;
/// let parsed = Expr::parse_expression("2x*exp(x^2)").unwrap();
/// println!("parsed expression {}", parsed); // 2*x*exp(x**2)
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// 1) the expression tree and its precedence-aware printing
/// 2) analytical derivatives and numeric evaluation of an expression
///# Example
/// ```rust, ignore
/// use RustedCalculus::symbolic::symbolic_engine::Expr;
/// let f = Expr::parse_expression("x*sin(x)").unwrap();
/// let df = f.diff("x").simplify();
/// println!("derivative {}", df);
/// let value = df.lambdify1D("x")(1.0);
/// ```
pub mod symbolic_engine;
pub mod symbolic_engine_derivatives;
/// numeric values of erf, Si, Ci, Ei, Shi, Chi, Fresnel integrals and polylog
pub mod special_functions;
///________________________________________________________________________________________________________________________________________________
/// canonical simplification, expansion, common factors and the equality oracle
///# Example
/// ```rust, ignore
/// let e = Expr::parse_expression("x*exp(x) - exp(x)").unwrap();
/// assert_eq!(e.factor_common().to_string(), "(x - 1)*exp(x)");
/// ```
pub mod symbolic_simplify;
/// LaTeX rendering used by the solution steps
pub mod latex;
/// dense univariate polynomials, rational function views and polynomial roots
pub mod polynomial;
/// partial fraction decomposition over the reals
pub mod partial_fractions;
///________________________________________________________________________________________________________________________________________________
/// rule-based indefinite integration
///# Example
/// ```rust, ignore
/// let f = Expr::parse_expression("x^2*log(x)").unwrap();
/// let F = f.integrate("x").unwrap();
/// println!("antiderivative {}", F);
/// ```
pub mod symbolic_integration;
