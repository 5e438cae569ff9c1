//! Partial fraction decomposition of proper and improper rational functions.
//!
//! The denominator is factored from its roots into linear powers `(x - r)^k` and
//! powers of irreducible quadratics `(x^2 + p x + q)^k`; the unknown numerators come from
//! one dense linear system solved with nalgebra's LU decomposition.
use crate::symbolic::polynomial::Polynomial;
use crate::symbolic::symbolic_engine::{Expr, Func};
use crate::symbolic::symbolic_integration::CasError;
use crate::symbolic::symbolic_simplify::as_fraction;
use log::debug;
use nalgebra::{DMatrix, DVector};

const COEFF_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq)]
pub enum FractionTerm {
    /// `coeff / (x - root)^power`
    Linear { root: f64, power: usize, coeff: f64 },
    /// `(b x + c) / (x^2 + p x + q)^power`
    Quadratic {
        p: f64,
        q: f64,
        power: usize,
        b: f64,
        c: f64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartialFractions {
    pub polynomial_part: Polynomial,
    pub terms: Vec<FractionTerm>,
}

enum Basis {
    Linear { root: f64, power: usize },
    Quadratic {
        p: f64,
        q: f64,
        power: usize,
        times_x: bool,
    },
}

fn linear_factor(root: f64) -> Polynomial {
    Polynomial::new(vec![-root, 1.0])
}

fn quadratic_factor(p: f64, q: f64) -> Polynomial {
    Polynomial::new(vec![q, p, 1.0])
}

fn clean(c: f64) -> f64 {
    if c.abs() < COEFF_TOLERANCE {
        return 0.0;
    }
    match as_fraction(c) {
        Some(r) => *r.numer() as f64 / *r.denom() as f64,
        None => c,
    }
}

/// Splits `num/den` into a polynomial part and simple fractions.
pub fn decompose(num: &Polynomial, den: &Polynomial) -> Result<PartialFractions, CasError> {
    if den.is_zero() {
        return Err(CasError::Singularity("zero denominator".to_string()));
    }
    let (polynomial_part, remainder) = num.div_rem(den);
    if den.is_constant() || remainder.is_zero() {
        return Ok(PartialFractions {
            polynomial_part,
            terms: Vec::new(),
        });
    }
    let monic = den.monic();
    let remainder = remainder.scale(1.0 / den.leading());

    let mut basis = Vec::new();
    for root in monic.roots() {
        if root.is_real() {
            for power in 1..=root.multiplicity {
                basis.push(Basis::Linear {
                    root: root.value.re,
                    power,
                });
            }
        } else {
            let p = -2.0 * root.value.re;
            let q = root.value.norm_sqr();
            for power in 1..=root.multiplicity {
                for times_x in [true, false] {
                    basis.push(Basis::Quadratic { p, q, power, times_x });
                }
            }
        }
    }
    let n = monic.degree();
    if basis.len() != n {
        return Err(CasError::Decomposition(format!(
            "recovered {} of {} denominator factors",
            basis.len(),
            n
        )));
    }

    let columns: Vec<Polynomial> = basis
        .iter()
        .map(|b| match b {
            Basis::Linear { root, power } => {
                monic.div_rem(&linear_factor(*root).powi(*power as u32)).0
            }
            Basis::Quadratic { p, q, power, times_x } => {
                let cofactor = monic.div_rem(&quadratic_factor(*p, *q).powi(*power as u32)).0;
                if *times_x { cofactor.mul(&Polynomial::x()) } else { cofactor }
            }
        })
        .collect();
    let matrix = DMatrix::from_fn(n, n, |i, j| columns[j].coeffs().get(i).copied().unwrap_or(0.0));
    let rhs = DVector::from_fn(n, |i, _| remainder.coeffs().get(i).copied().unwrap_or(0.0));
    let solution = matrix
        .lu()
        .solve(&rhs)
        .ok_or_else(|| CasError::Decomposition("singular coefficient system".to_string()))?;
    debug!("partial fraction coefficients: {:?}", solution.as_slice());

    let mut terms = Vec::new();
    let mut i = 0;
    while i < basis.len() {
        match basis[i] {
            Basis::Linear { root, power } => {
                let coeff = clean(solution[i]);
                if coeff != 0.0 {
                    terms.push(FractionTerm::Linear { root, power, coeff });
                }
                i += 1;
            }
            Basis::Quadratic { p, q, power, .. } => {
                let (b, c) = (clean(solution[i]), clean(solution[i + 1]));
                if b != 0.0 || c != 0.0 {
                    terms.push(FractionTerm::Quadratic { p, q, power, b, c });
                }
                i += 2;
            }
        }
    }
    Ok(PartialFractions {
        polynomial_part,
        terms,
    })
}

/// `sqrt(c)` kept symbolic when `c` is a simple fraction.
pub(crate) fn exact_sqrt(c: f64) -> Expr {
    match as_fraction(c) {
        Some(_) => Expr::Const(c).sqrt().simplify(),
        None => Expr::Const(c.sqrt()),
    }
}

fn quadratic_expr(p: f64, q: f64, var: &str) -> Expr {
    let x = Expr::var(var);
    (x.clone().powf(2.0) + Expr::Const(p) * x + Expr::Const(q)).simplify()
}

/// `∫ dx / Q^k` for an irreducible `Q = x^2 + p x + q`, reduced step by step with
/// `I_k = t/(2a²(k-1)Q^(k-1)) + (2k-3)/(2a²(k-1)) I_(k-1)`, `t = x + p/2`, `a² = q - p²/4`.
fn reciprocal_quadratic_power(p: f64, q: f64, power: usize, var: &str) -> Expr {
    let x = Expr::var(var);
    if power <= 1 {
        let root = exact_sqrt(4.0 * q - p * p);
        let atan_arg = (Expr::Const(2.0) * x + Expr::Const(p)) / root.clone();
        return Expr::Const(2.0) / root * atan_arg.simplify().apply(Func::Atan);
    }
    let m = (power - 1) as f64;
    let a2 = q - p * p / 4.0;
    let t = x + Expr::Const(p / 2.0);
    Expr::Const(1.0 / (2.0 * a2 * m)) * t / quadratic_expr(p, q, var).powf(m)
        + Expr::Const((2.0 * m - 1.0) / (2.0 * a2 * m))
            * reciprocal_quadratic_power(p, q, power - 1, var)
}

impl FractionTerm {
    pub fn to_expr(&self, var: &str) -> Expr {
        let x = Expr::var(var);
        match *self {
            FractionTerm::Linear { root, power, coeff } => {
                Expr::Const(coeff) / (x - Expr::Const(root)).powf(power as f64)
            }
            FractionTerm::Quadratic { p, q, power, b, c } => {
                (Expr::Const(b) * x + Expr::Const(c)) / quadratic_expr(p, q, var).powf(power as f64)
            }
        }
        .simplify()
    }

    /// Closed-form antiderivative of the term.
    pub fn integrate(&self, var: &str) -> Expr {
        let x = Expr::var(var);
        match *self {
            // ∫ A/(x - r) dx = A*ln(x - r)
            FractionTerm::Linear { root, power: 1, coeff } => {
                Expr::Const(coeff) * (x - Expr::Const(root)).simplify().ln()
            }
            // ∫ A/(x - r)^k dx = -A/((k - 1)(x - r)^(k - 1))
            FractionTerm::Linear { root, power, coeff } => {
                let k = power as f64;
                Expr::Const(-coeff / (k - 1.0)) / (x - Expr::Const(root)).powf(k - 1.0)
            }
            // Bx + C = (B/2)(2x + p) + (C - Bp/2); the first half integrates to a log or a
            // power of Q, the second to the atan reduction chain
            FractionTerm::Quadratic { p, q, power, b, c } => {
                let quadratic = quadratic_expr(p, q, var);
                let derivative_part = if power == 1 {
                    Expr::Const(b / 2.0) * quadratic.ln()
                } else {
                    let m = (power - 1) as f64;
                    Expr::Const(-b / (2.0 * m)) / quadratic.powf(m)
                };
                let rest = c - b * p / 2.0;
                if rest.abs() < COEFF_TOLERANCE {
                    derivative_part
                } else {
                    derivative_part + Expr::Const(rest) * reciprocal_quadratic_power(p, q, power, var)
                }
            }
        }
        .simplify()
    }
}

impl PartialFractions {
    pub fn to_expr(&self, var: &str) -> Expr {
        let mut parts = vec![self.polynomial_part.to_expr(var)];
        parts.extend(self.terms.iter().map(|t| t.to_expr(var)));
        Expr::sum_of(parts).simplify()
    }

    pub fn integrate(&self, var: &str) -> Expr {
        let mut parts = vec![self.polynomial_part.integral().to_expr(var)];
        parts.extend(self.terms.iter().map(|t| t.integrate(var)));
        Expr::sum_of(parts).simplify()
    }
}

impl Expr {
    /// Partial fraction form of a rational function of `var`.
    pub fn apart(&self, var: &str) -> Result<Expr, CasError> {
        let (num, den) = self
            .as_rational_function(var)
            .ok_or_else(|| CasError::NoRule(format!("{} is not a rational function of {}", self, var)))?;
        Ok(decompose(&num, &den)?.to_expr(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(text: &str) -> Expr {
        Expr::parse_expression(text).unwrap()
    }

    fn check_antiderivative(integrand: &str) {
        let f = p(integrand);
        let (num, den) = f.as_rational_function("x").unwrap();
        let antiderivative = decompose(&num, &den).unwrap().integrate("x");
        let derivative = antiderivative.diff("x");
        for x in [2.5, 3.7, 5.1] {
            assert_relative_eq!(
                derivative.eval_at("x", x),
                f.eval_at("x", x),
                epsilon = 1e-8,
                max_relative = 1e-8
            );
        }
    }

    #[test]
    fn test_simple_linear_factors() {
        let (num, den) = p("1/(x^2 - 1)").as_rational_function("x").unwrap();
        let pf = decompose(&num, &den).unwrap();
        assert_eq!(pf.terms.len(), 2);
        assert!(pf.polynomial_part.is_zero());
        assert!(pf.terms.contains(&FractionTerm::Linear {
            root: 1.0,
            power: 1,
            coeff: 0.5
        }));
        assert_eq!(p("1/(x^2 - 1)").apart("x").unwrap().to_string(), "1/(2*(x - 1)) - 1/(2*(x + 1))");
    }

    #[test]
    fn test_antiderivatives_differentiate_back() {
        check_antiderivative("1/(x^2 - 1)");
        check_antiderivative("(x^3 + 1)/(x^2 - 3*x + 2)");
        check_antiderivative("1/(x*(x - 1)^2)");
        check_antiderivative("(2*x + 3)/(x^2 + 2*x + 5)");
        check_antiderivative("1/((x - 1)*(x^2 + 1))");
    }

    #[test]
    fn test_repeated_quadratic_factors() {
        let (num, den) = p("1/(x^2 + 1)^2").as_rational_function("x").unwrap();
        let pf = decompose(&num, &den).unwrap();
        assert_eq!(
            pf.terms,
            vec![FractionTerm::Quadratic {
                p: 0.0,
                q: 1.0,
                power: 2,
                b: 0.0,
                c: 1.0
            }]
        );
        // x/(2(x^2 + 1)) + atan(x)/2
        let antiderivative = pf.integrate("x");
        assert_relative_eq!(
            antiderivative.eval_at("x", 1.0),
            0.25 + std::f64::consts::PI / 8.0,
            epsilon = 1e-12
        );
        check_antiderivative("1/(x^2 + 1)^2");
        check_antiderivative("(x^3 + 2)/(x^2 + 2*x + 5)^2");
        check_antiderivative("1/((x - 1)*(x^2 + 1)^3)");
    }
}
