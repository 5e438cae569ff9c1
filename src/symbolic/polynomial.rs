//! Dense univariate polynomials and the polynomial / rational-function views of [`Expr`].
//!
//! Coefficients are `f64` in ascending order. Roots come from the square-free part with
//! the Durand-Kerner iteration (`num-complex`), then get snapped to nearby simple
//! fractions; multiplicities are recovered by repeated exact division.
use crate::symbolic::symbolic_engine::Expr;
use num_complex::Complex64;

const COEFF_TOLERANCE: f64 = 1e-12;
const ROOT_SNAP_TOLERANCE: f64 = 1e-9;
const DIVISION_TOLERANCE: f64 = 1e-7;
const CANCELLATION_TOLERANCE: f64 = 1e-9;
const MAX_POWER: f64 = 50.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

/// A root with its multiplicity; complex roots are reported once per conjugate pair,
/// with positive imaginary part.
#[derive(Clone, Debug, PartialEq)]
pub struct Root {
    pub value: Complex64,
    pub multiplicity: usize,
}

impl Root {
    pub fn is_real(&self) -> bool {
        self.value.im == 0.0
    }
}

fn snap(v: f64) -> f64 {
    if v.abs() < ROOT_SNAP_TOLERANCE {
        return 0.0;
    }
    for d in 1..=12 {
        let k = (v * d as f64).round();
        if (v - k / d as f64).abs() < ROOT_SNAP_TOLERANCE {
            return k / d as f64;
        }
    }
    v
}

impl Polynomial {
    pub fn new(coeffs: Vec<f64>) -> Self {
        let mut p = Polynomial { coeffs };
        p.trim(0.0);
        p
    }

    pub fn zero() -> Self {
        Polynomial { coeffs: vec![0.0] }
    }

    pub fn constant(c: f64) -> Self {
        Polynomial::new(vec![c])
    }

    /// The identity polynomial `x`.
    pub fn x() -> Self {
        Polynomial::new(vec![0.0, 1.0])
    }

    fn trim(&mut self, tolerance: f64) {
        while self.coeffs.len() > 1 && self.coeffs.last().is_some_and(|c| c.abs() <= tolerance) {
            self.coeffs.pop();
        }
        if self.coeffs.is_empty() {
            self.coeffs.push(0.0);
        }
    }

    fn scale_of(&self) -> f64 {
        self.coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs()))
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| *c == 0.0)
    }

    pub fn is_constant(&self) -> bool {
        self.degree() == 0
    }

    pub fn leading(&self) -> f64 {
        self.coeffs[self.degree()]
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    pub fn eval_complex(&self, z: Complex64) -> Complex64 {
        self.coeffs
            .iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, c| acc * z + c)
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..n)
            .map(|i| self.coeffs.get(i).unwrap_or(&0.0) + other.coeffs.get(i).unwrap_or(&0.0))
            .collect();
        Polynomial::new(coeffs)
    }

    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.scale(-1.0))
    }

    pub fn scale(&self, k: f64) -> Polynomial {
        Polynomial::new(self.coeffs.iter().map(|c| c * k).collect())
    }

    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut coeffs = vec![0.0; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Polynomial::new(coeffs)
    }

    pub fn powi(&self, n: u32) -> Polynomial {
        (0..n).fold(Polynomial::constant(1.0), |acc, _| acc.mul(self))
    }

    /// Quotient and remainder; the divisor must not be the zero polynomial.
    pub fn div_rem(&self, divisor: &Polynomial) -> (Polynomial, Polynomial) {
        let dd = divisor.degree();
        if self.degree() < dd {
            return (Polynomial::zero(), self.clone());
        }
        let lead = divisor.leading();
        let mut rem = self.coeffs.clone();
        let mut quot = vec![0.0; self.degree() - dd + 1];
        for k in (0..quot.len()).rev() {
            let q = rem[k + dd] / lead;
            quot[k] = q;
            for (j, d) in divisor.coeffs.iter().enumerate() {
                rem[k + j] -= q * d;
            }
        }
        rem.truncate(dd.max(1));
        let mut remainder = Polynomial { coeffs: rem };
        remainder.trim(COEFF_TOLERANCE * self.scale_of().max(1.0));
        (Polynomial::new(quot), remainder)
    }

    pub fn derivative(&self) -> Polynomial {
        if self.degree() == 0 {
            return Polynomial::zero();
        }
        Polynomial::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, c)| c * i as f64)
                .collect(),
        )
    }

    /// Antiderivative with zero constant term.
    pub fn integral(&self) -> Polynomial {
        let mut coeffs = vec![0.0];
        coeffs.extend(self.coeffs.iter().enumerate().map(|(i, c)| c / (i + 1) as f64));
        Polynomial::new(coeffs)
    }

    pub fn monic(&self) -> Polynomial {
        self.scale(1.0 / self.leading())
    }

    fn is_negligible_against(&self, reference: &Polynomial) -> bool {
        self.scale_of() <= DIVISION_TOLERANCE * reference.scale_of().max(1.0)
    }

    /// Monic greatest common divisor by the Euclidean algorithm.
    pub fn gcd(&self, other: &Polynomial) -> Polynomial {
        let mut a = self.clone();
        let mut b = other.clone();
        if b.is_zero() {
            return a.monic();
        }
        loop {
            let (_, r) = a.div_rem(&b);
            if r.is_zero() || r.is_negligible_against(&a) {
                return b.monic();
            }
            a = b;
            b = r;
        }
    }

    fn divides_exactly(&self, divisor: &Polynomial) -> Option<Polynomial> {
        let (q, r) = self.div_rem(divisor);
        if r.is_zero() || r.is_negligible_against(self) {
            Some(q)
        } else {
            None
        }
    }

    /// Distinct roots with multiplicities.
    pub fn roots(&self) -> Vec<Root> {
        if self.degree() == 0 {
            return Vec::new();
        }
        let g = self.gcd(&self.derivative());
        let square_free = self.div_rem(&g).0;
        let mut out: Vec<Root> = Vec::new();
        for z in durand_kerner(&square_free) {
            let z = polish(&square_free, z);
            let value = Complex64::new(snap(z.re), snap(z.im));
            if value.im < 0.0 {
                continue;
            }
            let factor = if value.im == 0.0 {
                Polynomial::new(vec![-value.re, 1.0])
            } else {
                Polynomial::new(vec![value.norm_sqr(), -2.0 * value.re, 1.0])
            };
            let mut multiplicity = 0;
            let mut rest = self.clone();
            while let Some(q) = rest.divides_exactly(&factor) {
                multiplicity += 1;
                rest = q;
                if rest.degree() == 0 {
                    break;
                }
            }
            if out.iter().all(|r| (r.value - value).norm() > ROOT_SNAP_TOLERANCE) {
                out.push(Root {
                    value,
                    multiplicity: multiplicity.max(1),
                });
            }
        }
        out
    }

    /// Expression `Σ c_k var^k`, simplified.
    pub fn to_expr(&self, var: &str) -> Expr {
        let terms = self
            .coeffs
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(|(k, c)| match k {
                0 => Expr::Const(*c),
                1 => Expr::Const(*c) * Expr::var(var),
                _ => Expr::Const(*c) * Expr::var(var).powf(k as f64),
            })
            .collect();
        Expr::sum_of(terms).simplify()
    }
}

fn durand_kerner(p: &Polynomial) -> Vec<Complex64> {
    let n = p.degree();
    let monic = p.monic();
    let c = monic.coeffs();
    match n {
        0 => return Vec::new(),
        1 => return vec![Complex64::new(-c[0], 0.0)],
        2 => {
            let disc = Complex64::new(c[1] * c[1] - 4.0 * c[0], 0.0).sqrt();
            let b = Complex64::new(-c[1], 0.0);
            return vec![(b + disc) / 2.0, (b - disc) / 2.0];
        }
        _ => {}
    }
    let radius = 1.0 + c[..n].iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let seed = Complex64::new(0.4, 0.9);
    let mut z: Vec<Complex64> = (0..n)
        .map(|k| seed.powu(k as u32) * (radius / seed.norm().powi(k as i32).max(1e-12)).min(radius))
        .collect();
    for _ in 0..2000 {
        let mut max_step = 0.0f64;
        for i in 0..n {
            let mut den = Complex64::new(1.0, 0.0);
            for j in 0..n {
                if j != i {
                    den *= z[i] - z[j];
                }
            }
            if den.norm() == 0.0 {
                den = Complex64::new(1e-12, 1e-12);
            }
            let step = monic.eval_complex(z[i]) / den;
            z[i] -= step;
            max_step = max_step.max(step.norm());
        }
        if max_step < 1e-15 {
            break;
        }
    }
    z
}

fn polish(p: &Polynomial, mut z: Complex64) -> Complex64 {
    let dp = p.derivative();
    for _ in 0..5 {
        let d = dp.eval_complex(z);
        if d.norm() == 0.0 {
            break;
        }
        z -= p.eval_complex(z) / d;
    }
    z
}

fn rational_of(expr: &Expr, var: &str) -> Option<(Polynomial, Polynomial)> {
    let one = || Polynomial::constant(1.0);
    match expr {
        Expr::Const(c) if c.is_finite() => Some((Polynomial::constant(*c), one())),
        Expr::Var(v) if v == var => Some((Polynomial::x(), one())),
        Expr::Add(l, r) | Expr::Sub(l, r) => {
            let (a, b) = rational_of(l, var)?;
            let (c, d) = rational_of(r, var)?;
            let right = c.mul(&b);
            let left = a.mul(&d);
            let num = if matches!(expr, Expr::Add(..)) {
                left.add(&right)
            } else {
                left.sub(&right)
            };
            Some((num, b.mul(&d)))
        }
        Expr::Mul(l, r) => {
            let (a, b) = rational_of(l, var)?;
            let (c, d) = rational_of(r, var)?;
            Some((a.mul(&c), b.mul(&d)))
        }
        Expr::Div(l, r) => {
            let (a, b) = rational_of(l, var)?;
            let (c, d) = rational_of(r, var)?;
            if c.is_zero() {
                return None;
            }
            Some((a.mul(&d), b.mul(&c)))
        }
        Expr::Pow(base, exponent) => match exponent.as_ref() {
            Expr::Const(n) if n.fract() == 0.0 && n.abs() <= MAX_POWER => {
                let (a, b) = rational_of(base, var)?;
                let k = n.abs() as u32;
                if *n >= 0.0 {
                    Some((a.powi(k), b.powi(k)))
                } else if a.is_zero() {
                    None
                } else {
                    Some((b.powi(k), a.powi(k)))
                }
            }
            _ => None,
        },
        _ => None,
    }
}

fn is_monomial(expr: &Expr, var: &str) -> bool {
    match expr {
        Expr::Const(_) => true,
        Expr::Var(v) => v == var,
        Expr::Pow(b, e) => matches!((b.as_ref(), e.as_ref()), (Expr::Var(v), Expr::Const(_)) if v == var),
        Expr::Mul(l, r) => is_monomial(l, var) && is_monomial(r, var),
        _ => false,
    }
}

impl Expr {
    pub fn as_polynomial(&self, var: &str) -> Option<Polynomial> {
        let (num, den) = rational_of(self, var)?;
        if den.is_constant() {
            Some(num.scale(1.0 / den.leading()))
        } else {
            let (q, r) = num.div_rem(&den);
            if r.is_zero() { Some(q) } else { None }
        }
    }

    pub fn is_polynomial_in(&self, var: &str) -> bool {
        self.as_polynomial(var).is_some()
    }

    /// Reduced `(numerator, denominator)` with a monic denominator.
    pub fn as_rational_function(&self, var: &str) -> Option<(Polynomial, Polynomial)> {
        let (num, den) = rational_of(self, var)?;
        if den.is_zero() {
            return None;
        }
        let g = num.gcd(&den);
        let (num, den) = if g.degree() > 0 {
            (num.div_rem(&g).0, den.div_rem(&g).0)
        } else {
            (num, den)
        };
        let lead = den.leading();
        Some((num.scale(1.0 / lead), den.scale(1.0 / lead)))
    }

    pub fn is_rational_function_in(&self, var: &str) -> bool {
        self.as_rational_function(var).is_some()
    }

    /// True for a rational function of `var` whose combined numerator cancels to zero.
    pub fn is_zero_rational_function(&self, var: &str) -> bool {
        match rational_of(self, var) {
            Some((num, den)) if !den.is_zero() => {
                num.scale_of() <= CANCELLATION_TOLERANCE * den.scale_of().max(1.0)
            }
            _ => false,
        }
    }

    /// Sums and products of numbers, the variable and its numeric powers.
    pub fn is_generalized_polynomial(&self, var: &str) -> bool {
        match self {
            Expr::Const(_) => true,
            Expr::Var(v) => v == var,
            Expr::Pow(b, e) => {
                let numeric_exponent = e.is_number() && e.eval_everywhere(0.0).is_finite();
                match b.as_ref() {
                    Expr::Var(v) => v == var && numeric_exponent,
                    Expr::Const(_) => numeric_exponent,
                    _ => false,
                }
            }
            Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Mul(l, r) => {
                l.is_generalized_polynomial(var) && r.is_generalized_polynomial(var)
            }
            Expr::Div(l, r) => l.is_generalized_polynomial(var) && is_monomial(r, var),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(text: &str) -> Expr {
        Expr::parse_expression(text).unwrap()
    }

    #[test]
    fn test_arithmetic_and_division() {
        let a = Polynomial::new(vec![-1.0, 0.0, 1.0]); // x^2 - 1
        let b = Polynomial::new(vec![-1.0, 1.0]); // x - 1
        let (q, r) = a.div_rem(&b);
        assert_eq!(q, Polynomial::new(vec![1.0, 1.0]));
        assert!(r.is_zero());
        assert_eq!(b.mul(&b), Polynomial::new(vec![1.0, -2.0, 1.0]));
        assert_eq!(a.derivative(), Polynomial::new(vec![0.0, 2.0]));
        assert_eq!(b.integral(), Polynomial::new(vec![0.0, -1.0, 0.5]));
        assert_eq!(a.gcd(&b), b);
        assert_relative_eq!(a.eval(3.0), 8.0);
    }

    #[test]
    fn test_roots_with_multiplicity() {
        // (x - 1)^2 (x + 2)
        let poly = Polynomial::new(vec![2.0, -3.0, 0.0, 1.0]);
        let mut roots = poly.roots();
        roots.sort_by(|a, b| a.value.re.partial_cmp(&b.value.re).unwrap());
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].value, Complex64::new(-2.0, 0.0));
        assert_eq!(roots[0].multiplicity, 1);
        assert_eq!(roots[1].value, Complex64::new(1.0, 0.0));
        assert_eq!(roots[1].multiplicity, 2);
    }

    #[test]
    fn test_complex_roots_reported_once() {
        // (x^2 + 1)(x - 3)
        let poly = Polynomial::new(vec![-3.0, 1.0, -3.0, 1.0]);
        let roots = poly.roots();
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().any(|r| r.value == Complex64::new(0.0, 1.0)));
        assert!(roots.iter().any(|r| r.is_real() && r.value.re == 3.0));
    }

    #[test]
    fn test_expression_views() {
        let poly = p("(x+1)^2").as_polynomial("x").unwrap();
        assert_eq!(poly, Polynomial::new(vec![1.0, 2.0, 1.0]));
        assert!(p("x/2 + 3").is_polynomial_in("x"));
        assert!(!p("1/x").is_polynomial_in("x"));
        assert!(!p("sin(x)").is_polynomial_in("x"));
        let (num, den) = p("(x^2 - 1)/(x - 1)").as_rational_function("x").unwrap();
        assert_eq!(num, Polynomial::new(vec![1.0, 1.0]));
        assert_eq!(den, Polynomial::constant(1.0));
        let (num, den) = p("1/(2*x^2 + 2)").as_rational_function("x").unwrap();
        assert_eq!(num, Polynomial::constant(0.5));
        assert_eq!(den, Polynomial::new(vec![1.0, 0.0, 1.0]));
        assert!(!p("sqrt(1 - x^2)").is_rational_function_in("x"));
        assert_eq!(Polynomial::new(vec![1.0, 0.0, 3.0]).to_expr("x").to_string(), "3*x**2 + 1");
    }

    #[test]
    fn test_cancelling_rational_functions() {
        assert!(p("1/(2*(x - 1)) - 1/(2*(x + 1)) - 1/(x^2 - 1)").is_zero_rational_function("x"));
        assert!(p("5/(x - 2) - 4/(x - 1) - (x + 3)/(x^2 - 3*x + 2)").is_zero_rational_function("x"));
        assert!(!p("1/(x - 1) - 1/(x + 1)").is_zero_rational_function("x"));
        assert!(!p("log(x) - log(x)").is_zero_rational_function("x"));
    }

    #[test]
    fn test_generalized_polynomial() {
        assert!(p("x^2 + 3*x - 1/2").is_generalized_polynomial("x"));
        assert!(p("x^-1 + x^(1/2)").is_generalized_polynomial("x"));
        assert!(p("1/x").is_generalized_polynomial("x"));
        assert!(p("x^(-1/2) + 2^(1/2)*x").is_generalized_polynomial("x"));
        assert!(!p("x^x").is_generalized_polynomial("x"));
        assert!(!p("(x+1)^2").is_generalized_polynomial("x"));
        assert!(!p("x*exp(x)").is_generalized_polynomial("x"));
    }
}
