//! # Symbolic Engine Derivatives Module
//!
//! Analytical differentiation and numeric evaluation of [`Expr`].
//!
//! ## Key Methods
//! - `diff(var)` - derivative by the chain, product, quotient and general power rules.
//!   The raw result is not simplified; callers run `simplify()` when they need a
//!   canonical form.
//! - `eval_at(var, value)` / `eval_expression(vars, values)` - direct evaluation; an
//!   unbound variable evaluates to NaN instead of panicking
//! - `lambdify1D(var)` - an owned `Fn(f64) -> f64` closure, `Send + Sync` so numeric
//!   code can evaluate it from rayon workers
use crate::symbolic::special_functions as special;
use crate::symbolic::symbolic_engine::{Expr, Func, NamedConst};
use std::f64::consts::PI;

fn two_over_sqrt_pi() -> Expr {
    Expr::Const(2.0) / Expr::Named(NamedConst::Pi).sqrt()
}

impl Func {
    /// d/du f(u) as an expression in `u`.
    pub fn derivative_at(self, u: &Expr) -> Expr {
        let u = u.clone();
        let one = || Expr::Const(1.0);
        match self {
            Func::Sin => u.cos(),
            Func::Cos => -u.sin(),
            Func::Tan => u.cos().powf(-2.0),
            Func::Cot => -(u.sin().powf(-2.0)),
            Func::Sec => u.clone().apply(Func::Sec) * u.apply(Func::Tan),
            Func::Csc => -(u.clone().apply(Func::Csc) * u.apply(Func::Cot)),
            Func::Asin => one() / (one() - u.powf(2.0)).sqrt(),
            Func::Acos => -(one() / (one() - u.powf(2.0)).sqrt()),
            Func::Atan => one() / (one() + u.powf(2.0)),
            Func::Acot => -(one() / (one() + u.powf(2.0))),
            Func::Sinh => u.apply(Func::Cosh),
            Func::Cosh => u.apply(Func::Sinh),
            Func::Tanh => u.apply(Func::Cosh).powf(-2.0),
            Func::Exp => u.exp(),
            Func::Ln => one() / u,
            Func::Erf => two_over_sqrt_pi() * (-(u.powf(2.0))).exp(),
            Func::Erfc => -(two_over_sqrt_pi() * (-(u.powf(2.0))).exp()),
            Func::Erfi => two_over_sqrt_pi() * u.powf(2.0).exp(),
            Func::Ei => u.clone().exp() / u,
            Func::Si => u.clone().sin() / u,
            Func::Ci => u.clone().cos() / u,
            Func::Shi => u.clone().apply(Func::Sinh) / u,
            Func::Chi => u.clone().apply(Func::Cosh) / u,
            Func::FresnelS => (Expr::Named(NamedConst::Pi) * u.powf(2.0) / Expr::Const(2.0)).sin(),
            Func::FresnelC => (Expr::Named(NamedConst::Pi) * u.powf(2.0) / Expr::Const(2.0)).cos(),
        }
    }

    pub fn evaluate(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Cot => 1.0 / x.tan(),
            Func::Sec => 1.0 / x.cos(),
            Func::Csc => 1.0 / x.sin(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Acot => PI / 2.0 - x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Erf => special::erf(x),
            Func::Erfc => special::erfc(x),
            Func::Erfi => special::erfi(x),
            Func::Ei => special::ei(x),
            Func::Si => special::si(x),
            Func::Ci => special::ci(x),
            Func::Shi => special::shi(x),
            Func::Chi => special::chi(x),
            Func::FresnelS => special::fresnel_s(x),
            Func::FresnelC => special::fresnel_c(x),
        }
    }
}

impl Expr {
    pub fn diff(&self, var: &str) -> Expr {
        if !self.contains_variable(var) {
            return Expr::Const(0.0);
        }
        match self {
            Expr::Var(name) => Expr::Const(if name == var { 1.0 } else { 0.0 }),
            Expr::Const(_) | Expr::Named(_) => Expr::Const(0.0),
            Expr::Add(l, r) => l.diff(var) + r.diff(var),
            Expr::Sub(l, r) => l.diff(var) - r.diff(var),
            // factors free of `var` are kept out of the rule: 0*log(-1) would evaluate to NaN
            Expr::Mul(l, r) if !l.contains_variable(var) => *l.clone() * r.diff(var),
            Expr::Mul(l, r) if !r.contains_variable(var) => l.diff(var) * *r.clone(),
            Expr::Mul(l, r) => l.diff(var) * *r.clone() + *l.clone() * r.diff(var),
            Expr::Div(l, r) if !r.contains_variable(var) => l.diff(var) / *r.clone(),
            Expr::Div(l, r) => {
                (l.diff(var) * *r.clone() - *l.clone() * r.diff(var)) / r.as_ref().clone().powf(2.0)
            }
            Expr::Pow(base, exponent) => {
                let b = base.as_ref().clone();
                let e = exponent.as_ref().clone();
                if !e.contains_variable(var) {
                    let lowered = match &e {
                        Expr::Const(n) => Expr::Const(n - 1.0),
                        _ => e.clone() - Expr::Const(1.0),
                    };
                    e * b.clone().pow(lowered) * b.diff(var)
                } else if !b.contains_variable(var) {
                    self.clone() * b.ln() * e.diff(var)
                } else {
                    self.clone() * (e.diff(var) * b.clone().ln() + e * b.diff(var) / b)
                }
            }
            Expr::Func(f, arg) => {
                let outer = f.derivative_at(arg);
                let inner = arg.diff(var);
                if inner.is_one() { outer } else { outer * inner }
            }
            Expr::Polylog(s, z) => {
                let lowered = Expr::Polylog((s.as_ref().clone() - Expr::Const(1.0)).boxed(), z.clone());
                lowered / z.as_ref().clone() * z.diff(var)
            }
        }
    }

    /// Evaluates with a name lookup; unbound names give NaN.
    pub fn eval_with<L>(&self, lookup: &L) -> f64
    where
        L: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Var(name) => lookup(name).unwrap_or(f64::NAN),
            Expr::Const(c) => *c,
            Expr::Named(n) => n.value(),
            Expr::Add(l, r) => l.eval_with(lookup) + r.eval_with(lookup),
            Expr::Sub(l, r) => l.eval_with(lookup) - r.eval_with(lookup),
            Expr::Mul(l, r) => l.eval_with(lookup) * r.eval_with(lookup),
            Expr::Div(l, r) => l.eval_with(lookup) / r.eval_with(lookup),
            Expr::Pow(b, e) => {
                let base = b.eval_with(lookup);
                let exponent = e.eval_with(lookup);
                if exponent.fract() == 0.0 && exponent.abs() < i32::MAX as f64 {
                    base.powi(exponent as i32)
                } else {
                    base.powf(exponent)
                }
            }
            Expr::Func(f, arg) => f.evaluate(arg.eval_with(lookup)),
            Expr::Polylog(s, z) => special::polylog(s.eval_with(lookup), z.eval_with(lookup)),
        }
    }

    pub fn eval_at(&self, var: &str, value: f64) -> f64 {
        self.eval_with(&|name: &str| if name == var { Some(value) } else { None })
    }

    pub fn eval_expression(&self, vars: &[&str], values: &[f64]) -> f64 {
        self.eval_with(&|name: &str| {
            vars.iter()
                .position(|v| *v == name)
                .and_then(|i| values.get(i).copied())
        })
    }

    /// Value with every variable set to `value`.
    pub fn eval_everywhere(&self, value: f64) -> f64 {
        self.eval_with(&|_: &str| Some(value))
    }

    pub fn lambdify1D(&self, var: &str) -> Box<dyn Fn(f64) -> f64 + Send + Sync> {
        let expr = self.clone();
        let var = var.to_string();
        Box::new(move |x| expr.eval_at(&var, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn x() -> Expr {
        Expr::Var("x".to_string())
    }

    fn numeric_derivative(e: &Expr, at: f64) -> f64 {
        let h = 1e-6;
        (e.eval_at("x", at + h) - e.eval_at("x", at - h)) / (2.0 * h)
    }

    #[test]
    fn test_diff_matches_finite_differences() {
        let cases = [
            "x^3 - 2*x",
            "sin(x)*exp(x)",
            "log(x)/x",
            "sqrt(1 - x^2)",
            "atan(2*x + 1)",
            "x^x",
            "2^x",
            "tan(x)",
            "sec(x)",
            "acot(x)",
            "erf(x)",
            "Si(x)",
        ];
        for text in cases {
            let e = Expr::parse_expression(text).unwrap();
            let d = e.diff("x");
            assert_relative_eq!(
                d.eval_at("x", 0.4),
                numeric_derivative(&e, 0.4),
                epsilon = 1e-6,
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn test_constant_factor_outside_domain_keeps_derivative_finite() {
        // log(x - 2) is NaN at 0.35 but its derivative is not
        let e = Expr::parse_expression("5*log(x - 2) - 4*log(x - 1)").unwrap();
        let d = e.diff("x");
        assert_relative_eq!(
            d.eval_at("x", 0.35),
            5.0 / (0.35 - 2.0) - 4.0 / (0.35 - 1.0),
            epsilon = 1e-12
        );
        let quotient = Expr::parse_expression("log(x - 3)/2").unwrap().diff("x");
        assert_relative_eq!(quotient.eval_at("x", 0.2), 0.5 / (0.2 - 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_diff_of_constant_and_other_variable() {
        assert_eq!(Expr::Const(3.0).diff("x"), Expr::Const(0.0));
        assert_eq!(Expr::var("y").diff("x"), Expr::Const(0.0));
        assert_eq!(x().diff("x"), Expr::Const(1.0));
    }

    #[test]
    fn test_eval_helpers() {
        let e = Expr::parse_expression("x*y + pi").unwrap();
        assert_relative_eq!(e.eval_expression(&["x", "y"], &[2.0, 3.0]), 6.0 + PI);
        assert!(e.eval_at("x", 1.0).is_nan());
        assert_relative_eq!(e.eval_everywhere(1.0), 1.0 + PI);
        let f = x().powf(2.0).lambdify1D("x");
        assert_relative_eq!(f(3.0), 9.0);
        assert_relative_eq!(Expr::parse_expression("(-2)^3").unwrap().eval_at("x", 0.0), -8.0);
    }
}
