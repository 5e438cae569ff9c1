//! LaTeX rendering of expressions for the solution step log.
use crate::symbolic::symbolic_engine::{Expr, Func, NamedConst, format_number};
use crate::symbolic::symbolic_simplify::as_fraction;

const GREEK: [&str; 12] = [
    "alpha", "beta", "gamma", "delta", "epsilon", "theta", "lambda", "mu", "phi", "psi", "rho",
    "omega",
];

fn variable(name: &str) -> String {
    if GREEK.contains(&name) {
        format!("\\{}", name)
    } else {
        name.to_string()
    }
}

fn number(c: f64) -> String {
    match as_fraction(c.abs()) {
        Some(r) if *r.denom() != 1 => {
            let frac = format!("\\frac{{{}}}{{{}}}", r.numer(), r.denom());
            if c < 0.0 { format!("-{}", frac) } else { frac }
        }
        _ => format_number(c),
    }
}

fn function_name(f: Func) -> &'static str {
    match f {
        Func::Sin => "\\sin",
        Func::Cos => "\\cos",
        Func::Tan => "\\tan",
        Func::Cot => "\\cot",
        Func::Sec => "\\sec",
        Func::Csc => "\\csc",
        Func::Asin => "\\operatorname{asin}",
        Func::Acos => "\\operatorname{acos}",
        Func::Atan => "\\operatorname{atan}",
        Func::Acot => "\\operatorname{acot}",
        Func::Sinh => "\\sinh",
        Func::Cosh => "\\cosh",
        Func::Tanh => "\\tanh",
        Func::Exp => "\\exp",
        Func::Ln => "\\log",
        Func::Erf => "\\operatorname{erf}",
        Func::Erfc => "\\operatorname{erfc}",
        Func::Erfi => "\\operatorname{erfi}",
        Func::Ei => "\\operatorname{Ei}",
        Func::Si => "\\operatorname{Si}",
        Func::Ci => "\\operatorname{Ci}",
        Func::Shi => "\\operatorname{Shi}",
        Func::Chi => "\\operatorname{Chi}",
        Func::FresnelS => "S",
        Func::FresnelC => "C",
    }
}

fn paren(e: &Expr, wrap: bool) -> String {
    if wrap {
        format!("\\left({}\\right)", e.to_latex())
    } else {
        e.to_latex()
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '\\' && s.starts_with("\\frac"))
}

impl Expr {
    pub fn to_latex(&self) -> String {
        match self {
            Expr::Var(name) => variable(name),
            Expr::Const(c) => number(*c),
            Expr::Named(NamedConst::Pi) => "\\pi".to_string(),
            Expr::Named(NamedConst::E) => "e".to_string(),
            Expr::Named(NamedConst::Infinity) => "\\infty".to_string(),
            Expr::Add(l, r) => match r.as_ref() {
                Expr::Const(c) if *c < 0.0 => format!("{} - {}", l.to_latex(), number(-c)),
                _ => format!("{} + {}", l.to_latex(), r.to_latex()),
            },
            Expr::Sub(l, r) => format!("{} - {}", l.to_latex(), paren(r, r.precedence() <= 1)),
            Expr::Mul(l, r) => match l.as_ref() {
                Expr::Const(c) if *c == -1.0 => format!("-{}", paren(r, r.precedence() < 2)),
                _ => {
                    let left = paren(l, l.precedence() < 2);
                    let right = paren(r, r.precedence() < 2);
                    if starts_with_digit(&right) {
                        format!("{} \\cdot {}", left, right)
                    } else {
                        format!("{} {}", left, right)
                    }
                }
            },
            Expr::Div(l, r) => format!("\\frac{{{}}}{{{}}}", l.to_latex(), r.to_latex()),
            Expr::Pow(b, e) => match (b.as_ref(), e.as_ref()) {
                (_, Expr::Const(h)) if *h == 0.5 => format!("\\sqrt{{{}}}", b.to_latex()),
                (_, Expr::Const(h)) if *h == -0.5 => format!("\\frac{{1}}{{\\sqrt{{{}}}}}", b.to_latex()),
                (Expr::Func(f, arg), Expr::Const(n)) if *n > 0.0 && *f != Func::Exp => format!(
                    "{}^{{{}}}{{\\left({} \\right)}}",
                    function_name(*f),
                    number(*n),
                    arg.to_latex()
                ),
                _ => format!("{}^{{{}}}", paren(b, b.precedence() <= 3), e.to_latex()),
            },
            Expr::Func(Func::Exp, arg) => format!("e^{{{}}}", arg.to_latex()),
            Expr::Func(f, arg) => format!("{}{{\\left({} \\right)}}", function_name(*f), arg.to_latex()),
            Expr::Polylog(s, z) => format!(
                "\\operatorname{{Li}}_{{{}}}\\left({}\\right)",
                s.to_latex(),
                z.to_latex()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latex(text: &str) -> String {
        Expr::parse_expression(text).unwrap().simplify().to_latex()
    }

    #[test]
    fn test_latex_rendering() {
        assert_eq!(latex("x^3/3"), "\\frac{x^{3}}{3}");
        assert_eq!(latex("sqrt(1 - x^2)"), "\\sqrt{1 - x^{2}}");
        assert_eq!(latex("sin(x)^2"), "\\sin^{2}{\\left(x \\right)}");
        assert_eq!(latex("exp(2*x)"), "e^{2 x}");
        assert_eq!(latex("log(x)"), "\\log{\\left(x \\right)}");
        assert_eq!(latex("theta"), "\\theta");
        assert_eq!(latex("pi/2"), "\\frac{\\pi}{2}");
        assert_eq!(Expr::Const(-0.5).to_latex(), "-\\frac{1}{2}");
    }
}
