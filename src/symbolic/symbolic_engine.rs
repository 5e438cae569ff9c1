//! # Symbolic Engine Module
//!
//! Core expression tree of the calculus engine. Every other part of the crate (the
//! simplifier, the differentiator, the backend integrator, the technique recognizers
//! and the polar-area engine) walks values of [`Expr`].
//!
//! ## Main Structures
//!
//! ### `Expr` Enum
//! - **Variables**: `Var(String)` - symbolic variables like "x", "t", "theta"
//! - **Constants**: `Const(f64)` numeric constants and `Named(NamedConst)` for the
//!   exact constants pi, e and infinity
//! - **Operations**: `Add`, `Sub`, `Mul`, `Div`, `Pow`
//! - **Functions**: `Func(Func, arg)` over a closed function set, `Polylog(s, z)`
//!
//! `sqrt(u)` has no node of its own, it is `Pow(u, 0.5)` and is printed back as `sqrt(u)`.
//!
//! ### `Func` Enum
//! The closed set of one-argument functions the engine knows, including the
//! non-elementary special functions that appear in antiderivatives with no elementary
//! form. Names (and their aliases such as `ln`, `tg`, `arcsin`) are derived with strum.
//!
//! ## Interesting Code Features
//! 1. **Operator Overloading**: `std::ops` traits give `x.clone() * x + Expr::Const(1.0)`
//! 2. **Precedence-aware Display**: printed text parses back to the same tree, so
//!    results can be handed to the parser again
//! 3. **Generic traversal**: `map_children` keeps every structural transform a few lines

use std::collections::BTreeSet;
use std::f64::consts::{E, PI};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// One-argument functions known to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Func {
    Sin,
    Cos,
    #[strum(to_string = "tan", serialize = "tg")]
    Tan,
    #[strum(to_string = "cot", serialize = "ctg")]
    Cot,
    Sec,
    Csc,
    #[strum(to_string = "asin", serialize = "arcsin")]
    Asin,
    #[strum(to_string = "acos", serialize = "arccos")]
    Acos,
    #[strum(to_string = "atan", serialize = "arctan", serialize = "arctg")]
    Atan,
    #[strum(to_string = "acot", serialize = "arccot", serialize = "arcctg")]
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    #[strum(to_string = "log", serialize = "ln")]
    Ln,
    Erf,
    Erfc,
    Erfi,
    #[strum(to_string = "Ei")]
    Ei,
    #[strum(to_string = "Si")]
    Si,
    #[strum(to_string = "Ci")]
    Ci,
    #[strum(to_string = "Shi")]
    Shi,
    #[strum(to_string = "Chi")]
    Chi,
    FresnelS,
    FresnelC,
}

impl Func {
    pub fn is_trig(self) -> bool {
        matches!(
            self,
            Func::Sin | Func::Cos | Func::Tan | Func::Cot | Func::Sec | Func::Csc
        )
    }

    pub fn is_inverse_trig(self) -> bool {
        matches!(self, Func::Asin | Func::Acos | Func::Atan | Func::Acot)
    }

    pub fn is_hyperbolic(self) -> bool {
        matches!(self, Func::Sinh | Func::Cosh | Func::Tanh)
    }

    /// Special functions that only show up in non-elementary antiderivatives.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            Func::Erf
                | Func::Erfc
                | Func::Erfi
                | Func::Ei
                | Func::Si
                | Func::Ci
                | Func::Shi
                | Func::Chi
                | Func::FresnelS
                | Func::FresnelC
        )
    }
}

/// Exact named constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum NamedConst {
    #[strum(to_string = "pi")]
    Pi,
    #[strum(to_string = "E")]
    E,
    #[strum(to_string = "oo")]
    Infinity,
}

impl NamedConst {
    pub fn value(self) -> f64 {
        match self {
            NamedConst::Pi => PI,
            NamedConst::E => E,
            NamedConst::Infinity => f64::INFINITY,
        }
    }
}

/// Symbolic expression tree.
///
/// # Examples
/// ```rust, ignore
/// use RustedCalculus::symbolic::symbolic_engine::Expr;
/// let x = Expr::Var("x".to_string());
/// let expr = x.clone().pow(Expr::Const(2.0)) + Expr::Const(1.0);
/// assert_eq!(expr.to_string(), "x**2 + 1");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Symbolic variable with a name (e.g., "x", "theta")
    Var(String),
    /// Numerical constant value
    Const(f64),
    /// pi, e or infinity
    Named(NamedConst),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// base ^ exponent
    Pow(Box<Expr>, Box<Expr>),
    /// f(arg) for f in the closed function set
    Func(Func, Box<Expr>),
    /// polylog(s, z)
    Polylog(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        Expr::Pow(self.boxed(), rhs.boxed())
    }

    pub fn powf(self, n: f64) -> Expr {
        Expr::Pow(self.boxed(), Expr::Const(n).boxed())
    }

    pub fn sqrt(self) -> Expr {
        self.powf(0.5)
    }

    pub fn apply(self, f: Func) -> Expr {
        Expr::Func(f, self.boxed())
    }

    pub fn exp(self) -> Expr {
        self.apply(Func::Exp)
    }

    pub fn ln(self) -> Expr {
        self.apply(Func::Ln)
    }

    pub fn sin(self) -> Expr {
        self.apply(Func::Sin)
    }

    pub fn cos(self) -> Expr {
        self.apply(Func::Cos)
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 1.0)
    }

    /// Direct sub-expressions in left-to-right order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Var(_) | Expr::Const(_) | Expr::Named(_) => Vec::new(),
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Pow(l, r)
            | Expr::Polylog(l, r) => vec![l.as_ref(), r.as_ref()],
            Expr::Func(_, arg) => vec![arg.as_ref()],
        }
    }

    /// Rebuilds the node with `f` applied to each direct child.
    pub fn map_children<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self {
            Expr::Var(_) | Expr::Const(_) | Expr::Named(_) => self.clone(),
            Expr::Add(l, r) => Expr::Add(f(l).boxed(), f(r).boxed()),
            Expr::Sub(l, r) => Expr::Sub(f(l).boxed(), f(r).boxed()),
            Expr::Mul(l, r) => Expr::Mul(f(l).boxed(), f(r).boxed()),
            Expr::Div(l, r) => Expr::Div(f(l).boxed(), f(r).boxed()),
            Expr::Pow(l, r) => Expr::Pow(f(l).boxed(), f(r).boxed()),
            Expr::Polylog(l, r) => Expr::Polylog(f(l).boxed(), f(r).boxed()),
            Expr::Func(func, arg) => Expr::Func(*func, f(arg).boxed()),
        }
    }

    /// All nodes in preorder, the root first.
    pub fn preorder(&self) -> Vec<&Expr> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.preorder());
        }
        out
    }

    pub fn contains_variable(&self, var: &str) -> bool {
        match self {
            Expr::Var(name) => name == var,
            _ => self.children().iter().any(|c| c.contains_variable(var)),
        }
    }

    pub fn extract_variables(&self) -> BTreeSet<String> {
        self.preorder()
            .into_iter()
            .filter_map(|e| match e {
                Expr::Var(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// True when no variable occurs at all.
    pub fn is_number(&self) -> bool {
        self.preorder().iter().all(|e| !matches!(e, Expr::Var(_)))
    }

    pub fn substitute_variable(&self, var: &str, value: &Expr) -> Expr {
        match self {
            Expr::Var(name) if name == var => value.clone(),
            _ => self.map_children(&mut |c| c.substitute_variable(var, value)),
        }
    }

    pub fn set_variable(&self, var: &str, value: f64) -> Expr {
        self.substitute_variable(var, &Expr::Const(value))
    }

    pub fn rename_variable(&self, old: &str, new: &str) -> Expr {
        self.substitute_variable(old, &Expr::var(new))
    }

    /// Replaces every occurrence of the subtree `target` with `replacement`.
    pub fn replace_subexpr(&self, target: &Expr, replacement: &Expr) -> Expr {
        if self == target {
            return replacement.clone();
        }
        self.map_children(&mut |c| c.replace_subexpr(target, replacement))
    }

    pub fn contains_subexpr(&self, target: &Expr) -> bool {
        self.preorder().into_iter().any(|e| e == target)
    }

    pub fn has_func<P>(&self, pred: P) -> bool
    where
        P: Fn(Func) -> bool,
    {
        self.preorder()
            .into_iter()
            .any(|e| matches!(e, Expr::Func(f, _) if pred(*f)))
    }

    pub fn has_special_function(&self) -> bool {
        self.has_func(Func::is_special)
            || self
                .preorder()
                .into_iter()
                .any(|e| matches!(e, Expr::Polylog(..)))
    }

    /// Number of operations in the tree: arithmetic nodes plus function applications.
    pub fn count_ops(&self) -> usize {
        self.preorder()
            .into_iter()
            .filter(|e| !matches!(e, Expr::Var(_) | Expr::Const(_) | Expr::Named(_)))
            .count()
    }

    /// Terms of a sum with subtraction folded into a -1 factor.
    pub fn addends(&self) -> Vec<Expr> {
        match self {
            Expr::Add(l, r) => {
                let mut terms = l.addends();
                terms.extend(r.addends());
                terms
            }
            Expr::Sub(l, r) => {
                let mut terms = l.addends();
                terms.extend(r.addends().into_iter().map(|t| -t));
                terms
            }
            _ => vec![self.clone()],
        }
    }

    pub fn is_sum(&self) -> bool {
        matches!(self, Expr::Add(..) | Expr::Sub(..))
    }

    /// Left fold of terms with `+`; an empty list is 0.
    pub fn sum_of(terms: Vec<Expr>) -> Expr {
        terms
            .into_iter()
            .reduce(|acc, t| Expr::Add(acc.boxed(), t.boxed()))
            .unwrap_or(Expr::Const(0.0))
    }

    /// Left fold of factors with `*`; an empty list is 1.
    pub fn product_of(factors: Vec<Expr>) -> Expr {
        factors
            .into_iter()
            .reduce(|acc, t| Expr::Mul(acc.boxed(), t.boxed()))
            .unwrap_or(Expr::Const(1.0))
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Const(c) if *c < 0.0 => 1,
            Expr::Mul(l, _) if matches!(l.as_ref(), Expr::Const(c) if *c < 0.0) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Pow(_, e) if matches!(e.as_ref(), Expr::Const(h) if *h == 0.5) => 4,
            Expr::Pow(..) => 3,
            _ => 4,
        }
    }
}

pub(crate) fn format_number(c: f64) -> String {
    if c == 0.0 {
        "0".to_string()
    } else if c.fract() == 0.0 && c.abs() < 1e15 {
        format!("{}", c as i64)
    } else {
        format!("{}", c)
    }
}

fn wrap(e: &Expr, parens: bool) -> String {
    if parens {
        format!("({})", e)
    } else {
        e.to_string()
    }
}

/// Display prints powers as `**` with minimal parentheses.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Const(c) => write!(f, "{}", format_number(*c)),
            Expr::Named(n) => write!(f, "{}", n),
            Expr::Add(l, r) => match r.as_ref() {
                Expr::Const(c) if *c < 0.0 => write!(f, "{} - {}", l, format_number(-c)),
                _ => write!(f, "{} + {}", l, r),
            },
            Expr::Sub(l, r) => write!(f, "{} - {}", l, wrap(r, r.precedence() <= 1)),
            Expr::Mul(l, r) => match l.as_ref() {
                Expr::Const(c) if *c == -1.0 => write!(f, "-{}", wrap(r, r.precedence() < 2)),
                Expr::Const(c) if *c < 0.0 => {
                    write!(f, "{}*{}", format_number(*c), wrap(r, r.precedence() < 2))
                }
                _ => write!(
                    f,
                    "{}*{}",
                    wrap(l, l.precedence() < 2),
                    wrap(r, r.precedence() < 2)
                ),
            },
            Expr::Div(l, r) => write!(
                f,
                "{}/{}",
                wrap(l, l.precedence() < 2),
                wrap(r, r.precedence() <= 2)
            ),
            Expr::Pow(b, e) => match e.as_ref() {
                Expr::Const(h) if *h == 0.5 => write!(f, "sqrt({})", b),
                _ => write!(
                    f,
                    "{}**{}",
                    wrap(b, b.precedence() <= 3),
                    wrap(e, e.precedence() < 4)
                ),
            },
            Expr::Func(func, arg) => write!(f, "{}({})", func, arg),
            Expr::Polylog(s, z) => write!(f, "polylog({}, {})", s, z),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::Add(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::Sub(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::Mul(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::Div(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::Mul(Expr::Const(-1.0).boxed(), self.boxed())
    }
}
