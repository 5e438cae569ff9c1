//! # u-substitution
//!
//! Candidate search for `u = g(x)`:
//! 1) candidates are gathered from the integrand in preorder: arguments of function
//!    applications, powers and their bases, denominators and the factors of the overall
//!    denominator, first or second degree polynomial sub-sums, skipping the variable
//!    itself and anything free of it;
//! 2) each candidate is validated by three rules, first match wins:
//!    a) the denominator becomes free of `x` after `g -> u` and the numerator is a
//!       constant multiple of `du`;
//!    b) `E / du` becomes free of `x` after `g -> u`;
//!    c) the factors of a product split into one factor proportional to `du` and a rest
//!       that becomes free of `x` after `g -> u`;
//! 3) the accepted integrand `(E / du_term)[g -> u] * (du_term / du)` is integrated by
//!    the backend and `g` is substituted back.
use crate::solver::router::{IntegrationTechnique, SolveContext, TechniqueRouter};
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_integration::CasError;
use log::debug;

/// An accepted substitution `u = g(x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// `g(x)`
    pub u: Expr,
    /// `g'(x)`
    pub du: Expr,
    /// the part of the integrand matched against `du`
    pub du_term: Expr,
    /// constant with `du * adjustment == du_term`
    pub adjustment: Expr,
    /// integrand in the new variable
    pub integrand_u: Expr,
}

/// A variable name not already used by `expr`.
pub fn fresh_symbol(expr: &Expr, var: &str) -> String {
    let used = expr.extract_variables();
    ["u", "w", "v", "z"]
        .iter()
        .map(|s| s.to_string())
        .chain((1..).map(|i| format!("u_{}", i)))
        .find(|s| s != var && !used.contains(s))
        .unwrap_or_else(|| format!("{}_u", var))
}

fn push_candidate(candidates: &mut Vec<Expr>, candidate: &Expr, var: &str) {
    let candidate = candidate.simplify();
    if candidate == Expr::var(var) || !candidate.contains_variable(var) || candidate.is_number() {
        return;
    }
    if !candidates.contains(&candidate) {
        candidates.push(candidate);
    }
}

/// Substitution candidates of `expr` in extraction order, at most `max_candidates`.
pub fn substitution_candidates(expr: &Expr, var: &str, max_candidates: usize) -> Vec<Expr> {
    let expr = expr.simplify();
    let mut candidates = Vec::new();
    for node in expr.preorder() {
        match node {
            Expr::Func(_, arg) => push_candidate(&mut candidates, arg, var),
            Expr::Polylog(_, z) => push_candidate(&mut candidates, z, var),
            Expr::Pow(base, exponent) => {
                push_candidate(&mut candidates, node, var);
                if exponent.as_const().is_some_and(|n| n < 0.0) {
                    let reciprocal = base.as_ref().clone().pow(-(exponent.as_ref().clone()));
                    push_candidate(&mut candidates, &reciprocal, var);
                }
                push_candidate(&mut candidates, base, var);
            }
            Expr::Div(_, den) => push_candidate(&mut candidates, den, var),
            _ => {}
        }
    }
    let (_, den) = expr.numer_denom();
    push_candidate(&mut candidates, &den, var);
    for factor in den.factors() {
        push_candidate(&mut candidates, &factor, var);
        if let Expr::Pow(base, _) = &factor {
            push_candidate(&mut candidates, base, var);
        }
    }
    for node in expr.preorder() {
        if node.is_sum() {
            if let Some(p) = node.as_polynomial(var) {
                if (1..=2).contains(&p.degree()) {
                    push_candidate(&mut candidates, node, var);
                }
            }
        }
    }
    candidates.truncate(max_candidates);
    candidates
}

/// Candidates tried after the regular list: the outer function argument, the
/// denominator and up to three square-root bases.
fn last_resort_candidates(expr: &Expr, var: &str) -> Vec<Expr> {
    let expr = expr.simplify();
    let mut extra = Vec::new();
    if let Expr::Func(_, arg) = &expr {
        push_candidate(&mut extra, arg, var);
    }
    let (_, den) = expr.numer_denom();
    push_candidate(&mut extra, &den, var);
    let roots: Vec<&Expr> = expr
        .preorder()
        .into_iter()
        .filter_map(|node| match node {
            Expr::Pow(base, exponent) if exponent.as_const() == Some(0.5) => Some(base.as_ref()),
            _ => None,
        })
        .take(3)
        .collect();
    for base in roots {
        push_candidate(&mut extra, base, var);
    }
    extra
}

/// `e` with every occurrence of `g` replaced by the symbol `u`.
fn substitute(e: &Expr, g: &Expr, u: &Expr) -> Expr {
    e.simplify().replace_subexpr(g, u).simplify()
}

fn free_after(e: &Expr, g: &Expr, u: &Expr, var: &str) -> bool {
    !substitute(e, g, u).contains_variable(var)
}

/// Checks whether `expr dx` can be written as `f(u) du` with `u = candidate`.
pub fn can_express_in_terms_of_u(
    expr: &Expr,
    var: &str,
    candidate: &Expr,
    u_name: &str,
) -> Option<Substitution> {
    let g = candidate.simplify();
    let du = g.diff(var).simplify();
    if du.is_zero() {
        return None;
    }
    let u = Expr::var(u_name);
    let expr = expr.simplify();

    // (a) numerator = c*du over a denominator that is a function of u
    let (num, den) = expr.numer_denom();
    let rule_a = if den.contains_variable(var) && free_after(&den, &g, &u, var) {
        let ratio = (num / du.clone()).simplify();
        ratio
            .is_constant_in(var)
            .then(|| (ratio.clone() * du.clone()).simplify())
    } else {
        None
    };

    // (b) E / du is a function of u
    let rule_b = || {
        let quotient = (expr.clone() / du.clone()).simplify();
        free_after(&quotient, &g, &u, var).then(|| du.clone())
    };

    // (c) one factor proportional to du, the rest a function of u
    let rule_c = || {
        let factors = expr.factors();
        if factors.len() < 2 {
            return None;
        }
        (0..factors.len()).find_map(|i| {
            let ratio = (factors[i].clone() / du.clone()).simplify();
            if !factors[i].contains_variable(var) || !ratio.is_constant_in(var) {
                return None;
            }
            let rest: Vec<Expr> = factors
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, f)| f.clone())
                .collect();
            free_after(&Expr::product_of(rest), &g, &u, var).then(|| factors[i].clone())
        })
    };

    let du_term = rule_a.or_else(rule_b).or_else(rule_c)?;
    let adjustment = (du_term.clone() / du.clone()).simplify();
    if !adjustment.is_constant_in(var) {
        return None;
    }
    let integrand_u =
        (substitute(&(expr.clone() / du_term.clone()), &g, &u) * adjustment.clone()).simplify();
    if integrand_u.contains_variable(var) {
        return None;
    }
    Some(Substitution {
        u: g,
        du,
        du_term,
        adjustment,
        integrand_u,
    })
}

/// `∫ f(g(x)) g'(x) dx = ∫ f(u) du`.
pub struct USubstitution;

impl USubstitution {
    fn apply(
        &self,
        expr: &Expr,
        var: &str,
        sub: &Substitution,
        u_name: &str,
        ctx: &mut SolveContext,
    ) -> Option<Expr> {
        let integrated = match sub.integrand_u.integrate(u_name) {
            Ok(r) => r,
            Err(err) => {
                debug!("u = {} rejected: {}", sub.u, err);
                return None;
            }
        };
        let result = integrated.substitute_variable(u_name, &sub.u).simplify();
        let x = Expr::var(var).to_latex();
        let u = Expr::var(u_name).to_latex();
        ctx.log.math("\\text{Identified u-substitution opportunity}");
        ctx.log.math(&format!("\\text{{Let }} {} = {}", u, sub.u.to_latex()));
        ctx.log.math(&format!(
            "\\text{{Then }} d{} = {} \\, d{}",
            u,
            sub.du.to_latex(),
            x
        ));
        if !sub.adjustment.is_one() {
            ctx.log.math(&format!(
                "\\text{{Adjusting for factor: }} {}",
                sub.adjustment.to_latex()
            ));
        }
        ctx.log.math(&format!(
            "\\text{{After substitution: }} \\int {} \\, d{}",
            sub.integrand_u.to_latex(),
            u
        ));
        ctx.log.math(&format!("\\text{{After integrating: }} {}", integrated.to_latex()));
        ctx.log.math(&format!(
            "\\text{{Substituting back }} {} = {}",
            u,
            sub.u.to_latex()
        ));
        ctx.log.math(&format!("\\text{{Result: }} \\boxed{{{} + C}}", result.to_latex()));
        debug!("u-substitution on {}: u = {}", expr, sub.u);
        Some(result)
    }
}

impl IntegrationTechnique for USubstitution {
    fn name(&self) -> &'static str {
        "u-substitution"
    }

    fn attempt(
        &self,
        expr: &Expr,
        var: &str,
        _router: &TechniqueRouter,
        ctx: &mut SolveContext,
    ) -> Result<Option<Expr>, CasError> {
        let u_name = fresh_symbol(expr, var);
        let mut tried = substitution_candidates(expr, var, ctx.max_candidates);
        let extra: Vec<Expr> = last_resort_candidates(expr, var)
            .into_iter()
            .filter(|c| !tried.contains(c))
            .collect();
        tried.extend(extra);
        for candidate in &tried {
            ctx.check_cancelled()?;
            let Some(sub) = can_express_in_terms_of_u(expr, var, candidate, &u_name) else {
                continue;
            };
            if let Some(result) = self.apply(expr, var, &sub, &u_name, ctx) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}
