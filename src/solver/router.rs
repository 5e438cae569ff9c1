//! # Technique router
//!
//! Walks a fixed priority chain of recognizers over one integrand:
//! elementary forms, the cyclic sin/cos·exp family, u-substitution, trigonometric
//! substitution, partial fractions and integration by parts (LIATE), then the direct
//! backend integrator as the fallback.
//!
//! Every recognizer gets the router back so it can route reduced sub-integrals through
//! the full chain. All per-call state (step log, recursion depth, in-flight integrands,
//! cancel flag) lives in [`SolveContext`]; the router itself is immutable and can be
//! shared between worker threads.
use crate::solver::step_log::StepLog;
use crate::solver::techniques::{
    CyclicExponentialTrig, DirectIntegration, Elementary, IntegrationByParts,
    RationalFunction, TrigSubstitution,
};
use crate::solver::u_substitution::USubstitution;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_integration::CasError;
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_MAX_DEPTH: usize = 12;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

/// Cooperative cancellation flag shared between a supervisor and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Call-scoped state threaded through every recognizer of one solve.
#[derive(Debug)]
pub struct SolveContext {
    pub log: StepLog,
    pub depth: usize,
    pub max_depth: usize,
    pub max_candidates: usize,
    in_flight: Vec<Expr>,
    cancel: CancelToken,
}

impl Default for SolveContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH, DEFAULT_MAX_CANDIDATES, CancelToken::new())
    }
}

impl SolveContext {
    pub fn new(max_depth: usize, max_candidates: usize, cancel: CancelToken) -> Self {
        Self {
            log: StepLog::new(),
            depth: 0,
            max_depth,
            max_candidates,
            in_flight: Vec::new(),
            cancel,
        }
    }

    pub fn check_cancelled(&self) -> Result<(), CasError> {
        if self.cancel.is_cancelled() {
            Err(CasError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Registers `expr` as being integrated; fails on re-entry or past the depth limit.
    fn enter(&mut self, expr: &Expr) -> Result<(), CasError> {
        if self.depth >= self.max_depth {
            return Err(CasError::RecursionLimit(format!(
                "{} (depth {})",
                expr, self.depth
            )));
        }
        if self.in_flight.contains(expr) {
            return Err(CasError::RecursionLimit(format!(
                "{} is already being integrated",
                expr
            )));
        }
        self.depth += 1;
        self.in_flight.push(expr.clone());
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.in_flight.pop();
    }

    pub fn in_flight(&self) -> &[Expr] {
        &self.in_flight
    }
}

/// One classical integration technique.
///
/// `Ok(None)` means the technique does not apply. An `Err` is an internal math failure;
/// the router treats it like `Ok(None)` and moves on to the next technique.
pub trait IntegrationTechnique: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(
        &self,
        expr: &Expr,
        var: &str,
        router: &TechniqueRouter,
        ctx: &mut SolveContext,
    ) -> Result<Option<Expr>, CasError>;
}

pub struct TechniqueRouter {
    chain: Vec<Box<dyn IntegrationTechnique>>,
    fallback: DirectIntegration,
}

impl Default for TechniqueRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl TechniqueRouter {
    pub fn new() -> Self {
        Self::with_chain(vec![
            Box::new(Elementary),
            Box::new(CyclicExponentialTrig),
            Box::new(USubstitution),
            Box::new(TrigSubstitution),
            Box::new(RationalFunction),
            Box::new(IntegrationByParts),
        ])
    }

    pub fn with_chain(chain: Vec<Box<dyn IntegrationTechnique>>) -> Self {
        Self {
            chain,
            fallback: DirectIntegration,
        }
    }

    pub fn technique_names(&self) -> Vec<&'static str> {
        self.chain
            .iter()
            .map(|t| t.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Antiderivative of `expr` through the technique chain.
    pub fn route(&self, expr: &Expr, var: &str, ctx: &mut SolveContext) -> Result<Expr, CasError> {
        ctx.check_cancelled()?;
        let expr = expr.simplify();
        ctx.enter(&expr)?;
        let result = self.route_entered(&expr, var, ctx);
        ctx.leave();
        result
    }

    fn route_entered(&self, expr: &Expr, var: &str, ctx: &mut SolveContext) -> Result<Expr, CasError> {
        if expr.is_sum() {
            ctx.log.math("\\text{Breaking down sum into individual terms}");
            let mut parts = Vec::new();
            for term in expr.addends() {
                parts.push(self.route(&term, var, ctx)?);
            }
            let result = Expr::sum_of(parts).simplify();
            ctx.log.math(&format!(
                "\\text{{Combining results: }} \\boxed{{{} + C}}",
                result.to_latex()
            ));
            return Ok(result);
        }

        for technique in &self.chain {
            let mark = ctx.log.checkpoint();
            match technique.attempt(expr, var, self, ctx) {
                Ok(Some(result)) => {
                    info!("{} solved {} -> {}", technique.name(), expr, result);
                    return Ok(result);
                }
                Ok(None) => ctx.log.rollback(mark),
                Err(CasError::Cancelled) => return Err(CasError::Cancelled),
                Err(err) => {
                    debug!("{} failed on {}: {}", technique.name(), expr, err);
                    ctx.log.rollback(mark);
                }
            }
        }
        ctx.check_cancelled()?;
        match self.fallback.attempt(expr, var, self, ctx)? {
            Some(result) => Ok(result),
            None => Err(CasError::NoRule(expr.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Expr {
        Expr::parse_expression(text).unwrap()
    }

    struct Never;

    impl IntegrationTechnique for Never {
        fn name(&self) -> &'static str {
            "never"
        }

        fn attempt(
            &self,
            _expr: &Expr,
            _var: &str,
            _router: &TechniqueRouter,
            ctx: &mut SolveContext,
        ) -> Result<Option<Expr>, CasError> {
            ctx.log.text("should be rolled back");
            Err(CasError::NoRule("never".to_string()))
        }
    }

    #[test]
    fn test_chain_order() {
        let router = TechniqueRouter::new();
        assert_eq!(
            router.technique_names(),
            vec![
                "elementary",
                "cyclic",
                "u-substitution",
                "trigonometric substitution",
                "partial fractions",
                "integration by parts",
                "direct"
            ]
        );
    }

    #[test]
    fn test_failed_technique_leaves_no_steps() {
        let router = TechniqueRouter::with_chain(vec![Box::new(Never)]);
        let mut ctx = SolveContext::default();
        let result = router.route(&p("x^2"), "x", &mut ctx).unwrap();
        assert_eq!(result.to_string(), "x**3/3");
        assert!(ctx.log.steps().iter().all(|s| !s.contains("rolled back")));
        assert!(ctx.log.steps()[0].contains("Using direct integration"));
        assert_eq!(ctx.depth, 0);
        assert!(ctx.in_flight().is_empty());
    }

    #[test]
    fn test_sum_is_split() {
        let router = TechniqueRouter::new();
        let mut ctx = SolveContext::default();
        let result = router.route(&p("cos(x) + 1/x"), "x", &mut ctx).unwrap();
        assert!(result.diff("x").equals(&p("cos(x) + 1/x")));
        assert!(ctx.log.steps()[0].contains("Breaking down sum"));
        assert!(ctx.log.steps().last().unwrap().contains("Combining results"));
    }

    #[test]
    fn test_depth_limit_fails_fast() {
        let router = TechniqueRouter::new();
        let mut ctx = SolveContext::new(0, DEFAULT_MAX_CANDIDATES, CancelToken::new());
        assert!(matches!(
            router.route(&p("x"), "x", &mut ctx),
            Err(CasError::RecursionLimit(_))
        ));
    }

    #[test]
    fn test_cancelled_context_stops() {
        let router = TechniqueRouter::new();
        let token = CancelToken::new();
        token.cancel();
        let mut ctx = SolveContext::new(DEFAULT_MAX_DEPTH, DEFAULT_MAX_CANDIDATES, token);
        assert_eq!(router.route(&p("x"), "x", &mut ctx), Err(CasError::Cancelled));
    }
}
