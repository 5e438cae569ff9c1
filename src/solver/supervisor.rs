//! # Timeout supervision
//!
//! `IntegralSolver` is the top-level entry point of the integration engine. It parses on
//! the calling thread, then runs the technique chain on a named worker thread that owns
//! its own [`SolveContext`]. The result comes back over a channel awaited with a
//! deadline. On timeout the worker's cancel token is raised and its log is abandoned
//! with it; a fresh log records the direct-integration fallback, which runs on a second
//! worker with its own shorter deadline.
use crate::solver::router::{
    CancelToken, DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_DEPTH, SolveContext, TechniqueRouter,
};
use crate::solver::step_log::StepLog;
use crate::symbolic::parse_expr::{ParseError, validate_variable_name};
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_integration::CasError;
use log::{info, warn};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// deadline of the technique chain
    pub timeout: Duration,
    /// deadline of the direct-integration fallback
    pub fallback_timeout: Duration,
    pub max_depth: usize,
    pub max_candidates: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            fallback_timeout: Duration::from_secs(10),
            max_depth: DEFAULT_MAX_DEPTH,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub result: Expr,
    /// printed result, without the constant of integration
    pub result_text: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("Could not parse expression: {0}")]
    Parse(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Unsupported(String),
}

/// A typed failure together with the steps logged before it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct SolveFailure {
    pub error: SolveError,
    pub steps: Vec<String>,
}

pub type SolveResult = Result<Solution, SolveFailure>;

const TIMEOUT_MESSAGE: &str = "The integral is too complex to solve within the time limit. \
This might be a non-elementary integral or require special techniques.";

enum WorkerError {
    Timeout,
    Lost(String),
}

/// Runs `job` on a named thread and waits at most `deadline` for its result.
///
/// A job that misses the deadline is not interrupted; its result is dropped when it
/// finally arrives.
fn run_with_deadline<T, F>(name: &str, deadline: Duration, job: F) -> Result<T, WorkerError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| WorkerError::Lost(e.to_string()))?;
    rx.recv_timeout(deadline).map_err(|e| match e {
        mpsc::RecvTimeoutError::Timeout => WorkerError::Timeout,
        mpsc::RecvTimeoutError::Disconnected => WorkerError::Lost("worker stopped".to_string()),
    })
}

fn failure(error: SolveError, log: StepLog) -> SolveFailure {
    SolveFailure {
        error,
        steps: log.into_steps(),
    }
}

fn solution(result: Expr, log: StepLog) -> Solution {
    Solution {
        result_text: result.to_string(),
        result,
        steps: log.into_steps(),
    }
}

/// Narration for input the parser rejected.
pub(crate) fn parse_failure(err: &ParseError) -> SolveFailure {
    let mut log = StepLog::new();
    log.math("\\text{Error: Could not parse the expression}");
    log.math("\\text{Please check:}");
    log.math("\\text{Use * or implicit multiplication (e.g., 2*x or 2x)}");
    log.math("\\text{Use ** or ^ for exponents (e.g., x**2 or x^2)}");
    log.math("\\text{Check parentheses are balanced}");
    log.math("\\text{Use standard function names (sin, cos, log, exp, sqrt)}");
    log.text(&format!("Details: {}", err));
    failure(SolveError::Parse(err.to_string()), log)
}

/// User-facing explanation of a backend failure.
pub fn classify_failure(err: &CasError) -> String {
    let text = err.to_string().to_lowercase();
    let reason = match err {
        CasError::Singularity(_) => "The integral may have singularities or undefined points.",
        _ if text.contains("division by zero") || text.contains("log(0)") => {
            "The integral may have singularities or undefined points."
        }
        _ if text.contains("factorial") || text.contains("gamma") => {
            "The expression may involve factorial or gamma functions that cannot be integrated."
        }
        CasError::NonElementary(_) => {
            "It has no elementary antiderivative and no special-function form is known for it."
        }
        _ => "It may be non-elementary or require advanced techniques beyond this solver's capabilities.",
    };
    format!("Cannot solve this integral. {}", reason)
}

/// Top-level narration and technique chain for one integrand.
fn run_chain(
    router: &TechniqueRouter,
    expr: &Expr,
    var: &str,
    ctx: &mut SolveContext,
) -> Result<Expr, CasError> {
    let x = Expr::var(var).to_latex();
    ctx.log.math(&format!(
        "\\text{{Integrating: }} \\int {} \\, d{}",
        expr.to_latex(),
        x
    ));
    let simplified = expr.simplify();
    if simplified != *expr {
        ctx.log.math(&format!(
            "\\text{{Simplified to: }} {}",
            simplified.to_latex()
        ));
    }

    let non_elementary = simplified.has_special_function()
        || simplified
            .integrate(var)
            .is_ok_and(|r| r.has_special_function());
    if non_elementary {
        ctx.log.math("\\text{This integral does not have an elementary solution}");
        ctx.log.math(
            "\\text{It may involve special functions like error functions or exponential integrals}",
        );
        let result = simplified.integrate(var)?;
        ctx.log.math(&format!(
            "\\text{{Result: }} \\boxed{{{} + C}}",
            result.to_latex()
        ));
        return Ok(result);
    }
    router.route(&simplified, var, ctx)
}

/// Direct backend integration on a fallback worker.
fn direct_with_deadline(expr: &Expr, var: &str, deadline: Duration) -> Result<Expr, WorkerError> {
    let (expr, var) = (expr.clone(), var.to_string());
    match run_with_deadline("integral-fallback", deadline, move || expr.integrate(&var)) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(WorkerError::Lost(classify_failure(&err))),
        Err(err) => Err(err),
    }
}

pub struct IntegralSolver {
    config: SolverConfig,
    router: Arc<TechniqueRouter>,
}

impl Default for IntegralSolver {
    fn default() -> Self {
        Self::with_config(SolverConfig::default())
    }
}

impl IntegralSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            router: Arc::new(TechniqueRouter::new()),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn router(&self) -> &TechniqueRouter {
        &self.router
    }

    /// Parses `expression_text` and integrates it with respect to `variable_name`.
    pub fn solve_integral(&self, expression_text: &str, variable_name: &str) -> SolveResult {
        if expression_text.trim().is_empty() {
            return Err(failure(
                SolveError::Parse(
                    "Empty input. Please enter an expression to integrate.".to_string(),
                ),
                StepLog::new(),
            ));
        }
        validate_variable_name(variable_name).map_err(|_| {
            failure(
                SolveError::Parse(format!(
                    "Invalid variable '{}'. Please use a valid variable name.",
                    variable_name
                )),
                StepLog::new(),
            )
        })?;
        let expr = Expr::parse_expression(expression_text).map_err(|e| parse_failure(&e))?;
        self.solve_expr(&expr, variable_name)
    }

    /// Integrates an already parsed expression under the configured deadlines.
    pub fn solve_expr(&self, expr: &Expr, var: &str) -> SolveResult {
        info!("solving ∫ {} d{}", expr, var);
        let cancel = CancelToken::new();
        let job = {
            let router = Arc::clone(&self.router);
            let (expr, var) = (expr.clone(), var.to_string());
            let mut ctx =
                SolveContext::new(self.config.max_depth, self.config.max_candidates, cancel.clone());
            move || {
                let outcome = run_chain(&router, &expr, &var, &mut ctx);
                (outcome, ctx.log)
            }
        };

        match run_with_deadline("integral-solver", self.config.timeout, job) {
            Ok((Ok(result), log)) => Ok(solution(result, log)),
            Ok((Err(err), log)) => self.retry_direct(expr, var, err, log),
            Err(WorkerError::Lost(reason)) => {
                self.retry_direct(expr, var, CasError::NoRule(reason), StepLog::new())
            }
            Err(WorkerError::Timeout) => {
                cancel.cancel();
                warn!(
                    "integration of {} exceeded {:?}, using direct method",
                    expr, self.config.timeout
                );
                let mut log = StepLog::new();
                log.math("\\text{Integration exceeded time limit, using direct method}");
                match direct_with_deadline(expr, var, self.config.fallback_timeout) {
                    Ok(result) => {
                        log.math(&format!(
                            "\\text{{Result: }} \\boxed{{{} + C}}",
                            result.to_latex()
                        ));
                        Ok(solution(result, log))
                    }
                    Err(_) => {
                        log.math(&format!("\\text{{{}}}", TIMEOUT_MESSAGE));
                        Err(failure(SolveError::Timeout(TIMEOUT_MESSAGE.to_string()), log))
                    }
                }
            }
        }
    }

    fn retry_direct(&self, expr: &Expr, var: &str, err: CasError, mut log: StepLog) -> SolveResult {
        info!("technique chain failed on {}: {}", expr, err);
        log.math("\\text{Primary method failed, attempting direct integration...}");
        match direct_with_deadline(expr, var, self.config.fallback_timeout) {
            Ok(result) => {
                log.math(&format!(
                    "\\text{{Final result: }} \\boxed{{{} + C}}",
                    result.to_latex()
                ));
                Ok(solution(result, log))
            }
            Err(_) => {
                let message = classify_failure(&err);
                log.math("\\text{Unable to solve this integral}");
                log.math(&format!("\\text{{{}}}", message));
                Err(failure(SolveError::Unsupported(message), log))
            }
        }
    }
}

/// [`IntegralSolver::solve_integral`] with the default configuration.
pub fn solve_integral(expression_text: &str, variable_name: &str) -> SolveResult {
    IntegralSolver::default().solve_integral(expression_text, variable_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_typed() {
        let failure = solve_integral("", "x").unwrap_err();
        assert!(matches!(failure.error, SolveError::Parse(_)));
        assert!(failure.steps.is_empty());

        let failure = solve_integral("sin(x", "x").unwrap_err();
        assert!(matches!(failure.error, SolveError::Parse(_)));
        assert!(failure.steps[0].contains("Could not parse the expression"));

        let failure = solve_integral("x^2", "2x").unwrap_err();
        assert!(failure.error.to_string().contains("Invalid variable"));
    }

    #[test]
    fn test_failure_classification() {
        assert!(classify_failure(&CasError::Singularity("1/0".into())).contains("singularities"));
        assert!(
            classify_failure(&CasError::NonElementary("exp(x^3)".into()))
                .contains("no elementary antiderivative")
        );
        assert!(classify_failure(&CasError::NoRule("f".into())).contains("beyond this solver"));
    }

    #[test]
    fn test_non_elementary_integrand_is_reported() {
        let solution = solve_integral("exp(x^2)", "x").unwrap();
        assert!(solution.result.has_special_function());
        assert!(
            solution
                .steps
                .iter()
                .any(|s| s.contains("does not have an elementary solution"))
        );
    }

    #[test]
    fn test_unsupported_integral() {
        let failure = solve_integral("exp(x^3)", "x").unwrap_err();
        assert!(matches!(failure.error, SolveError::Unsupported(_)));
        assert!(failure.steps.iter().any(|s| s.contains("Unable to solve this integral")));
    }

    #[test]
    fn test_zero_timeout_falls_back_or_times_out() {
        let solver = IntegralSolver::with_config(SolverConfig {
            timeout: Duration::from_nanos(1),
            ..SolverConfig::default()
        });
        match solver.solve_integral("x^2", "x") {
            Ok(solution) => assert_eq!(solution.result_text, "x**3/3"),
            Err(failure) => assert!(matches!(failure.error, SolveError::Timeout(_))),
        }
    }
}
