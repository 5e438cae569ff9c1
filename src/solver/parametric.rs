//! Area under a parametric curve: `∫ y dx = ∫ y(t) x'(t) dt`.
use crate::solver::step_log::StepLog;
use crate::solver::supervisor::{
    IntegralSolver, SolveError, SolveFailure, SolveResult, parse_failure,
};
use crate::symbolic::parse_expr::validate_variable_name;
use crate::symbolic::symbolic_engine::Expr;
use log::info;

impl IntegralSolver {
    /// Differentiates `x(t)`, forms `y(t) x'(t)` and integrates it with respect to `parameter`.
    /// The parametric narration comes before the steps of the integral itself.
    pub fn solve_parametric_area(&self, x_of_t: &str, y_of_t: &str, parameter: &str) -> SolveResult {
        validate_variable_name(parameter).map_err(|e| SolveFailure {
            error: SolveError::Parse(format!("Invalid parameter '{}': {}", parameter, e)),
            steps: Vec::new(),
        })?;
        let x = Expr::parse_expression(x_of_t).map_err(|e| parse_failure(&e))?;
        let y = Expr::parse_expression(y_of_t).map_err(|e| parse_failure(&e))?;
        let t = Expr::var(parameter).to_latex();

        let mut log = StepLog::new();
        log.math("\\text{Solving parametric curve integration:}");
        log.math(&format!("x({}) = {}", t, x.to_latex()));
        log.math(&format!("y({}) = {}", t, y.to_latex()));
        log.math("\\text{For parametric integration: } \\int y \\, dx = \\int y(t) \\cdot \\frac{dx}{dt} \\, dt");
        let dx = x.diff(parameter).simplify();
        log.math(&format!(
            "\\frac{{dx}}{{d{t}}} = \\frac{{d}}{{d{t}}}\\left[{}\\right] = {}",
            x.to_latex(),
            dx.to_latex()
        ));
        let integrand = (y.clone() * dx.clone()).simplify();
        log.math(&format!(
            "\\text{{Set up the integral: }} \\int y \\frac{{dx}}{{d{t}}} \\, d{t} = \\int {} \\cdot {} \\, d{t}",
            y.to_latex(),
            dx.to_latex()
        ));
        log.math(&format!(
            "\\text{{Simplify the integrand: }} {} \\cdot {} = {}",
            y.to_latex(),
            dx.to_latex(),
            integrand.to_latex()
        ));
        info!("parametric integrand {} d{}", integrand, parameter);

        let prepend = |steps: Vec<String>| {
            let mut all = log.clone().into_steps();
            all.extend(steps);
            all
        };
        match self.solve_expr(&integrand, parameter) {
            Ok(mut solution) => {
                solution.steps = prepend(solution.steps);
                Ok(solution)
            }
            Err(mut failure) => {
                failure.steps = prepend(failure.steps);
                Err(failure)
            }
        }
    }
}

/// [`IntegralSolver::solve_parametric_area`] with the default configuration.
pub fn solve_parametric_area(x_of_t: &str, y_of_t: &str, parameter: &str) -> SolveResult {
    IntegralSolver::default().solve_parametric_area(x_of_t, y_of_t, parameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parametric_area_integrand() {
        // x = t^2, y = t^3: ∫ t^3 * 2t dt = 2 t^5 / 5
        let solution = solve_parametric_area("t^2", "t^3", "t").unwrap();
        let expected = Expr::parse_expression("2*t^5/5").unwrap();
        assert!(solution.result.equals(&expected));
        assert!(solution.steps[0].contains("parametric curve integration"));
        assert!(solution.steps.iter().any(|s| s.contains("Integrating")));
    }

    #[test]
    fn test_parametric_circle_quarter() {
        // x = cos(t), y = sin(t): ∫ -sin(t)^2 dt
        let solution = solve_parametric_area("cos(t)", "sin(t)", "t").unwrap();
        let derivative = solution.result.diff("t");
        for t in [0.2_f64, 0.9, 2.1] {
            let expected = -t.sin().powi(2);
            assert!((derivative.eval_at("t", t) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parametric_parse_error() {
        let failure = solve_parametric_area("t^2", "sin(", "t").unwrap_err();
        assert!(matches!(failure.error, SolveError::Parse(_)));
    }
}
