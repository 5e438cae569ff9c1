// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_snake_case)]

use crate::numerical::polar_area::{PolarAreaSolver, PolarConfig, solve_polar_area};
use crate::solver::parametric::solve_parametric_area;
use crate::solver::supervisor::{IntegralSolver, SolverConfig, solve_integral};
use crate::symbolic::symbolic_engine::Expr;
use std::f64::consts::{PI, TAU};
use std::time::Duration;

fn print_steps(steps: &[String]) {
    for (i, step) in steps.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, step);
    }
}

#[allow(dead_code)]
pub fn integral_examples(example: usize) {
    match example {
        0 => {
            // the three classical routes: power rule, u-substitution, integration by parts
            for input in ["x**2", "2*x*exp(x**2)", "x*exp(x)"] {
                match solve_integral(input, "x") {
                    Ok(solution) => {
                        println!("∫ {} dx = {} + C", input, solution.result_text);
                        print_steps(&solution.steps);
                    }
                    Err(failure) => println!("{} failed: {}", input, failure),
                }
            }
        }
        1 => {
            // partial fractions, trigonometric substitution and the cyclic exp*cos integral
            for input in ["(x + 3)/(x^2 - 3*x + 2)", "1/sqrt(4 - x^2)", "cos(3*x)*exp(2*x)"] {
                let solution = solve_integral(input, "x").unwrap();
                println!("∫ {} dx = {}", input, solution.result_text);
                // check the answer by differentiating it back
                let back = solution.result.diff("x");
                let f = Expr::parse_expression(input).unwrap();
                println!("  d/dx gives back the integrand: {}", back.equals(&f));
            }
        }
        2 => {
            // no elementary antiderivative: the answer is given through special functions
            let solution = solve_integral("exp(x^2)", "x").unwrap();
            println!("∫ exp(x^2) dx = {}", solution.result_text);
            print_steps(&solution.steps);
            // malformed input and an expression beyond the solver
            for input in ["x +* 2", "x^x"] {
                if let Err(failure) = solve_integral(input, "x") {
                    println!("{}: {}", input, failure);
                    print_steps(&failure.steps);
                }
            }
        }
        3 => {
            // custom deadlines and recursion bounds
            let solver = IntegralSolver::with_config(SolverConfig {
                timeout: Duration::from_secs(5),
                fallback_timeout: Duration::from_secs(2),
                max_depth: 6,
                max_candidates: 4,
            });
            let solution = solver.solve_integral("x^2*sin(x)", "x").unwrap();
            println!("{}", solution.result_text);
            println!("chain: {:?}", solver.router().technique_names());
        }
        4 => {
            // area under the parametric curve x = t^2, y = t^3
            let solution = solve_parametric_area("t^2", "t^3", "t").unwrap();
            println!("∫ y dx = {}", solution.result_text);
            print_steps(&solution.steps);
        }
        _ => println!("no such example"),
    }
}

#[allow(dead_code)]
pub fn polar_examples(example: usize) {
    match example {
        0 => {
            // four-petal rose against the pole: pi/2
            let area = solve_polar_area("sin(2*theta)", "0", "theta", 0.0, TAU, "auto").unwrap();
            println!("rose area = {}, pi/2 = {}", area, PI / 2.0);
            // nested curves that never cross: difference of the single areas, 3 pi
            let area =
                solve_polar_area("1 + cos(theta)", "2 + cos(theta)", "theta", 0.0, TAU, "auto")
                    .unwrap();
            println!("between 1 + cos and 2 + cos = {}, 3 pi = {}", area, 3.0 * PI);
        }
        1 => {
            // cardioid outside the unit circle by both quadratures: 2 + pi/4
            let solver = PolarAreaSolver::default();
            for method in ["polar", "cartesian"] {
                let area = solver
                    .solve("1 + cos(theta)", "1", "theta", 0.0, TAU, method)
                    .unwrap();
                println!("{} method: {}", method, area);
            }
            println!("exact: {}", 2.0 + PI / 4.0);
        }
        2 => {
            // finer scans and a lower threshold for the Cartesian fallback
            let solver = PolarAreaSolver::with_config(PolarConfig {
                intersection_samples: 4000,
                ops_threshold: 4,
                ..PolarConfig::default()
            });
            let area = solver
                .solve("2*sin(theta)", "1", "theta", 0.0, PI, "auto")
                .unwrap();
            println!("inside 2 sin, outside 1: {}", area);
            println!("exact: {}", PI / 3.0 + 3.0_f64.sqrt() / 2.0);
        }
        _ => println!("no such example"),
    }
}
