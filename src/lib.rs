// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
pub mod Examples;
pub mod Utils;
pub mod numerical;
pub mod solver;
pub mod symbolic;

pub use numerical::polar_area::{PolarAreaSolver, PolarError, solve_polar_area};
pub use solver::parametric::solve_parametric_area;
pub use solver::supervisor::{IntegralSolver, Solution, SolveError, SolveFailure, solve_integral};
