//! examples of usage of RustedCalculus
/// antiderivatives with step logs, parametric areas and polar areas
pub mod calculus_examples;
