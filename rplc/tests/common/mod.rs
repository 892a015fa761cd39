//! Helpers shared by the integration tests.

#![allow(dead_code)]

use rplc::hir::Program;
use rplc::{check_program, Category, CheckOutcome, CheckerConfig, DefaultScheme, Diagnostic, Payload};

pub fn run(program: &Program, scheme: DefaultScheme) -> CheckOutcome {
    check_program(program, &CheckerConfig::with_scheme(scheme))
}

pub fn only(outcome: &CheckOutcome, category: Category) -> Vec<&Diagnostic> {
    outcome.diagnostics.iter().filter(|d| d.category == category).collect()
}

/// The effects named by a diagnostic payload, as text.
pub fn payload_effects(payload: &Payload) -> Vec<String> {
    match payload {
        Payload::Effect { effect } => vec![effect.to_string()],
        Payload::Effects { effects } | Payload::Inferred { effects, .. } => {
            effects.iter().map(ToString::to_string).collect()
        }
        Payload::Conflict { left, right } => vec![left.to_string(), right.to_string()],
        Payload::None | Payload::Rpl { .. } | Payload::Element { .. } => Vec::new(),
    }
}

pub fn render(outcome: &CheckOutcome) -> String {
    outcome
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
