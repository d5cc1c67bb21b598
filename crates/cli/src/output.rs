// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use crate::catalog::{Outcome, Scenario, Status};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Catalogue entry as listed by `lockstep list`
#[derive(Serialize)]
pub struct Entry {
    pub name: &'static str,
    pub expected: String,
    pub needs_diagnostics: bool,
    pub summary: &'static str,
}

impl From<&Scenario> for Entry {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name,
            expected: scenario.expected.to_string(),
            needs_diagnostics: scenario.needs_diagnostics(),
            summary: scenario.summary,
        }
    }
}

pub fn print_catalog(entries: &[Entry], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{:<30} {:<22} SUMMARY", "NAME", "EXPECTED");
            for entry in entries {
                println!("{:<30} {:<22} {}", entry.name, entry.expected, entry.summary);
            }
        }
        OutputFormat::Json => print_json(entries),
    }
}

pub fn print_outcomes(outcomes: &[Outcome], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for outcome in outcomes {
                print_outcome(outcome);
            }
            let failed = outcomes.iter().filter(|o| o.status == Status::Fail).count();
            let skipped = outcomes.iter().filter(|o| o.status == Status::Skipped).count();
            println!();
            println!(
                "{} scenario(s): {} passed, {} failed, {} skipped",
                outcomes.len(),
                outcomes.len() - failed - skipped,
                failed,
                skipped
            );
        }
        OutputFormat::Json => print_json(outcomes),
    }
}

fn print_outcome(outcome: &Outcome) {
    let observed = if outcome.observed.is_empty() {
        "clean".to_string()
    } else {
        outcome
            .observed
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (&outcome.status, &outcome.note) {
        (Status::Skipped, Some(note)) => {
            println!("{} {:<30} {}", outcome.status, outcome.scenario, note);
        }
        (_, note) => {
            println!(
                "{} {:<30} expected {}, observed {}",
                outcome.status, outcome.scenario, outcome.expected, observed
            );
            if let Some(note) = note {
                println!("     error: {note}");
            }
        }
    }
    for report in &outcome.reports {
        for line in report.to_string().lines() {
            println!("     {line}");
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}
