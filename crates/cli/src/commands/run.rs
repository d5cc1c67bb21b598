// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lockstep run <scenario>... | --all` - Run scenarios under the validator

use crate::catalog::{self, Scenario, Status, SCENARIOS};
use crate::output::{print_outcomes, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use lockstep_core::ValidatorConfig;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Scenarios to run (see `lockstep list`)
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub scenarios: Vec<String>,

    /// Run the whole catalogue
    #[arg(long)]
    pub all: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Validator settings (TOML); diagnostics stay on unless --no-diagnostics
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run with the validator disabled
    #[arg(long)]
    pub no_diagnostics: bool,

    /// Exit non-zero when any scenario misses its expected verdict
    #[arg(long)]
    pub strict: bool,
}

/// Returns whether every scenario met its expected verdict
pub fn run(args: RunArgs) -> Result<bool> {
    let selected: Vec<&Scenario> = if args.all {
        SCENARIOS.iter().collect()
    } else {
        args.scenarios
            .iter()
            .map(|name| {
                catalog::find(name)
                    .ok_or_else(|| anyhow!("unknown scenario: {name} (see `lockstep list`)"))
            })
            .collect::<Result<_>>()?
    };

    let mut config = match &args.config {
        Some(path) => ValidatorConfig::load(path)?,
        // reports are printed, so skip the per-violation warning
        None => ValidatorConfig::diagnostic().with_log_violations(false),
    };
    config.enabled = !args.no_diagnostics;

    let mut outcomes = Vec::with_capacity(selected.len());
    for scenario in selected {
        let outcome = scenario.execute(&config)?;
        tracing::info!(scenario = scenario.name, status = %outcome.status, "scenario finished");
        outcomes.push(outcome);
    }
    print_outcomes(&outcomes, args.format);

    let met = outcomes.iter().all(|o| o.status != Status::Fail);
    Ok(met || !args.strict)
}
