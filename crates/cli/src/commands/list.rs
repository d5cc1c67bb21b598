// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lockstep list` - Show the scenario catalogue

use crate::catalog::SCENARIOS;
use crate::output::{print_catalog, Entry, OutputFormat};
use clap::Args;

#[derive(Args)]
pub struct ListArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn list(args: ListArgs) {
    let entries: Vec<Entry> = SCENARIOS.iter().map(Entry::from).collect();
    print_catalog(&entries, args.format);
}
