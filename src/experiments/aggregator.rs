//! Merges the result fragments of all hosts in a directory and plots them.
//!
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use crate::utils::{
    charts,
    fragments::{self, Aggregation, FragmentOrder, PRESENCE_RESOLUTION},
};

#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Name of the directory
    #[arg(short, long, default_value = "results")]
    pub directory: PathBuf,

    /// Number of packets sent in each round
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Number of rounds in each test
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub rounds: u32,

    /// Order in which the fragments of a host are concatenated
    #[arg(long, value_enum, default_value_t = FragmentOrder::Serial)]
    pub order: FragmentOrder,

    /// Only write the aggregated CSV files
    #[arg(long, action)]
    pub no_plot: bool,
}

pub fn run(args: AggregateArgs) -> anyhow::Result<()> {
    info!("Start aggregator");

    let aggregation = fragments::aggregate(&args.directory, args.order).with_context(|| {
        format!("failed to aggregate '{}'", args.directory.display())
    })?;
    if aggregation.is_empty() {
        warn!(
            "no result fragments in '{}', nothing to aggregate",
            args.directory.display()
        );
        return Ok(());
    }

    info!("Record the result");
    for path in aggregation.write(&args.directory)? {
        info!("  {}", path.display());
    }

    if !args.no_plot {
        info!("Draw");
        draw(&aggregation, &args.directory, args.count, args.rounds)?;
    }

    Ok(())
}

fn draw(
    aggregation: &Aggregation,
    dir: &Path,
    packets_per_round: u32,
    rounds: u32,
) -> anyhow::Result<()> {
    for (host, rows) in &aggregation.per_host {
        let series = fragments::occurrences(rows, packets_per_round, rounds);
        charts::render_occurrences(host, &series, &dir.join(format!("{}_occurrences.html", host)))?;
    }

    for (host, rows) in &aggregation.first_round {
        charts::render_first_round(
            host,
            &fragments::route_counts(rows),
            &dir.join(format!("{}_first_round.html", host)),
        )?;
        let presence = fragments::presence_series(rows, PRESENCE_RESOLUTION)
            .with_context(|| format!("no presence chart for '{}'", host))?;
        charts::render_presence(host, &presence, &dir.join(format!("{}_presence.html", host)))?;
    }

    Ok(())
}
