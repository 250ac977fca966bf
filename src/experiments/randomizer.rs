//! Randomizes the link delays of a P4 app topology.
//!
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::Rng;

use crate::utils::topology::{
    check_switch_count, write_switch_commands, DelayMode, P4Version, TopologyDescription,
};

fn parse_version(value: &str) -> Result<P4Version, String> {
    let v: u8 = value.parse().map_err(|e| format!("\"{}\": {}", value, e))?;
    P4Version::try_from(v).map_err(|e| e.to_string())
}

fn parse_delay_mode(value: &str) -> Result<DelayMode, String> {
    let v: u8 = value.parse().map_err(|e| format!("\"{}\": {}", value, e))?;
    DelayMode::try_from(v).map_err(|e| e.to_string())
}

fn parse_switch_count(value: &str) -> Result<usize, String> {
    let n: usize = value.parse().map_err(|e| format!("\"{}\": {}", value, e))?;
    check_switch_count(n).map_err(|e| e.to_string())?;
    Ok(n)
}

#[derive(Parser, Debug)]
pub struct RandomizeArgs {
    /// Version of the P4 architecture (0 or 1)
    #[arg(short = 'v', long, default_value = "0", value_parser = parse_version)]
    pub p4_version: P4Version,

    /// 0 for equal link delay, 1 for worst case, 2 for random link delay
    #[arg(short, long, default_value = "0", value_parser = parse_delay_mode)]
    pub random: DelayMode,

    /// Number of switches (>= 3). Builds a full switch mesh and writes the runtime
    /// commands of every switch instead of only changing the delays of the template.
    #[arg(short = 'n', long, value_parser = parse_switch_count)]
    pub switches: Option<usize>,

    /// Topology template
    #[arg(long, default_value = "p4app.json.txt")]
    pub template: PathBuf,

    /// Where the topology is written
    #[arg(long, default_value = "p4app.json")]
    pub output: PathBuf,

    /// Directory of the generated switch runtime commands
    #[arg(long, default_value = "runtime_commands")]
    pub commands_dir: PathBuf,
}

pub fn run(args: RandomizeArgs) -> anyhow::Result<()> {
    randomize(&args, &mut rand::thread_rng())
}

pub fn randomize<R: Rng + ?Sized>(args: &RandomizeArgs, rng: &mut R) -> anyhow::Result<()> {
    let mut topology = TopologyDescription::load(&args.template)
        .with_context(|| format!("failed to load template '{}'", args.template.display()))?;

    match args.p4_version {
        P4Version::V1 => info!("Version 1"),
        P4Version::V2 => info!("Version 2"),
    }
    match args.random {
        DelayMode::Equal => info!("Equal delay"),
        DelayMode::WorstCase => info!("Worst case"),
        DelayMode::Random => info!("Random delay"),
    }

    match args.switches {
        None => {
            if args.p4_version == P4Version::V2 {
                topology.set_program(P4Version::V2);
            }
            topology.randomize_links(args.random, rng);
        }
        Some(switches) => {
            for path in write_switch_commands(&args.commands_dir, switches)? {
                debug!("wrote {}", path.display());
            }
            topology.add_mesh(
                switches,
                args.p4_version,
                args.random,
                &args.commands_dir,
                rng,
            )?;
        }
    }

    topology
        .write(&args.output)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;
    info!("Topology written to {}", args.output.display());

    Ok(())
}
