#[macro_use]
extern crate log;

use clap::Parser;
use log::Level;

mod error;
mod experiments;
mod utils;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// log debug messages
    #[arg(long, action)]
    verbose: bool,

    #[command(subcommand)]
    tool: Tools,
}

#[derive(clap::Subcommand, Debug)]
enum Tools {
    /// Send ARP requests carrying an INT header
    ///
    /// Sends `count` ARP broadcast requests on the given interface. With `--ids`,
    /// an in-band telemetry header listing the ids is appended to the request.
    Send(experiments::sender::SendArgs),

    /// Record the INT headers of received ARP requests
    ///
    /// Sniffs the interface until SIGINT and appends the hop count, the switch ids
    /// and the time since start of every INT header to a CSV file.
    Receive(experiments::receiver::ReceiveArgs),

    /// Merge the result files of a test
    ///
    /// Concatenates the result fragments of every host into `<host>_aggregation.csv`
    /// and plots how often each route was taken.
    Aggregate(experiments::aggregator::AggregateArgs),

    /// Randomize link delays of the P4 app topology
    ///
    /// Rewrites p4app.json from its template with equal, random or no link delays,
    /// optionally generating a full switch mesh and its runtime commands.
    Randomize(experiments::randomizer::RandomizeArgs),
}

fn main() -> anyhow::Result<()> {
    // parse command line arguments
    let args = Args::parse();

    // init logging
    let level = if args.verbose { Level::Debug } else { Level::Info };
    simple_logger::init_with_level(level)?;

    match args.tool {
        Tools::Send(a) => experiments::sender::run(a)?,
        Tools::Receive(a) => experiments::receiver::run(a)?,
        Tools::Aggregate(a) => experiments::aggregator::run(a)?,
        Tools::Randomize(a) => experiments::randomizer::run(a)?,
    };

    Ok(())
}
