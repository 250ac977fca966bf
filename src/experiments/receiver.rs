//! Sniffs ARP requests on an interface and records their INT headers.
//!
use std::{io, path::PathBuf, sync::atomic::Ordering, time::Duration};

use clap::Parser;

use super::aggregator::{self, AggregateArgs};
use crate::utils::{
    capture::{CaptureContext, IdOrder, RunNaming},
    fragments::FragmentOrder,
    raw_socket::RawSocket,
    sigint_flag,
};

#[derive(Parser, Debug)]
pub struct ReceiveArgs {
    /// Name of the interface
    #[arg(short, long, default_value_t = String::from("h2-eth0"))]
    pub interface: String,

    /// Directory the result files are written to
    #[arg(short, long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Order of the switch ids in the IDs column
    #[arg(long, value_enum, default_value_t = IdOrder::Reversed)]
    pub id_order: IdOrder,

    /// Write to `<interface>.csv` instead of a new `<interface>_<serial>.csv` per run
    #[arg(long, action)]
    pub single_file: bool,

    /// Aggregate the output directory after the sniffer is stopped
    #[arg(long, action)]
    pub aggregate_on_exit: bool,

    /// Number of packets sent in each round (used by --aggregate-on-exit)
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Number of rounds in each test (used by --aggregate-on-exit)
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub rounds: u32,
}

/// How long a read may block before the stop flag is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ReceiveArgs) -> anyhow::Result<()> {
    let naming = if args.single_file {
        RunNaming::Single
    } else {
        RunNaming::PerRun
    };
    let mut ctx = CaptureContext::new(&args.interface, &args.output_dir, naming, args.id_order);
    let mut socket = RawSocket::open(&args.interface, Some(POLL_INTERVAL))?;

    info!("{}", chrono::Local::now());
    info!(
        "Start sniffer on interface {}. Quit the sniffer with CONTROL-C.",
        args.interface
    );

    let stop = sigint_flag()?;
    let mut recorded: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        match socket.rx.next() {
            Ok(frame) => {
                if ctx.handle_frame(frame)?.is_some() {
                    recorded += 1;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                // no frame within the poll interval
            }
            Err(e) => return Err(e.into()),
        }
    }

    if recorded > 0 {
        info!(
            "sniffer stopped, {} records in '{}'",
            recorded,
            ctx.result_file().path().display()
        );
    } else {
        info!("sniffer stopped, nothing recorded");
    }

    if args.aggregate_on_exit {
        aggregator::run(AggregateArgs {
            directory: args.output_dir,
            count: args.count,
            rounds: args.rounds,
            order: FragmentOrder::Serial,
            no_plot: false,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let args = ReceiveArgs::try_parse_from(["receive"]).unwrap();
        assert_eq!(args.interface, "h2-eth0");
        assert_eq!(args.output_dir, PathBuf::from("results"));
        assert_eq!(args.id_order, IdOrder::Reversed);
        assert!(!args.single_file);
        assert!(!args.aggregate_on_exit);
    }

    #[test]
    fn id_order_and_rounds() {
        let args = ReceiveArgs::try_parse_from([
            "receive",
            "--id-order",
            "as-captured",
            "--single-file",
            "-r",
            "4",
        ])
        .unwrap();
        assert_eq!(args.id_order, IdOrder::AsCaptured);
        assert!(args.single_file);
        assert_eq!(args.rounds, 4);

        assert!(ReceiveArgs::try_parse_from(["receive", "-r", "0"]).is_err());
    }
}
