//! Sends ARP broadcast requests, optionally with an INT header in their padding.
//!
use std::net::Ipv4Addr;

use anyhow::{anyhow, Context};
use clap::Parser;

use crate::utils::{
    arp,
    int_header::{TelemetryHeader, DEFAULT_PROTO},
    raw_socket::RawSocket,
};

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Source IP
    #[arg(short, long, default_value_t = Ipv4Addr::new(10, 0, 1, 1))]
    pub source: Ipv4Addr,

    /// Destination IP
    #[arg(short, long, default_value_t = Ipv4Addr::new(10, 0, 2, 2))]
    pub destination: Ipv4Addr,

    /// Name of the interface
    #[arg(short, long, default_value_t = String::from("h1-eth0"))]
    pub interface: String,

    /// Number of packets to be sent
    #[arg(short, long, default_value_t = 1)]
    pub count: u64,

    /// IDs to be placed in the variable length field. Without any, a pure ARP request is sent.
    #[arg(long, num_args = 1..)]
    pub ids: Vec<u32>,

    /// Value of the protocol field of the INT header
    #[arg(long, default_value_t = DEFAULT_PROTO)]
    pub proto: u16,
}

/// The INT header to attach, if any.
pub fn telemetry_trailer(args: &SendArgs) -> anyhow::Result<Vec<u8>> {
    if args.ids.is_empty() {
        return Ok(vec![]);
    }
    let header = TelemetryHeader::new(args.proto, args.ids.clone())?;
    Ok(header.encode())
}

pub fn run(args: SendArgs) -> anyhow::Result<()> {
    let trailer = telemetry_trailer(&args)?;
    if trailer.is_empty() {
        info!("Pure ARP");
    } else {
        info!("INT ARP with ids: {:?}", args.ids);
    }

    let mut socket = RawSocket::open(&args.interface, None)?;
    let mac = socket
        .interface
        .mac
        .ok_or_else(|| anyhow!("interface '{}' has no MAC address", args.interface))?;

    let frame = arp::build_request(mac, args.source, args.destination, &trailer);
    info!(
        "who has {} tell {} ({}), {} bytes, on {}",
        args.destination,
        args.source,
        mac,
        frame.len(),
        args.interface
    );

    for i in 0..args.count {
        socket
            .send(&frame)
            .with_context(|| format!("failed to send packet {} of {}", i + 1, args.count))?;
    }
    info!("Sent {} packets", args.count);

    Ok(())
}
