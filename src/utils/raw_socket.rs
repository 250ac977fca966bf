use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use pnet::datalink::{self, interfaces, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};

pub fn interface_by_name(name: &str) -> anyhow::Result<NetworkInterface> {
    interfaces()
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| anyhow!("no network interface named '{}'", name))
}

pub struct RawSocket {
    pub interface: NetworkInterface,
    pub tx: Box<dyn DataLinkSender>,
    pub rx: Box<dyn DataLinkReceiver>,
}

impl RawSocket {
    /// Opens a layer 2 channel on the interface. With a read timeout, `rx.next()`
    /// returns a `TimedOut` error instead of blocking forever.
    pub fn open(name: &str, read_timeout: Option<Duration>) -> anyhow::Result<Self> {
        let interface = interface_by_name(name)?;

        let config = datalink::Config {
            read_timeout,
            ..Default::default()
        };
        let (tx, rx) = match datalink::channel(&interface, config)
            .with_context(|| format!("failed to open datalink channel on '{}'", name))?
        {
            Channel::Ethernet(tx, rx) => (tx, rx),
            _ => bail!("unhandled channel type on '{}'", name),
        };

        Ok(RawSocket { interface, tx, rx })
    }

    pub fn send(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.tx
            .send_to(frame, None)
            .ok_or_else(|| anyhow!("datalink sender refused the frame"))??;
        Ok(())
    }
}
