use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};

use super::{arp, fragments::FragmentKey, int_header::TelemetryHeader};
use crate::error::Result;

/// One row of a result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    #[serde(rename = "Num_of_switch")]
    pub hop_count: u16,
    #[serde(rename = "IDs")]
    pub path_ids: String,
    /// Seconds since the sniffer started.
    #[serde(rename = "Time")]
    pub time: f64,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdOrder {
    /// keep the order the switches pushed their ids in
    AsCaptured,
    /// first switch on the path first
    #[default]
    Reversed,
}

impl CaptureRecord {
    pub fn new(header: &TelemetryHeader, order: IdOrder, elapsed: Duration) -> Self {
        let mut ids: Vec<String> = header.path_ids().iter().map(u32::to_string).collect();
        if order == IdOrder::Reversed {
            ids.reverse();
        }

        CaptureRecord {
            hop_count: header.hop_count(),
            path_ids: ids.join(", "),
            time: elapsed.as_secs_f64(),
        }
    }
}

pub struct ResultFile {
    path: PathBuf,
}

impl ResultFile {
    pub fn new(path: PathBuf) -> Self {
        ResultFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header row first if the file is new.
    pub fn append(&self, record: &CaptureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut output = WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);
        output.serialize(record)?;
        output.flush()?;
        Ok(())
    }
}

/// How the result file of a receiver process is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunNaming {
    /// `<interface>_<serial>.csv`, a fresh serial per process
    PerRun,
    /// `<interface>.csv`
    Single,
}

/// Smallest serial whose `<interface>_<serial>.csv` does not exist yet in `dir`.
pub fn next_free_serial(dir: &Path, interface: &str) -> u32 {
    let mut serial = 0;
    while dir
        .join(FragmentKey::new(interface, Some(serial)).file_name())
        .exists()
    {
        serial += 1;
    }
    serial
}

/// State threaded through every invocation of the capture handler.
pub struct CaptureContext {
    interface: String,
    dir: PathBuf,
    naming: RunNaming,
    id_order: IdOrder,
    started: Instant,
    result: Option<ResultFile>,
}

impl CaptureContext {
    pub fn new(interface: &str, dir: &Path, naming: RunNaming, id_order: IdOrder) -> Self {
        CaptureContext {
            interface: interface.to_owned(),
            dir: dir.to_owned(),
            naming,
            id_order,
            started: Instant::now(),
            result: None,
        }
    }

    /// The result file of this run. The serial is fixed at the first call.
    pub fn result_file(&mut self) -> &ResultFile {
        let (dir, interface, naming) = (&self.dir, &self.interface, self.naming);
        self.result.get_or_insert_with(|| {
            let key = match naming {
                RunNaming::PerRun => {
                    FragmentKey::new(interface, Some(next_free_serial(dir, interface)))
                }
                RunNaming::Single => FragmentKey::new(interface, None),
            };
            ResultFile::new(dir.join(key.file_name()))
        })
    }

    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<CaptureRecord>> {
        let elapsed = self.started.elapsed();
        self.handle_frame_at(frame, elapsed)
    }

    /// Records the INT header of an ARP broadcast request. Returns the written
    /// record, or `None` if the frame was ignored.
    pub fn handle_frame_at(
        &mut self,
        frame: &[u8],
        elapsed: Duration,
    ) -> Result<Option<CaptureRecord>> {
        let Some(request) = arp::parse_broadcast_request(frame) else {
            return Ok(None);
        };
        info!(
            "Got ARP request from IP: {}, MAC: {}, {:.6}",
            request.sender_ip,
            request.sender_mac,
            elapsed.as_secs_f64()
        );

        // pure ARP, possibly zero-padded to the Ethernet minimum
        if request.trailer.iter().all(|b| *b == 0) {
            debug!("no INT header attached");
            return Ok(None);
        }

        let header = match TelemetryHeader::decode(request.trailer) {
            Ok(h) => h,
            Err(e) => {
                debug!("skipping frame: {}", e);
                return Ok(None);
            }
        };
        info!(
            "Traverse {} switch(es) with id(s): {:?}",
            header.hop_count(),
            header.path_ids()
        );

        let record = CaptureRecord::new(&header, self.id_order, elapsed);
        self.result_file().append(&record)?;
        Ok(Some(record))
    }
}
