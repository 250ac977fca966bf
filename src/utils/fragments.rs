//! Merging of per-host result fragments.
//!
//! Every receiver run leaves a `<host>_<serial>.csv` fragment in the results
//! directory. Fragments of one host are concatenated into
//! `<host>_aggregation.csv`; the fragment with serial `0` is kept apart as the
//! first round of the test.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use csv::WriterBuilder;
use serde::Serialize;

use super::capture::CaptureRecord;
use crate::error::{Error, Result};

const AGGREGATION_SUFFIX: &str = "aggregation";

/// `(host, serial)` encoded in a result file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FragmentKey {
    pub host: String,
    pub serial: Option<String>,
}

impl FragmentKey {
    pub fn new(host: &str, serial: Option<u32>) -> Self {
        FragmentKey {
            host: host.to_owned(),
            serial: serial.map(|s| s.to_string()),
        }
    }

    /// `h1-eth0_3.csv` -> (`h1-eth0`, `3`), `veth_a_0.csv` -> (`veth_a`, `0`),
    /// `h1.csv` -> (`h1`, none).
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".csv")?;
        let (host, serial) = match stem.rsplit_once('_') {
            Some((host, serial)) => (host, Some(serial.to_owned())),
            None => (stem, None),
        };
        if host.is_empty() {
            return None;
        }

        Some(FragmentKey {
            host: host.to_owned(),
            serial,
        })
    }

    pub fn aggregation(host: &str) -> Self {
        FragmentKey {
            host: host.to_owned(),
            serial: Some(AGGREGATION_SUFFIX.to_owned()),
        }
    }

    pub fn file_name(&self) -> String {
        match &self.serial {
            Some(serial) => format!("{}_{}.csv", self.host, serial),
            None => format!("{}.csv", self.host),
        }
    }

    /// Files we write ourselves are not fragments.
    pub fn is_aggregation(&self) -> bool {
        self.serial.as_deref() == Some(AGGREGATION_SUFFIX)
    }

    pub fn is_first_round(&self) -> bool {
        self.serial.as_deref() == Some("0")
    }

    /// Files without serial first, then numeric serials ascending, then the rest.
    fn serial_rank(&self) -> (u8, u64, &str) {
        match self.serial.as_deref() {
            None => (0, 0, ""),
            Some(s) => match s.parse::<u64>() {
                Ok(n) => (1, n, ""),
                Err(_) => (2, 0, s),
            },
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentOrder {
    /// by host, then by serial
    #[default]
    Serial,
    /// whatever order the file system lists the directory in
    Directory,
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub key: FragmentKey,
    pub path: PathBuf,
}

/// Lists the result fragments in `dir`. A missing directory has no fragments.
pub fn scan_fragments(dir: &Path, order: FragmentOrder) -> Result<Vec<Fragment>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("results directory '{}' does not exist", dir.display());
            return Ok(vec![]);
        }
        Err(e) => return Err(e.into()),
    };

    let mut fragments = vec![];
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(key) = name.to_str().and_then(FragmentKey::parse) else {
            continue;
        };
        if key.is_aggregation() {
            continue;
        }
        fragments.push(Fragment {
            key,
            path: entry.path(),
        });
    }

    if order == FragmentOrder::Serial {
        fragments.sort_by(|a, b| {
            a.key
                .host
                .cmp(&b.key.host)
                .then_with(|| a.key.serial_rank().cmp(&b.key.serial_rank()))
        });
    }

    Ok(fragments)
}

/// Reads one fragment. Rows that do not parse or carry a negative or
/// non-finite `Time` make the whole fragment corrupt.
pub fn read_fragment(path: &Path) -> Result<Vec<CaptureRecord>> {
    let corrupt = |source: Box<dyn std::error::Error + Send + Sync>| Error::CorruptFragment {
        path: path.to_owned(),
        source,
    };

    let rows = csv::Reader::from_path(path)
        .map_err(|e| corrupt(e.into()))?
        .deserialize()
        .collect::<Result<Vec<CaptureRecord>, _>>()
        .map_err(|e| corrupt(e.into()))?;

    if let Some((line, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| !row.time.is_finite() || row.time < 0.0)
    {
        return Err(corrupt(
            format!("row {}: invalid time {}", line + 1, row.time).into(),
        ));
    }

    Ok(rows)
}

#[derive(Debug, Serialize)]
struct AggregatedRecord<'a> {
    #[serde(rename = "Num_of_switch")]
    hop_count: u16,
    #[serde(rename = "IDs")]
    path_ids: &'a str,
}

#[derive(Debug, Default)]
pub struct Aggregation {
    /// all rows of a host, fragments concatenated in scan order
    pub per_host: BTreeMap<String, Vec<CaptureRecord>>,
    /// rows of the fragment with serial `0`
    pub first_round: BTreeMap<String, Vec<CaptureRecord>>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.per_host.is_empty()
    }

    /// Writes `<dir>/<host>_aggregation.csv` for every host, without the time column.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.per_host.len());
        for (host, rows) in &self.per_host {
            let path = dir.join(FragmentKey::aggregation(host).file_name());

            let mut output = WriterBuilder::new().has_headers(false).from_path(&path)?;
            output.write_record(["Num_of_switch", "IDs"])?;
            for row in rows {
                output.serialize(AggregatedRecord {
                    hop_count: row.hop_count,
                    path_ids: &row.path_ids,
                })?;
            }
            output.flush()?;

            written.push(path);
        }
        Ok(written)
    }
}

/// Reads every fragment in `dir`. Any unreadable fragment fails the whole run.
pub fn aggregate(dir: &Path, order: FragmentOrder) -> Result<Aggregation> {
    let mut aggregation = Aggregation::default();

    for fragment in scan_fragments(dir, order)? {
        let rows = read_fragment(&fragment.path)?;
        debug!(
            "fragment '{}': {} rows",
            fragment.path.display(),
            rows.len()
        );

        if fragment.key.is_first_round() {
            aggregation
                .first_round
                .insert(fragment.key.host.clone(), rows.clone());
        }
        aggregation
            .per_host
            .entry(fragment.key.host)
            .or_default()
            .extend(rows);
    }

    Ok(aggregation)
}

/// Bar chart data: one value per distinct path id string, sorted by it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    pub routes: Vec<String>,
    pub values: Vec<f64>,
}

fn count_routes(rows: &[CaptureRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.path_ids.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Raw number of captures per route.
pub fn route_counts(rows: &[CaptureRecord]) -> BarSeries {
    let (routes, values) = count_routes(rows)
        .into_iter()
        .map(|(route, count)| (route.to_owned(), count as f64))
        .unzip();
    BarSeries { routes, values }
}

/// Average occurrences of each route per test, where one test sends
/// `packets_per_round * rounds` packets.
pub fn occurrences(rows: &[CaptureRecord], packets_per_round: u32, rounds: u32) -> BarSeries {
    let packets_per_test = f64::from(packets_per_round) * f64::from(rounds);
    if rows.is_empty() || packets_per_test == 0.0 {
        return BarSeries::default();
    }
    let tests = rows.len() as f64 / packets_per_test;

    let (routes, values) = count_routes(rows)
        .into_iter()
        .map(|(route, count)| (route.to_owned(), count as f64 / tests))
        .unzip();
    BarSeries { routes, values }
}

/// When each route was seen, sampled on a time grid shared by all routes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceSeries {
    pub time: Vec<f64>,
    pub routes: Vec<RoutePresence>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePresence {
    pub route: String,
    /// `1` in every bin holding a capture of the route, aligned with `time`
    pub present: Vec<u8>,
}

pub const PRESENCE_RESOLUTION: f64 = 0.001;
/// One hour of captures at `PRESENCE_RESOLUTION`.
pub const MAX_PRESENCE_BINS: usize = 3_600_000;

/// Bins spanning the first to the last capture, both included.
fn presence_bins(start: f64, end: f64, resolution: f64) -> Result<usize> {
    let too_long = || Error::TimeSpanTooLong {
        span: end - start,
        resolution,
        max_bins: MAX_PRESENCE_BINS,
    };

    let steps = ((end - start) / resolution).floor();
    if !steps.is_finite() || steps < 0.0 || steps >= MAX_PRESENCE_BINS as f64 {
        return Err(too_long());
    }
    (steps as usize).checked_add(1).ok_or_else(too_long)
}

/// One series per route spanning the first to the last capture, with `1` in
/// every `resolution`-wide bin that holds a capture of that route.
pub fn presence_series(rows: &[CaptureRecord], resolution: f64) -> Result<PresenceSeries> {
    let Some(start) = rows.iter().map(|r| r.time).reduce(f64::min) else {
        return Ok(PresenceSeries::default());
    };
    let end = rows.iter().map(|r| r.time).fold(start, f64::max);

    let bins = presence_bins(start, end, resolution)?;
    let time: Vec<f64> = (0..bins).map(|i| start + i as f64 * resolution).collect();

    let mut per_route: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
    for row in rows {
        let bin = (((row.time - start) / resolution) as usize).min(bins - 1);
        per_route
            .entry(row.path_ids.as_str())
            .or_insert_with(|| vec![0; bins])[bin] = 1;
    }

    let routes = per_route
        .into_iter()
        .map(|(route, present)| RoutePresence {
            route: route.to_owned(),
            present,
        })
        .collect();
    Ok(PresenceSeries { time, routes })
}
