//! Measurement harness for the `logstore-perf` binary.
//!
//! Reproduces three workloads against a fresh store each:
//!
//! - `get`: insert every record, then read each one back by id;
//! - `filter`: insert every record, then run one single-filter query per
//!   (token set, index) pair;
//! - `stream`: insert every record, then walk both streams.
//!
//! Every store gets 8 indexes (widths 1 to 8) and 2 streams. Record `r`
//! carries token set `r % 256`, and set `i` assigns value `i` under every
//! index. Each workload checks what it reads and reports mean insert and
//! read latency in microseconds.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, ensure};
use clap::{Parser, ValueEnum};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{BasicFilter, FilterQuery, IndexId, RecordId, RecordRef, Token};
use crate::reader::LogRead;
use crate::store::LogStore;

/// Number of distinct token sets records cycle through.
pub const TOKEN_SETS: usize = 256;

/// Number of indexes registered for every workload.
pub const INDEXES: u32 = 8;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// CLI arguments for the measurement harness.
#[derive(Parser, Debug)]
#[command(name = "logstore-perf")]
#[command(about = "Insert and read latency of the in-memory log store")]
pub struct CliArgs {
    /// Path to a TOML file with the store configuration
    #[arg(short, long, env = "LOGSTORE_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Number of records each workload inserts
    #[arg(short = 'n', long, default_value = "2560")]
    pub records: u64,

    /// Payload size in bytes
    #[arg(long, default_value = "40")]
    pub payload_size: usize,

    /// Workloads to run; runs all of them when omitted
    #[arg(short, long, value_enum)]
    pub workload: Vec<Workload>,

    /// File the results are appended to
    #[arg(short, long, default_value = "logstore_perf.tsv")]
    pub output: PathBuf,
}

impl CliArgs {
    /// Returns the workloads selected on the command line.
    pub fn workloads(&self) -> Vec<Workload> {
        if self.workload.is_empty() {
            vec![Workload::Get, Workload::Filter, Workload::Stream]
        } else {
            self.workload.clone()
        }
    }

    /// Loads the store configuration, falling back to the defaults.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => load_config(path),
            None => Ok(Config::default()),
        }
    }
}

/// A workload the harness can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Workload {
    Get,
    Filter,
    Stream,
}

/// Load a store configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::InvalidConfig(format!("Failed to read config file: {}", e)))?;
    parse_config(&contents)
}

/// Parse a store configuration from TOML.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents)
        .map_err(|e| Error::InvalidConfig(format!("Failed to parse config file: {}", e)))
}

/// One line of the results file.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfResult {
    /// Name of the measurement.
    pub name: &'static str,
    /// Mean insert latency in microseconds.
    pub insert_us: f64,
    /// Read latency in microseconds: per operation for `get` and `filter`,
    /// for the whole walk for streams.
    pub read_us: f64,
}

impl fmt::Display for PerfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.name, self.insert_us, self.read_us)
    }
}

/// A populated store plus the ids it was set up with.
struct Fixture {
    store: LogStore,
    index_ids: Vec<IndexId>,
    token_lists: Vec<Vec<Token>>,
    /// Mean insert latency in microseconds.
    insert_us: f64,
}

impl Fixture {
    fn populate(config: Config, records: u64, payload_size: usize) -> anyhow::Result<Self> {
        let store = LogStore::open(config);

        let index_ids = (1..=INDEXES)
            .map(|width| store.add_index(width))
            .collect::<Result<Vec<_>>>()?;
        let expected: Vec<IndexId> = (0..INDEXES).map(|k| 1024 << k).collect();
        ensure!(index_ids == expected, "unexpected index ids {:?}", index_ids);

        let tenth = records / 10;
        let streams = [
            store.add_stream(|r: &RecordRef<'_>| r.id % 10 == 0),
            store.add_stream(move |r: &RecordRef<'_>| r.id < tenth),
        ];
        ensure!(streams == [0, 1], "unexpected stream ids {:?}", streams);

        let token_lists: Vec<Vec<Token>> = (0..TOKEN_SETS as u64)
            .map(|value| {
                index_ids
                    .iter()
                    .map(|&index_id| Token::new(index_id, value))
                    .collect()
            })
            .collect();

        let payload = vec![0u8; payload_size];
        let start = Instant::now();
        for record in 0..records {
            store.insert(&payload, &token_lists[record as usize % TOKEN_SETS]);
        }
        let insert_us = mean_micros(start, records);

        Ok(Self {
            store,
            index_ids,
            token_lists,
            insert_us,
        })
    }
}

/// Runs the selected workloads and returns one result per measurement.
pub fn run(args: &CliArgs, config: Config) -> anyhow::Result<Vec<PerfResult>> {
    let mut results = Vec::new();
    for workload in args.workloads() {
        tracing::info!(?workload, records = args.records, "running workload");
        let fixture = Fixture::populate(config.clone(), args.records, args.payload_size)?;
        match workload {
            Workload::Get => results.push(run_get(&fixture, args.payload_size)?),
            Workload::Filter => results.push(run_filter(&fixture)?),
            Workload::Stream => results.extend(run_stream(&fixture)?),
        }
    }
    Ok(results)
}

fn run_get(fixture: &Fixture, payload_size: usize) -> anyhow::Result<PerfResult> {
    let records = fixture.store.len();
    let mut buf = vec![0u8; payload_size];
    let start = Instant::now();
    for record_id in 0..records {
        ensure!(
            fixture.store.get(&mut buf, record_id),
            "record {} missing",
            record_id
        );
    }
    Ok(PerfResult {
        name: "indexandget",
        insert_us: fixture.insert_us,
        read_us: mean_micros(start, records),
    })
}

fn run_filter(fixture: &Fixture) -> anyhow::Result<PerfResult> {
    let records = fixture.store.len();
    let queries: Vec<(usize, FilterQuery)> = fixture
        .token_lists
        .iter()
        .enumerate()
        .flat_map(|(set, tokens)| {
            tokens
                .iter()
                .map(move |&token| (set, vec![vec![BasicFilter::from(token)]]))
        })
        .collect();
    debug_assert_eq!(queries.len(), TOKEN_SETS * fixture.index_ids.len());

    let start = Instant::now();
    for (set, query) in &queries {
        let mut results = std::collections::HashSet::new();
        fixture.store.filter(&mut results, query);
        let expected = carriers(records, *set);
        ensure!(
            results.len() as u64 == expected,
            "token set {} matched {} records, expected {}",
            set,
            results.len(),
            expected
        );
    }
    Ok(PerfResult {
        name: "indexandfilter",
        insert_us: fixture.insert_us,
        read_us: mean_micros(start, queries.len() as u64),
    })
}

fn run_stream(fixture: &Fixture) -> anyhow::Result<Vec<PerfResult>> {
    let records = fixture.store.len();

    let multiples = fixture.store.get_stream(0)?;
    ensure!(
        multiples.len() as u64 == records.div_ceil(10),
        "stream 0 has {} entries",
        multiples.len()
    );
    let start = Instant::now();
    for (position, record_id) in multiples.iter().enumerate() {
        ensure!(
            record_id % 10 == 0 && record_id / 10 == position as RecordId,
            "stream 0 entry {} is {}",
            position,
            record_id
        );
    }
    let multiples_us = start.elapsed().as_secs_f64() * MICROS_PER_SEC;

    let prefix = fixture.store.get_stream(1)?;
    ensure!(
        prefix.len() as u64 == records / 10,
        "stream 1 has {} entries",
        prefix.len()
    );
    let start = Instant::now();
    for (position, record_id) in prefix.iter().enumerate() {
        ensure!(
            record_id == position as RecordId,
            "stream 1 entry {} is {}",
            position,
            record_id
        );
    }
    let prefix_us = start.elapsed().as_secs_f64() * MICROS_PER_SEC;

    Ok(vec![
        PerfResult {
            name: "indexandstream1",
            insert_us: fixture.insert_us,
            read_us: multiples_us,
        },
        PerfResult {
            name: "indexandstream2",
            insert_us: fixture.insert_us,
            read_us: prefix_us,
        },
    ])
}

/// Appends results to `path`, one tab-separated line each.
pub fn write_results(path: &Path, results: &[PerfResult]) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for result in results {
        writeln!(file, "{}", result)?;
    }
    Ok(())
}

/// Number of records below `records` that carry token set `set`.
fn carriers(records: u64, set: usize) -> u64 {
    let sets = TOKEN_SETS as u64;
    records / sets + u64::from((set as u64) < records % sets)
}

fn mean_micros(start: Instant, operations: u64) -> f64 {
    if operations == 0 {
        return 0.0;
    }
    start.elapsed().as_secs_f64() * MICROS_PER_SEC / operations as f64
}
