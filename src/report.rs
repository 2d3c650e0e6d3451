//! Append-only campaign records.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::DiffResult;
use crate::mapping::{Dialect, QueryPair};
use crate::oracle::{DivergenceVerdict, PairOutcome};

/// One persisted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// Table setup for a round, replayable in order.
    Ddl { round: usize, table: String, pair: QueryPair },
    /// A pair whose results matched, or a write-only pair.
    Pair { round: usize, outcome: PairOutcome },
    /// A pair whose results diverged.
    Divergence { round: usize, outcome: PairOutcome },
    /// A statement one engine failed to run.
    Exception {
        round: usize,
        dialect: Dialect,
        sql: String,
        reason: String,
    },
}

impl Record {
    /// Classify a finished pair.
    pub fn from_outcome(round: usize, outcome: PairOutcome) -> Self {
        match outcome.verdict {
            Some(DivergenceVerdict::Divergent(_)) => Record::Divergence { round, outcome },
            _ => Record::Pair { round, outcome },
        }
    }
}

/// Destination for records.
pub trait RecordSink {
    fn record(&mut self, record: &Record) -> DiffResult<()>;

    fn flush(&mut self) -> DiffResult<()> {
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
}

impl RecordSink for MemorySink {
    fn record(&mut self, record: &Record) -> DiffResult<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// JSON-lines files under a log directory:
/// `bug.jsonl` (divergences), `diff_input.jsonl` (DDL and pairs),
/// `exceptions.jsonl` (execution failures).
pub struct JsonlSink {
    bugs: BufWriter<File>,
    inputs: BufWriter<File>,
    exceptions: BufWriter<File>,
}

const BUG_LOG: &str = "bug.jsonl";
const INPUT_LOG: &str = "diff_input.jsonl";
const EXCEPTION_LOG: &str = "exceptions.jsonl";

impl JsonlSink {
    /// Open the sink, moving any previous logs aside to `*.prev`.
    pub fn create(dir: &Path) -> DiffResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            bugs: open_rotated(dir, BUG_LOG)?,
            inputs: open_rotated(dir, INPUT_LOG)?,
            exceptions: open_rotated(dir, EXCEPTION_LOG)?,
        })
    }
}

fn open_rotated(dir: &Path, file: &str) -> DiffResult<BufWriter<File>> {
    let path = dir.join(file);
    if path.exists() {
        let mut prev = PathBuf::from(&path);
        prev.set_extension("jsonl.prev");
        fs::rename(&path, prev)?;
    }
    let handle = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(handle))
}

impl RecordSink for JsonlSink {
    fn record(&mut self, record: &Record) -> DiffResult<()> {
        let out = match record {
            Record::Divergence { .. } => &mut self.bugs,
            Record::Exception { .. } => &mut self.exceptions,
            Record::Ddl { .. } | Record::Pair { .. } => &mut self.inputs,
        };
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> DiffResult<()> {
        self.bugs.flush()?;
        self.inputs.flush()?;
        self.exceptions.flush()?;
        Ok(())
    }
}
