//! Differential oracle.
//!
//! Runs both members of a [`QueryPair`] through their executors, one after
//! the other, normalizes the returned values and compares the results as
//! unordered multisets of rows.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::error::{DiffError, DiffResult};
use crate::mapping::{QueryPair, StatementKind};

/// Engine-neutral cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

pub type Row = Vec<Value>;

/// Outcome of running one statement on one engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionResult {
    Rows(Vec<Row>),
    WriteAcknowledged,
    Failure(String),
}

/// Rows present on one side only, with multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceDetail {
    pub only_in_a: Vec<Row>,
    pub only_in_b: Vec<Row>,
}

impl fmt::Display for DivergenceDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |rows: &[Row]| {
            rows.iter()
                .map(|r| format!("({})", r.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")))
                .collect::<Vec<_>>()
                .join(" ")
        };
        write!(
            f,
            "only in A: [{}]; only in B: [{}]",
            render(&self.only_in_a),
            render(&self.only_in_b)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DivergenceVerdict {
    Equivalent,
    Divergent(DivergenceDetail),
    /// Either side failed to execute, or values could not be reconciled.
    Inconclusive(String),
}

impl DivergenceVerdict {
    pub fn is_divergent(&self) -> bool {
        matches!(self, DivergenceVerdict::Divergent(_))
    }
}

/// Both executions of a pair and, for reads, the verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairOutcome {
    pub pair: QueryPair,
    pub engine_a: ExecutionResult,
    pub engine_b: ExecutionResult,
    /// `None` for write-only pairs, which are recorded but never compared.
    pub verdict: Option<DivergenceVerdict>,
}

/// Blocking execution capability for one engine.
pub trait Executor {
    /// Short engine label used in logs and errors.
    fn name(&self) -> &str;

    /// Run a read statement and return its rows.
    fn query(&mut self, sql: &str) -> DiffResult<Vec<Row>>;

    /// Run a DDL/DML statement.
    fn write_query(&mut self, sql: &str) -> DiffResult<()>;

    /// Re-establish a dropped session.
    fn reconnect(&mut self) -> DiffResult<()> {
        Ok(())
    }
}

/// Hashable comparison key for a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Largest magnitude at which every integer is exactly representable in f64.
const EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

fn float_key(x: f64) -> Key {
    if x.is_nan() {
        Key::Float(f64::NAN.to_bits())
    } else if x.fract() == 0.0 && x.abs() <= EXACT_F64_INT {
        Key::Int(x as i64)
    } else {
        Key::Float(x.to_bits())
    }
}

fn normalize_value(value: &Value) -> DiffResult<Key> {
    Ok(match value {
        Value::Null => Key::Null,
        Value::Bool(b) => Key::Bool(*b),
        Value::Int(n) => Key::Int(*n),
        Value::Float(x) => float_key(*x),
        Value::Decimal(d) => {
            let x = d.to_f64().ok_or_else(|| {
                DiffError::TypeNormalizationMismatch(format!("decimal {} has no float form", d))
            })?;
            float_key(x)
        }
        Value::Text(s) => Key::Text(s.clone()),
        Value::Timestamp(ts) => Key::Timestamp(*ts),
    })
}

fn multiset(rows: &[Row]) -> DiffResult<HashMap<Vec<Key>, (usize, &Row)>> {
    let mut counts: HashMap<Vec<Key>, (usize, &Row)> = HashMap::new();
    for row in rows {
        let key = row.iter().map(normalize_value).collect::<DiffResult<Vec<_>>>()?;
        counts.entry(key).or_insert((0, row)).0 += 1;
    }
    Ok(counts)
}

/// Rows of `left` not matched by `right`, repeated by surplus count.
fn surplus(
    left: &HashMap<Vec<Key>, (usize, &Row)>,
    right: &HashMap<Vec<Key>, (usize, &Row)>,
) -> Vec<Row> {
    let mut rows = Vec::new();
    for (key, (count, row)) in left {
        let other = right.get(key).map(|(c, _)| *c).unwrap_or(0);
        for _ in other..*count {
            rows.push((*row).clone());
        }
    }
    rows
}

/// Differential comparison of two engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Oracle {
    /// Compare two result sets as unordered multisets.
    pub fn compare(engine_a: &[Row], engine_b: &[Row]) -> DivergenceVerdict {
        let (a, b) = match (multiset(engine_a), multiset(engine_b)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return DivergenceVerdict::Inconclusive(e.to_string()),
        };
        let only_in_a = surplus(&a, &b);
        let only_in_b = surplus(&b, &a);
        if only_in_a.is_empty() && only_in_b.is_empty() {
            DivergenceVerdict::Equivalent
        } else {
            DivergenceVerdict::Divergent(DivergenceDetail { only_in_a, only_in_b })
        }
    }

    /// Run one statement, routing reads and writes to the matching call.
    pub fn execute(executor: &mut dyn Executor, sql: &str) -> ExecutionResult {
        let result = if StatementKind::of(sql).is_read() {
            executor.query(sql).map(ExecutionResult::Rows)
        } else {
            executor.write_query(sql).map(|_| ExecutionResult::WriteAcknowledged)
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(engine = executor.name(), %sql, "execution failed: {}", e);
            ExecutionResult::Failure(e.to_string())
        })
    }

    /// Execute Engine A's statement, then Engine B's, and classify.
    pub fn run(engine_a: &mut dyn Executor, engine_b: &mut dyn Executor, pair: &QueryPair) -> PairOutcome {
        let a = Self::execute(engine_a, &pair.engine_a);
        let b = Self::execute(engine_b, &pair.engine_b);
        let verdict = Self::classify(&a, &b);
        if let Some(DivergenceVerdict::Divergent(detail)) = &verdict {
            tracing::warn!(a = %pair.engine_a, b = %pair.engine_b, "divergence: {}", detail);
        }
        PairOutcome {
            pair: pair.clone(),
            engine_a: a,
            engine_b: b,
            verdict,
        }
    }

    fn classify(a: &ExecutionResult, b: &ExecutionResult) -> Option<DivergenceVerdict> {
        use ExecutionResult::*;
        match (a, b) {
            (Failure(ea), Failure(eb)) => Some(DivergenceVerdict::Inconclusive(format!(
                "both engines failed: A: {}; B: {}",
                ea, eb
            ))),
            (Failure(e), _) => Some(DivergenceVerdict::Inconclusive(format!("engine A failed: {}", e))),
            (_, Failure(e)) => Some(DivergenceVerdict::Inconclusive(format!("engine B failed: {}", e))),
            (Rows(ra), Rows(rb)) => Some(Self::compare(ra, rb)),
            (WriteAcknowledged, WriteAcknowledged) => None,
            _ => Some(DivergenceVerdict::Inconclusive(
                "statement kinds differ between engines".to_string(),
            )),
        }
    }
}
