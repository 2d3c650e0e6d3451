//! # qdiff: differential testing for SQL engines
//!
//! Generates random SQL in a neutral dialect, rewrites it into a pair of
//! semantically equivalent statements for an analytics engine (A) and a
//! relational engine (B), runs both and reports result divergences.
//!
//! ## Quick Example
//!
//! ```rust
//! use qdiff::prelude::*;
//!
//! let pipeline = Pipeline::standard(&TableSchema::default()).unwrap();
//! let pair = pipeline.map("SELECT * FROM t WHERE c0 BETWEEN 1 AND 5").unwrap();
//! assert!(pair.engine_b.contains("BETWEEN SYMMETRIC"));
//! ```
//!
//! ## Pipeline
//!
//! | Rule                 | Engine | Effect                                   |
//! |----------------------|--------|------------------------------------------|
//! | `in-null-guard`      | both   | `IN` wrapped in `CASE WHEN x IS NULL`    |
//! | `string-type`        | both   | `STRING` → `SYMBOL` / `VARCHAR(64)`      |
//! | `between-symmetric`  | B      | `BETWEEN` → `BETWEEN SYMMETRIC`          |
//! | `count-distinct`     | B      | `COUNT_DISTINCT(x)` → `COUNT(DISTINCT x)`|
//! | `sample-by`          | B      | `SAMPLE BY 1d` → group by day            |
//! | `between-null-guard` | both   | `BETWEEN` null guard                     |

pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod mapping;
pub mod normalizer;
pub mod oracle;
pub mod report;
pub mod runner;
pub mod schema;
pub mod tokens;

pub mod prelude {
    pub use crate::config::{DiffConfig, EngineConfig};
    pub use crate::engine::{SqlxExecutor, build_runtime};
    pub use crate::error::*;
    pub use crate::generator::{
        ClauseDiscovery, FuzzPool, GeneratorOptions, QueryGenerator, SelectMode, SharedClauseSet,
        StaticDiscovery,
    };
    pub use crate::mapping::{Dialect, Pipeline, QueryPair};
    pub use crate::oracle::{DivergenceVerdict, ExecutionResult, Executor, Oracle, PairOutcome};
    pub use crate::report::{JsonlSink, MemorySink, Record, RecordSink};
    pub use crate::runner::{Campaign, RoundSummary};
    pub use crate::schema::TableSchema;
}

/// Map a neutral-dialect query into its engine pair using the default
/// schema.
///
/// # Example
///
/// ```
/// let pair = qdiff::map_query("SELECT * FROM t WHERE c1 IN (0,1,NULL)").unwrap();
/// assert!(pair.engine_a.starts_with("SELECT * FROM t WHERE CASE WHEN c1 IS NULL THEN NULL"));
/// ```
pub fn map_query(query: &str) -> error::DiffResult<mapping::QueryPair> {
    mapping::Pipeline::standard(&schema::TableSchema::default())?.map(query)
}
