//! Random schema and query generation.
//!
//! Produces one intended statement at a time and maps it into a
//! [`QueryPair`]. Predicates are gated by the shared-clause set and always
//! carry a NULL-producing fuzz expression so the NULL-bridging rules are
//! exercised. Randomness comes from an explicit seeded [`StdRng`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};
use crate::mapping::{Pipeline, QueryPair};
use crate::schema::{ColumnType, TableSchema};

/// Tables instantiated per testing round.
pub const TABLES_PER_ROUND: usize = 3;

/// Clause identifiers accepted by both engines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedClauseSet(BTreeSet<String>);

impl SharedClauseSet {
    pub fn new<I, S>(clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            clauses
                .into_iter()
                .map(|c| c.into().trim().to_ascii_uppercase())
                .collect(),
        )
    }

    pub fn contains(&self, clause: &str) -> bool {
        self.0.contains(&clause.to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Source of the shared-clause set, queried once per process.
pub trait ClauseDiscovery {
    fn discover(&mut self) -> DiffResult<SharedClauseSet>;
}

/// Discovery backed by a fixed list (configuration).
#[derive(Debug, Clone)]
pub struct StaticDiscovery(pub SharedClauseSet);

impl ClauseDiscovery for StaticDiscovery {
    fn discover(&mut self) -> DiffResult<SharedClauseSet> {
        Ok(self.0.clone())
    }
}

/// NULL-producing expressions injected into predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzPool {
    /// The bare `NULL` literal.
    #[default]
    Null,
    /// Casts, bitwise operators and comparisons that fold to NULL or a constant.
    Extended,
}

const EXTENDED_FUZZ: &[&str] = &[
    "NULL",
    "CAST(1 AS FLOAT)",
    "CAST(NULL AS FLOAT)",
    "CAST(0.0 AS FLOAT)",
    "CAST('0' AS FLOAT)",
    "CAST(0-0 AS FLOAT)",
    "CAST(CAST(NULL AS INT) AS FLOAT)",
    "CAST(CAST('0' AS INT) AS FLOAT)",
    "CAST(CAST('0' AS FLOAT) AS INT)",
    "~CAST(NULL AS INT)",
    "~CAST(0.0 AS INT)",
    "~NULL::INT",
    "CAST(NULL AS INT)&CAST(NULL AS INT)",
    "CAST(NULL AS INT)&(~NULL::INT)",
    "CAST(NULL AS INT)^CAST(NULL AS INT)",
    "CAST(NULL AS INT)^(~NULL::INT)",
    "CAST(NULL AS INT)|CAST(NULL AS INT)",
    "CAST(NULL AS INT)|(~NULL::INT)",
    "'5'<>'5'",
    "'123'<'456'",
    "CAST(CAST('123'<'456' AS INT)|(~NULL::INT) AS INT)^CAST(NULL AS INT)",
];

impl FuzzPool {
    pub fn expressions(self) -> &'static [&'static str] {
        match self {
            FuzzPool::Null => &EXTENDED_FUZZ[..1],
            FuzzPool::Extended => EXTENDED_FUZZ,
        }
    }
}

/// Shape of generated SELECT statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// `SELECT 1`
    #[default]
    Constant,
    /// Filtered scans, plus sampled counts when `SAMPLE BY` is shared.
    Predicated,
}

/// Generator knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub fuzz_pool: FuzzPool,
    pub select_mode: SelectMode,
}

/// Produces DDL for a round and random statement pairs over its tables.
#[derive(Debug)]
pub struct QueryGenerator {
    shared: SharedClauseSet,
    schema: TableSchema,
    pipeline: Pipeline,
    options: GeneratorOptions,
    tables: Vec<String>,
}

impl QueryGenerator {
    pub fn new(shared: SharedClauseSet, options: GeneratorOptions) -> DiffResult<Self> {
        let schema = TableSchema::default();
        let pipeline = Pipeline::standard(&schema)?;
        Ok(Self {
            shared,
            schema,
            pipeline,
            options,
            tables: Vec::new(),
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Names of the current round's tables.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// A random table name and its DDL pair.
    pub fn create_table(&self, rng: &mut StdRng) -> DiffResult<(String, QueryPair)> {
        let name = random_lowercase(rng, 8);
        let ddl = self.pipeline.map(&self.schema.create_table_sql(&name))?;
        Ok((name, ddl))
    }

    /// `DROP TABLE IF EXISTS` pair for `table`.
    pub fn drop_table(&self, table: &str) -> DiffResult<QueryPair> {
        self.pipeline.map(&format!("DROP TABLE IF EXISTS {table};"))
    }

    /// Replace the working tables with three fresh ones and return their DDL.
    pub fn init_round(&mut self, rng: &mut StdRng) -> DiffResult<Vec<(String, QueryPair)>> {
        let mut created = Vec::with_capacity(TABLES_PER_ROUND);
        while created.len() < TABLES_PER_ROUND {
            let (name, ddl) = self.create_table(rng)?;
            if created.iter().any(|(n, _)| *n == name) {
                continue;
            }
            created.push((name, ddl));
        }
        self.tables = created.iter().map(|(n, _)| n.clone()).collect();
        Ok(created)
    }

    fn fuzz_expr(&self, rng: &mut StdRng) -> &'static str {
        self.options
            .fuzz_pool
            .expressions()
            .choose(rng)
            .copied()
            .unwrap_or("NULL")
    }

    fn column_predicate(&self, rng: &mut StdRng, column: &str, ty: ColumnType) -> String {
        let mut predicates = vec!["True".to_string()];
        for clause in ["IN", "BETWEEN"] {
            if !self.shared.contains(clause) || !rng.gen_bool(0.5) {
                continue;
            }
            let fuzz = self.fuzz_expr(rng);
            let candidates = match (clause, ty) {
                ("IN", ColumnType::Int) => [
                    format!("{column} IN ({column},{fuzz})"),
                    format!("{column} NOT IN (0,1,2,{fuzz})"),
                ],
                ("IN", _) => [
                    format!("{column} IN ({column},{fuzz})"),
                    format!("{column} NOT IN ('0','1','2',{fuzz})"),
                ],
                (_, ColumnType::Int) => [
                    format!("{column} BETWEEN {column} AND {fuzz}"),
                    format!("{column} NOT BETWEEN 0 AND {fuzz}"),
                ],
                _ => [
                    format!("{column} BETWEEN {column} AND {fuzz}"),
                    format!("{column} NOT BETWEEN '0' AND {fuzz}"),
                ],
            };
            let pick = rng.gen_range(0..candidates.len());
            predicates.push(candidates[pick].clone());
        }
        predicates.join(" AND ")
    }

    /// Conjunction of per-column predicates in the neutral dialect.
    pub fn random_predicate(&self, rng: &mut StdRng) -> String {
        self.schema
            .columns
            .iter()
            .map(|c| self.column_predicate(rng, &c.name, c.ty))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn pick_table(&self, rng: &mut StdRng) -> DiffResult<String> {
        self.tables
            .choose(rng)
            .cloned()
            .ok_or_else(|| DiffError::Generator("no tables; call init_round first".into()))
    }

    fn random_assignments(rng: &mut StdRng) -> (i64, String, String) {
        let int = rng.gen_range(-1000..=1000);
        let len = rng.gen_range(1..=5);
        (int, random_lowercase(rng, len), random_timestamp(rng))
    }

    fn insert_query(&self, rng: &mut StdRng) -> DiffResult<String> {
        let table = self.pick_table(rng)?;
        let (int, string, ts) = Self::random_assignments(rng);
        Ok(format!("INSERT INTO {table} VALUES ({int}, '{string}', '{ts}');"))
    }

    fn update_query(&self, rng: &mut StdRng) -> DiffResult<String> {
        let table = self.pick_table(rng)?;
        let (int, string, ts) = Self::random_assignments(rng);
        let predicate = self.random_predicate(rng);
        Ok(format!(
            "UPDATE {table} SET c0={int},c1='{string}',c2='{ts}' WHERE {predicate}"
        ))
    }

    fn select_query(&self, rng: &mut StdRng) -> DiffResult<String> {
        match self.options.select_mode {
            SelectMode::Constant => Ok("SELECT 1".to_string()),
            SelectMode::Predicated => {
                let table = self.pick_table(rng)?;
                if self.shared.contains("SAMPLE BY") && rng.gen_bool(0.25) {
                    Ok(format!("SELECT COUNT(*) FROM {table} SAMPLE BY 1d"))
                } else {
                    let predicate = self.random_predicate(rng);
                    Ok(format!("SELECT * FROM {table} WHERE {predicate}"))
                }
            }
        }
    }

    /// One intended statement (SELECT 80%, UPDATE 10%, INSERT 10%) mapped
    /// into a dialect pair.
    pub fn random_query(&self, rng: &mut StdRng) -> DiffResult<QueryPair> {
        let roll: f64 = rng.gen_range(0.0..1.0);
        let query = if roll < 0.8 {
            self.select_query(rng)?
        } else if roll < 0.9 {
            self.update_query(rng)?
        } else {
            self.insert_query(rng)?
        };
        self.pipeline.map(&query)
    }
}

fn random_lowercase(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Timestamp inside the fixed 2024–2025 window.
fn random_timestamp(rng: &mut StdRng) -> String {
    let year = rng.gen_range(2024..=2025);
    let month = rng.gen_range(11..=12);
    let day = rng.gen_range(11..=12);
    let hour = rng.gen_range(11..=12);
    let minute = rng.gen_range(11..=12);
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
