//! Clause mapping engine.
//!
//! One intended query is normalized, copied into a [`QueryPair`] and pushed
//! through an ordered list of [`ClauseRule`]s. Each rule declares the
//! capabilities it needs and the ones it establishes; [`Pipeline::new`]
//! rejects an ordering where a rule runs before its prerequisites.

pub mod null_guard;
pub mod sampling;
pub mod substitution;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};
use crate::normalizer::normalize;
use crate::schema::TableSchema;
use crate::tokens::tokenize;

pub use null_guard::{BetweenNullGuard, InNullGuard};
pub use sampling::SampleByEmulation;
pub use substitution::{BetweenSymmetric, CountDistinct, StringType};

/// The two engines under differential test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Analytics engine: `SYMBOL` strings, `SAMPLE BY`, NULL as a sentinel value.
    EngineA,
    /// Conventional relational engine.
    EngineB,
}

impl Dialect {
    /// NULL literal usable as a boolean CASE result.
    pub fn boolean_null(self) -> &'static str {
        match self {
            Dialect::EngineA => "NULL::BOOLEAN",
            Dialect::EngineB => "NULL",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::EngineA => write!(f, "engine-a"),
            Dialect::EngineB => write!(f, "engine-b"),
        }
    }
}

/// Two statements intended to mean the same thing, one per engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPair {
    pub engine_a: String,
    pub engine_b: String,
}

impl QueryPair {
    pub fn new(engine_a: impl Into<String>, engine_b: impl Into<String>) -> Self {
        Self {
            engine_a: engine_a.into(),
            engine_b: engine_b.into(),
        }
    }

    /// Both members set to the same normalized text.
    pub fn splat(query: &str) -> Self {
        let q = normalize(query);
        Self::new(q.clone(), q)
    }

    pub fn get(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::EngineA => &self.engine_a,
            Dialect::EngineB => &self.engine_b,
        }
    }

    /// Rewrite each member independently against the same logical occurrence set.
    pub fn try_map_each<F>(self, mut f: F) -> DiffResult<Self>
    where
        F: FnMut(Dialect, &str) -> DiffResult<String>,
    {
        Ok(Self {
            engine_a: f(Dialect::EngineA, &self.engine_a)?,
            engine_b: f(Dialect::EngineB, &self.engine_b)?,
        })
    }

    /// Rewrite only one member (dialect-only syntax).
    pub fn try_map_one<F>(mut self, dialect: Dialect, f: F) -> DiffResult<Self>
    where
        F: FnOnce(&str) -> DiffResult<String>,
    {
        match dialect {
            Dialect::EngineA => self.engine_a = f(&self.engine_a)?,
            Dialect::EngineB => self.engine_b = f(&self.engine_b)?,
        }
        Ok(self)
    }
}

/// Coarse statement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Other,
}

impl StatementKind {
    pub fn of(sql: &str) -> Self {
        let first = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match first.as_str() {
            "SELECT" | "WITH" => StatementKind::Select,
            "INSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            "CREATE" => StatementKind::Create,
            "DROP" => StatementKind::Drop,
            _ => StatementKind::Other,
        }
    }

    /// Reads return rows; everything else is a write.
    pub fn is_read(self) -> bool {
        self == StatementKind::Select
    }
}

/// Properties a rule may rely on or establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Single-space tokens, no space after commas.
    Normalized,
    InGuarded,
    TypesSubstituted,
    RangesSymmetric,
    DistinctExpanded,
    SamplingEmulated,
    BetweenGuarded,
}

/// A single rewrite step over a query pair.
pub trait ClauseRule {
    fn name(&self) -> &'static str;

    /// Capabilities that must hold before this rule runs.
    fn requires(&self) -> &'static [Capability] {
        &[Capability::Normalized]
    }

    /// Capabilities that hold after this rule runs.
    fn provides(&self) -> &'static [Capability];

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair>;
}

/// Ordered, validated rule list.
pub struct Pipeline {
    rules: Vec<Box<dyn ClauseRule>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline, checking each rule's prerequisites against the
    /// capabilities established by the rules before it.
    pub fn new(rules: Vec<Box<dyn ClauseRule>>) -> DiffResult<Self> {
        let mut established = vec![Capability::Normalized];
        for rule in &rules {
            if let Some(missing) = rule.requires().iter().find(|c| !established.contains(*c)) {
                return Err(DiffError::Pipeline {
                    rule: rule.name(),
                    missing: format!("{:?}", missing),
                });
            }
            established.extend_from_slice(rule.provides());
        }
        Ok(Self { rules })
    }

    /// The full mapping for the fixed schema, in dependency order.
    pub fn standard(schema: &TableSchema) -> DiffResult<Self> {
        let timestamp = schema
            .timestamp_column()
            .ok_or_else(|| DiffError::Config("schema has no timestamp column".into()))?;
        Self::new(vec![
            Box::new(InNullGuard::new(schema.string_columns())),
            Box::new(StringType),
            Box::new(BetweenSymmetric),
            Box::new(CountDistinct),
            Box::new(SampleByEmulation::new(timestamp)),
            Box::new(BetweenNullGuard),
        ])
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Map one intended query into a dialect pair.
    pub fn map(&self, query: &str) -> DiffResult<QueryPair> {
        self.apply(QueryPair::splat(query))
    }

    /// Run every rule over an existing pair; both members are normalized first.
    pub fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        let mut pair = QueryPair::new(normalize(&pair.engine_a), normalize(&pair.engine_b));
        for rule in &self.rules {
            pair = rule.apply(pair)?;
            tracing::trace!(rule = rule.name(), a = %pair.engine_a, b = %pair.engine_b, "rule applied");
        }
        Ok(pair)
    }
}

/// Whether the token stream contains `first second` as adjacent words.
pub(crate) fn contains_words(query: &str, first: &str, second: &str) -> DiffResult<bool> {
    let tokens = tokenize(query)?;
    Ok(tokens
        .windows(2)
        .any(|w| w[0].is_word(query, first) && w[1].is_word(query, second)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Needs;

    impl ClauseRule for Needs {
        fn name(&self) -> &'static str {
            "needs-sampling"
        }
        fn requires(&self) -> &'static [Capability] {
            &[Capability::SamplingEmulated]
        }
        fn provides(&self) -> &'static [Capability] {
            &[]
        }
        fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
            Ok(pair)
        }
    }

    #[test]
    fn test_standard_pipeline_order() {
        let pipeline = Pipeline::standard(&TableSchema::default()).unwrap();
        assert_eq!(
            pipeline.rule_names(),
            vec![
                "in-null-guard",
                "string-type",
                "between-symmetric",
                "count-distinct",
                "sample-by",
                "between-null-guard"
            ]
        );
    }

    #[test]
    fn test_rejects_missing_prerequisite() {
        let err = Pipeline::new(vec![Box::new(Needs)]).unwrap_err();
        assert!(matches!(err, DiffError::Pipeline { rule: "needs-sampling", .. }));
    }

    #[test]
    fn test_rejects_sampling_before_substitution() {
        let err = Pipeline::new(vec![
            Box::new(InNullGuard::new(vec![])),
            Box::new(SampleByEmulation::new("c2")),
            Box::new(StringType),
        ])
        .unwrap_err();
        assert!(matches!(err, DiffError::Pipeline { rule: "sample-by", .. }));
    }

    #[test]
    fn test_between_guard_requires_symmetric() {
        assert!(Pipeline::new(vec![Box::new(BetweenNullGuard)]).is_err());
        assert!(Pipeline::new(vec![Box::new(BetweenSymmetric), Box::new(BetweenNullGuard)]).is_ok());
    }

    #[test]
    fn test_statement_kind() {
        assert_eq!(StatementKind::of("SELECT 1"), StatementKind::Select);
        assert_eq!(StatementKind::of("  update t SET c0=1"), StatementKind::Update);
        assert_eq!(StatementKind::of("INSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::of("CREATE TABLE t (c0 INT)"), StatementKind::Create);
        assert!(!StatementKind::of("DROP TABLE t").is_read());
    }

    #[test]
    fn test_map_normalizes_first() {
        let pipeline = Pipeline::new(vec![Box::new(StringType)]).unwrap();
        let pair = pipeline.map("CREATE  TABLE t (c0 INT,  c1 STRING)").unwrap();
        assert_eq!(pair.engine_a, "CREATE TABLE t (c0 INT,c1 SYMBOL)");
        assert_eq!(pair.engine_b, "CREATE TABLE t (c0 INT,c1 VARCHAR(64))");
    }
}
