//! One-shot dialect substitutions.

use crate::error::{DiffError, DiffResult};
use crate::tokens::{TokenKind, splice, tokenize};

use super::{Capability, ClauseRule, Dialect, QueryPair};

/// Dialect-specific spelling of the neutral `STRING` column type.
pub fn string_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::EngineA => "SYMBOL",
        Dialect::EngineB => "VARCHAR(64)",
    }
}

/// `STRING` → `SYMBOL` / `VARCHAR(64)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl ClauseRule for StringType {
    fn name(&self) -> &'static str {
        "string-type"
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::TypesSubstituted]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        pair.try_map_each(|dialect, query| {
            let edits = tokenize(query)?
                .into_iter()
                .filter(|t| t.kind == TokenKind::Word && t.text(query) == "STRING")
                .map(|t| (t.span, string_type(dialect).to_string()))
                .collect();
            Ok(splice(query, edits))
        })
    }
}

/// Engine B only: `BETWEEN` → `BETWEEN SYMMETRIC`, matching Engine A's
/// order-independent bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetweenSymmetric;

impl ClauseRule for BetweenSymmetric {
    fn name(&self) -> &'static str {
        "between-symmetric"
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::RangesSymmetric]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        pair.try_map_one(Dialect::EngineB, |query| {
            let tokens = tokenize(query)?;
            let edits = tokens
                .iter()
                .enumerate()
                .filter(|(i, t)| {
                    t.is_word(query, "BETWEEN")
                        && !tokens.get(i + 1).is_some_and(|n| n.is_word(query, "SYMMETRIC"))
                })
                .map(|(_, t)| (t.span.end..t.span.end, " SYMMETRIC".to_string()))
                .collect();
            Ok(splice(query, edits))
        })
    }
}

/// Engine B only: `COUNT_DISTINCT(x)` → `COUNT(DISTINCT x)`.
///
/// Only the opening is rewritten; the existing closing parenthesis stays in
/// place, so nested parentheses in the argument are preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountDistinct;

impl ClauseRule for CountDistinct {
    fn name(&self) -> &'static str {
        "count-distinct"
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::DistinctExpanded]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        pair.try_map_one(Dialect::EngineB, |query| {
            let tokens = tokenize(query)?;
            let mut edits = Vec::new();
            for (i, tok) in tokens.iter().enumerate() {
                if !tok.is_word(query, "COUNT_DISTINCT") {
                    continue;
                }
                if tokens.get(i + 1).map(|t| t.kind) != Some(TokenKind::LParen) {
                    return Err(DiffError::malformed(
                        "COUNT_DISTINCT",
                        tok.span.start,
                        "expected '('",
                    ));
                }
                let arg = tokens
                    .get(i + 2)
                    .filter(|t| t.kind != TokenKind::RParen)
                    .ok_or_else(|| {
                        DiffError::malformed("COUNT_DISTINCT", tok.span.start, "missing argument")
                    })?;
                edits.push((tok.span.start..arg.span.start, "COUNT(DISTINCT ".to_string()));
            }
            Ok(splice(query, edits))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_type() {
        let pair = StringType
            .apply(QueryPair::splat("CREATE TABLE t (c0 INT,c1 STRING,c2 TIMESTAMP);"))
            .unwrap();
        assert_eq!(pair.engine_a, "CREATE TABLE t (c0 INT,c1 SYMBOL,c2 TIMESTAMP);");
        assert_eq!(pair.engine_b, "CREATE TABLE t (c0 INT,c1 VARCHAR(64),c2 TIMESTAMP);");
    }

    #[test]
    fn test_string_type_skips_literals() {
        let pair = StringType
            .apply(QueryPair::splat("INSERT INTO t VALUES (1,'STRING','x')"))
            .unwrap();
        assert_eq!(pair.engine_b, "INSERT INTO t VALUES (1,'STRING','x')");
    }

    #[test]
    fn test_between_symmetric_only_engine_b() {
        let pair = BetweenSymmetric
            .apply(QueryPair::splat("x BETWEEN 10 AND 5 AND y NOT BETWEEN 0 AND NULL"))
            .unwrap();
        assert_eq!(pair.engine_a, "x BETWEEN 10 AND 5 AND y NOT BETWEEN 0 AND NULL");
        assert_eq!(
            pair.engine_b,
            "x BETWEEN SYMMETRIC 10 AND 5 AND y NOT BETWEEN SYMMETRIC 0 AND NULL"
        );
    }

    #[test]
    fn test_between_symmetric_idempotent() {
        let once = BetweenSymmetric.apply(QueryPair::splat("x BETWEEN 1 AND 2")).unwrap();
        let twice = BetweenSymmetric.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_count_distinct() {
        let pair = CountDistinct
            .apply(QueryPair::splat("SELECT COUNT_DISTINCT(c1) FROM t"))
            .unwrap();
        assert_eq!(pair.engine_a, "SELECT COUNT_DISTINCT(c1) FROM t");
        assert_eq!(pair.engine_b, "SELECT COUNT(DISTINCT c1) FROM t");
    }

    #[test]
    fn test_count_distinct_nested_parens() {
        let pair = CountDistinct
            .apply(QueryPair::splat("SELECT COUNT_DISTINCT(CAST(c0 AS FLOAT)) FROM t"))
            .unwrap();
        assert_eq!(pair.engine_b, "SELECT COUNT(DISTINCT CAST(c0 AS FLOAT)) FROM t");
    }

    #[test]
    fn test_count_distinct_without_argument() {
        let err = CountDistinct
            .apply(QueryPair::splat("SELECT COUNT_DISTINCT() FROM t"))
            .unwrap_err();
        assert!(matches!(err, DiffError::MalformedClauseShape { .. }));
    }
}
