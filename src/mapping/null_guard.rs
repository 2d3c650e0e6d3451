//! NULL-bridging rewrites for `IN` and `BETWEEN`.
//!
//! Engine A treats NULL as an ordinary value inside these operators while
//! Engine B follows three-valued logic. Every occurrence is wrapped so that a
//! NULL operand yields NULL on both sides:
//!
//! ```text
//! c0 IN (c0,NULL)
//!   A: CASE WHEN c0 IS NULL THEN NULL::BOOLEAN ELSE c0 IN (c0,NULL) END
//!   B: CASE WHEN c0 IS NULL THEN NULL ELSE c0 IN (c0) END
//! ```

use crate::error::DiffResult;
use crate::extractor::{ClauseKind, ClauseOccurrence, extract};
use crate::tokens::splice;

use super::{Capability, ClauseRule, Dialect, QueryPair};

/// Guards `IN` / `NOT IN` on the tested operand.
#[derive(Debug, Clone, Default)]
pub struct InNullGuard {
    string_columns: Vec<String>,
}

impl InNullGuard {
    /// `string_columns` enables quoting of bare `0`,`1`,`2` list elements
    /// when the tested operand is one of them.
    pub fn new(string_columns: Vec<String>) -> Self {
        Self { string_columns }
    }

    fn guard(&self, mut occ: ClauseOccurrence, dialect: Dialect) -> String {
        let quoted = occ.operands.iter().any(|o| o.contains('\''));
        if !quoted && self.string_columns.iter().any(|c| *c == occ.target) {
            for element in &mut occ.operands {
                if matches!(element.as_str(), "0" | "1" | "2") {
                    *element = format!("'{}'", element);
                }
            }
        }
        if dialect == Dialect::EngineB {
            occ.operands.retain(|o| !o.eq_ignore_ascii_case("NULL"));
        }
        format!(
            "CASE WHEN {} IS NULL THEN {} ELSE {} END",
            occ.target,
            dialect.boolean_null(),
            occ.render()
        )
    }

    fn rewrite(&self, dialect: Dialect, query: &str) -> DiffResult<String> {
        let edits = extract(query, ClauseKind::In)?
            .into_iter()
            .map(|occ| (occ.span.clone(), self.guard(occ, dialect)))
            .collect();
        Ok(splice(query, edits))
    }
}

impl ClauseRule for InNullGuard {
    fn name(&self) -> &'static str {
        "in-null-guard"
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::InGuarded]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        pair.try_map_each(|dialect, query| self.rewrite(dialect, query))
    }
}

/// Guards `BETWEEN` on the operand and both bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetweenNullGuard;

impl BetweenNullGuard {
    fn guard(occ: &ClauseOccurrence, dialect: Dialect) -> String {
        let null = dialect.boolean_null();
        let whens: Vec<String> = std::iter::once(&occ.target)
            .chain(occ.operands.iter())
            .map(|operand| format!("WHEN {} IS NULL THEN {}", operand, null))
            .collect();
        format!("CASE {} ELSE {} END", whens.join(" "), occ.render())
    }

    fn rewrite(dialect: Dialect, query: &str) -> DiffResult<String> {
        let edits = extract(query, ClauseKind::Between)?
            .into_iter()
            .map(|occ| (occ.span.clone(), Self::guard(&occ, dialect)))
            .collect();
        Ok(splice(query, edits))
    }
}

impl ClauseRule for BetweenNullGuard {
    fn name(&self) -> &'static str {
        "between-null-guard"
    }

    fn requires(&self) -> &'static [Capability] {
        &[Capability::Normalized, Capability::RangesSymmetric]
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::BetweenGuarded]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        pair.try_map_each(Self::rewrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guard_in(sql: &str) -> QueryPair {
        InNullGuard::new(vec!["c1".into()])
            .apply(QueryPair::splat(sql))
            .unwrap()
    }

    #[test]
    fn test_in_guard_both_dialects() {
        let pair = guard_in("UPDATE t SET c0=1 WHERE True AND c0 IN (c0,NULL)");
        assert_eq!(
            pair.engine_a,
            "UPDATE t SET c0=1 WHERE True AND CASE WHEN c0 IS NULL THEN NULL::BOOLEAN ELSE c0 IN (c0,NULL) END"
        );
        assert_eq!(
            pair.engine_b,
            "UPDATE t SET c0=1 WHERE True AND CASE WHEN c0 IS NULL THEN NULL ELSE c0 IN (c0) END"
        );
    }

    #[test]
    fn test_in_quotes_string_column_digits() {
        let pair = guard_in("SELECT * FROM t WHERE c1 IN (0,1,NULL)");
        assert_eq!(
            pair.engine_a,
            "SELECT * FROM t WHERE CASE WHEN c1 IS NULL THEN NULL::BOOLEAN ELSE c1 IN ('0','1',NULL) END"
        );
        assert_eq!(
            pair.engine_b,
            "SELECT * FROM t WHERE CASE WHEN c1 IS NULL THEN NULL ELSE c1 IN ('0','1') END"
        );
    }

    #[test]
    fn test_in_leaves_integer_column_digits() {
        let pair = guard_in("c0 NOT IN (0,1,2,NULL)");
        assert_eq!(
            pair.engine_b,
            "CASE WHEN c0 IS NULL THEN NULL ELSE c0 NOT IN (0,1,2) END"
        );
    }

    #[test]
    fn test_in_only_null_becomes_empty_list() {
        let pair = guard_in("c0 IN (NULL)");
        assert_eq!(pair.engine_b, "CASE WHEN c0 IS NULL THEN NULL ELSE c0 IN () END");
    }

    #[test]
    fn test_in_multiple_occurrences() {
        let pair = guard_in("c0 IN (c0,NULL) AND c1 NOT IN ('0',NULL)");
        assert_eq!(
            pair.engine_b,
            "CASE WHEN c0 IS NULL THEN NULL ELSE c0 IN (c0) END AND CASE WHEN c1 IS NULL THEN NULL ELSE c1 NOT IN ('0') END"
        );
    }

    #[test]
    fn test_between_guard() {
        let pair = BetweenNullGuard
            .apply(QueryPair::new(
                "c0 BETWEEN c0 AND NULL",
                "c0 BETWEEN SYMMETRIC c0 AND NULL",
            ))
            .unwrap();
        assert_eq!(
            pair.engine_a,
            "CASE WHEN c0 IS NULL THEN NULL::BOOLEAN WHEN c0 IS NULL THEN NULL::BOOLEAN WHEN NULL IS NULL THEN NULL::BOOLEAN ELSE c0 BETWEEN c0 AND NULL END"
        );
        assert_eq!(
            pair.engine_b,
            "CASE WHEN c0 IS NULL THEN NULL WHEN c0 IS NULL THEN NULL WHEN NULL IS NULL THEN NULL ELSE c0 BETWEEN SYMMETRIC c0 AND NULL END"
        );
    }

    #[test]
    fn test_no_occurrence_is_noop() {
        let pair = QueryPair::splat("INSERT INTO t VALUES (1,'a','2024-11-11 11:11:00');");
        assert_eq!(BetweenNullGuard.apply(pair.clone()).unwrap(), pair);
        assert_eq!(guard_in(&pair.engine_a), pair);
    }
}
