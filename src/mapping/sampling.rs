//! `SAMPLE BY` emulation for Engine B.
//!
//! Engine B has no periodic-sampling clause. The supported shape
//! (`COUNT(*)`, `SAMPLE BY 1d`) is emulated as a derived day column, a
//! `GROUP BY` on it, and an outer projection of the aliased count:
//!
//! ```text
//! SELECT COUNT(*) FROM t SAMPLE BY 1d
//!   B: SELECT sample_by_result FROM (SELECT COUNT(*) AS sample_by_result,CAST(c2 AS DATE) AS d FROM t GROUP BY d) AS sampled
//! ```

use crate::error::{DiffError, DiffResult};
use crate::tokens::{Token, TokenKind, splice, tokenize};

use super::{Capability, ClauseRule, Dialect, QueryPair, contains_words};

/// Alias of the aggregate in the emulated query.
pub const SAMPLE_RESULT_ALIAS: &str = "sample_by_result";
/// Alias of the derived day column.
const DAY_ALIAS: &str = "d";

#[derive(Debug, Clone)]
pub struct SampleByEmulation {
    timestamp_column: String,
}

impl SampleByEmulation {
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
        }
    }

    fn rewrite(&self, query: &str) -> DiffResult<String> {
        let tokens = tokenize(query)?;
        let keyword = "SAMPLE BY";

        let sample = tokens
            .windows(2)
            .position(|w| w[0].is_word(query, "SAMPLE") && w[1].is_word(query, "BY"))
            .ok_or_else(|| DiffError::malformed(keyword, 0, "clause not found"))?;
        let position = tokens[sample].span.start;
        let granularity = tokens
            .get(sample + 2)
            .ok_or_else(|| DiffError::malformed(keyword, position, "missing granularity"))?;
        if granularity.text(query) != "1d" {
            return Err(DiffError::malformed(
                keyword,
                position,
                format!("unsupported granularity '{}'", granularity.text(query)),
            ));
        }

        let count = find_count_star(query, &tokens)
            .ok_or_else(|| DiffError::malformed(keyword, position, "only COUNT(*) can be sampled"))?;

        let mut edits = vec![
            (
                count,
                format!(
                    "COUNT(*) AS {},CAST({} AS DATE) AS {}",
                    SAMPLE_RESULT_ALIAS, self.timestamp_column, DAY_ALIAS
                ),
            ),
            (
                tokens[sample].span.start..granularity.span.end,
                format!("GROUP BY {}", DAY_ALIAS),
            ),
        ];

        let terminated = match tokens.last() {
            Some(semi) if semi.kind == TokenKind::Semicolon => {
                edits.push((semi.span.clone(), String::new()));
                true
            }
            _ => false,
        };
        let inner = splice(query, edits);

        Ok(format!(
            "SELECT {} FROM ({}) AS sampled{}",
            SAMPLE_RESULT_ALIAS,
            inner.trim_end(),
            if terminated { ";" } else { "" }
        ))
    }
}

/// Span of the first `COUNT(*)`.
fn find_count_star(query: &str, tokens: &[Token]) -> Option<std::ops::Range<usize>> {
    tokens.windows(4).find_map(|w| {
        let shape = w[0].is_word(query, "COUNT")
            && w[1].kind == TokenKind::LParen
            && w[2].kind == TokenKind::Operator
            && w[2].text(query) == "*"
            && w[3].kind == TokenKind::RParen;
        shape.then(|| w[0].span.start..w[3].span.end)
    })
}

impl ClauseRule for SampleByEmulation {
    fn name(&self) -> &'static str {
        "sample-by"
    }

    fn requires(&self) -> &'static [Capability] {
        &[
            Capability::InGuarded,
            Capability::TypesSubstituted,
            Capability::RangesSymmetric,
            Capability::DistinctExpanded,
        ]
    }

    fn provides(&self) -> &'static [Capability] {
        &[Capability::SamplingEmulated]
    }

    fn apply(&self, pair: QueryPair) -> DiffResult<QueryPair> {
        if !contains_words(&pair.engine_a, "SAMPLE", "BY")? {
            return Ok(pair);
        }
        pair.try_map_one(Dialect::EngineB, |query| self.rewrite(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(sql: &str) -> DiffResult<QueryPair> {
        SampleByEmulation::new("c2").apply(QueryPair::splat(sql))
    }

    #[test]
    fn test_sample_by_day() {
        let pair = sample("SELECT COUNT(*) FROM abcdefgh SAMPLE BY 1d").unwrap();
        assert_eq!(pair.engine_a, "SELECT COUNT(*) FROM abcdefgh SAMPLE BY 1d");
        assert_eq!(
            pair.engine_b,
            "SELECT sample_by_result FROM (SELECT COUNT(*) AS sample_by_result,CAST(c2 AS DATE) AS d FROM abcdefgh GROUP BY d) AS sampled"
        );
    }

    #[test]
    fn test_sample_by_keeps_semicolon_outside() {
        let pair = sample("SELECT COUNT(*) FROM t WHERE True SAMPLE BY 1d;").unwrap();
        assert_eq!(
            pair.engine_b,
            "SELECT sample_by_result FROM (SELECT COUNT(*) AS sample_by_result,CAST(c2 AS DATE) AS d FROM t WHERE True GROUP BY d) AS sampled;"
        );
    }

    #[test]
    fn test_absent_clause_is_noop() {
        let pair = sample("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(pair, QueryPair::splat("SELECT COUNT(*) FROM t"));
    }

    #[test]
    fn test_unsupported_granularity() {
        let err = sample("SELECT COUNT(*) FROM t SAMPLE BY 1h").unwrap_err();
        assert!(matches!(err, DiffError::MalformedClauseShape { keyword: "SAMPLE BY", .. }));
    }

    #[test]
    fn test_unsupported_aggregate() {
        assert!(sample("SELECT SUM(c0) FROM t SAMPLE BY 1d").is_err());
    }
}
