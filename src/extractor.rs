//! `IN` / `BETWEEN` occurrence extraction.
//!
//! Occurrences are found on the token stream instead of by splitting on
//! spaces, so operand lists and bounds may contain spaces, casts, nested
//! calls and binary operators.
//!
//! ```text
//! c1 NOT IN ('0','1',NULL)        c0 BETWEEN SYMMETRIC c0 AND CAST(NULL AS INT)
//! ── ─┬──── ──────┬──────         ── ───────┬──────── ── ──── ────────┬────────
//!  │  │           └ operands       │        │          low  AND       high
//!  │  └ variant                    │        └ variant (+ symmetric flag)
//!  └ target                        └ target
//! ```

use std::fmt;
use std::ops::Range;

use crate::error::{DiffError, DiffResult};
use crate::tokens::{Token, TokenKind, matching_close, matching_open, tokenize};

/// Which clause to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    In,
    Between,
}

impl ClauseKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ClauseKind::In => "IN",
            ClauseKind::Between => "BETWEEN",
        }
    }
}

/// Operator form of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorVariant {
    In,
    NotIn,
    Between,
    NotBetween,
}

impl OperatorVariant {
    pub fn is_negated(self) -> bool {
        matches!(self, OperatorVariant::NotIn | OperatorVariant::NotBetween)
    }
}

impl fmt::Display for OperatorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorVariant::In => write!(f, "IN"),
            OperatorVariant::NotIn => write!(f, "NOT IN"),
            OperatorVariant::Between => write!(f, "BETWEEN"),
            OperatorVariant::NotBetween => write!(f, "NOT BETWEEN"),
        }
    }
}

/// A located `IN`/`BETWEEN` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseOccurrence {
    /// The operand being tested.
    pub target: String,
    pub variant: OperatorVariant,
    /// `BETWEEN SYMMETRIC`
    pub symmetric: bool,
    /// `IN`: list elements. `BETWEEN`: `[low, high]`.
    pub operands: Vec<String>,
    /// Byte range of the whole clause in the source query.
    pub span: Range<usize>,
}

impl ClauseOccurrence {
    /// Clause text rebuilt from its parts.
    pub fn render(&self) -> String {
        match self.variant {
            OperatorVariant::In | OperatorVariant::NotIn => {
                format!("{} {} ({})", self.target, self.variant, self.operands.join(","))
            }
            OperatorVariant::Between | OperatorVariant::NotBetween => {
                let symmetric = if self.symmetric { " SYMMETRIC" } else { "" };
                format!(
                    "{} {}{} {} AND {}",
                    self.target, self.variant, symmetric, self.operands[0], self.operands[1]
                )
            }
        }
    }
}

/// Find every occurrence of `kind` in `query`.
pub fn extract(query: &str, kind: ClauseKind) -> DiffResult<Vec<ClauseOccurrence>> {
    let tokens = tokenize(query)?;
    let mut occurrences = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is_word(query, kind.keyword()) {
            continue;
        }
        let occurrence = match kind {
            ClauseKind::In => extract_in(query, &tokens, i)?,
            ClauseKind::Between => extract_between(query, &tokens, i)?,
        };
        occurrences.push(occurrence);
    }

    for pair in occurrences.windows(2) {
        if pair[1].span.start < pair[0].span.end {
            return Err(DiffError::malformed(
                kind.keyword(),
                pair[1].span.start,
                "nested occurrence inside another clause",
            ));
        }
    }

    Ok(occurrences)
}

/// Target start index and whether a `NOT` sits between target and keyword.
fn locate_target(
    query: &str,
    tokens: &[Token],
    keyword_idx: usize,
    keyword: &'static str,
) -> DiffResult<(usize, bool)> {
    let position = tokens[keyword_idx].span.start;
    let negated = keyword_idx > 0 && tokens[keyword_idx - 1].is_word(query, "NOT");
    let end = if negated { keyword_idx.checked_sub(2) } else { keyword_idx.checked_sub(1) };
    let end = end.ok_or_else(|| DiffError::malformed(keyword, position, "no target operand"))?;
    let start = atom_start(query, tokens, end)
        .ok_or_else(|| DiffError::malformed(keyword, position, "unrecognized target operand"))?;
    Ok((start, negated))
}

/// Walk back from `end` over one primary: literal, identifier, call or
/// parenthesized group, with `::TYPE` suffixes and a unary `~`/`-` prefix.
fn atom_start(query: &str, tokens: &[Token], end: usize) -> Option<usize> {
    let tok = &tokens[end];
    let mut start = match tok.kind {
        TokenKind::RParen => {
            let open = matching_open(tokens, end)?;
            if open > 0 && tokens[open - 1].kind == TokenKind::Word && !is_reserved(tokens[open - 1].text(query)) {
                open - 1
            } else {
                open
            }
        }
        TokenKind::Word if !is_reserved(tok.text(query)) || is_value_keyword(tok.text(query)) => end,
        TokenKind::Number | TokenKind::Str | TokenKind::QuotedIdent => end,
        _ => return None,
    };

    // x::INT -> walk over the cast to x
    if start >= 2 && tokens[start - 1].kind == TokenKind::Cast {
        start = atom_start(query, tokens, start - 2)?;
    }
    if start >= 1 && tokens[start - 1].kind == TokenKind::Operator {
        let op = tokens[start - 1].text(query);
        let prev_is_operand = start >= 2 && ends_operand(query, &tokens[start - 2]);
        if (op == "~" || op == "-") && !prev_is_operand {
            start -= 1;
        }
    }
    Some(start)
}

fn ends_operand(query: &str, tok: &Token) -> bool {
    match tok.kind {
        TokenKind::RParen | TokenKind::Number | TokenKind::Str | TokenKind::QuotedIdent => true,
        TokenKind::Word => !is_reserved(tok.text(query)),
        _ => false,
    }
}

/// Walk forward from `start` over one primary; returns the index after it.
fn atom_end(query: &str, tokens: &[Token], start: usize) -> Option<usize> {
    let tok = tokens.get(start)?;
    let mut next = match tok.kind {
        TokenKind::Operator if matches!(tok.text(query), "~" | "-" | "+") => {
            return atom_end(query, tokens, start + 1);
        }
        TokenKind::LParen => matching_close(tokens, start)? + 1,
        TokenKind::Word => {
            if tokens.get(start + 1).map(|t| t.kind) == Some(TokenKind::LParen) {
                matching_close(tokens, start + 1)? + 1
            } else if !is_reserved(tok.text(query)) || is_value_keyword(tok.text(query)) {
                start + 1
            } else {
                return None;
            }
        }
        TokenKind::Number | TokenKind::Str | TokenKind::QuotedIdent => start + 1,
        _ => return None,
    };

    // ::TYPE, ::VARCHAR(64)
    while tokens.get(next).map(|t| t.kind) == Some(TokenKind::Cast) {
        let ty = tokens.get(next + 1)?;
        if ty.kind != TokenKind::Word {
            return None;
        }
        next += 2;
        if tokens.get(next).map(|t| t.kind) == Some(TokenKind::LParen) {
            next = matching_close(tokens, next)? + 1;
        }
    }
    Some(next)
}

/// Primary followed by any chain of binary operators; stops at keywords such
/// as `AND`, commas and closing parens. With `comparisons` unset it also
/// stops before `=`, `<>`, `<` and the like, which bind looser than
/// `BETWEEN`.
fn expr_end(query: &str, tokens: &[Token], start: usize, comparisons: bool) -> Option<usize> {
    let mut next = atom_end(query, tokens, start)?;
    while let Some(tok) = tokens.get(next) {
        if tok.kind != TokenKind::Operator || (!comparisons && is_comparison(tok.text(query))) {
            break;
        }
        match atom_end(query, tokens, next + 1) {
            Some(end) => next = end,
            None => break,
        }
    }
    Some(next)
}

fn is_comparison(op: &str) -> bool {
    matches!(op, "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=")
}

fn extract_in(query: &str, tokens: &[Token], idx: usize) -> DiffResult<ClauseOccurrence> {
    let keyword = "IN";
    let position = tokens[idx].span.start;
    let (start, negated) = locate_target(query, tokens, idx, keyword)?;

    let open = idx + 1;
    if tokens.get(open).map(|t| t.kind) != Some(TokenKind::LParen) {
        return Err(DiffError::malformed(keyword, position, "expected '(' after IN"));
    }
    let close = matching_close(tokens, open)
        .ok_or_else(|| DiffError::malformed(keyword, position, "unbalanced operand list"))?;

    let operands = split_list(query, tokens, open, close);
    let target_end = tokens[if negated { idx - 2 } else { idx - 1 }].span.end;

    Ok(ClauseOccurrence {
        target: query[tokens[start].span.start..target_end].to_string(),
        variant: if negated { OperatorVariant::NotIn } else { OperatorVariant::In },
        symmetric: false,
        operands,
        span: tokens[start].span.start..tokens[close].span.end,
    })
}

/// Top-level comma separated elements between `open` and `close`.
fn split_list(query: &str, tokens: &[Token], open: usize, close: usize) -> Vec<String> {
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut element_start: Option<usize> = None;
    let mut element_end = 0usize;

    for tok in &tokens[open + 1..close] {
        match tok.kind {
            TokenKind::Comma if depth == 0 => {
                if let Some(s) = element_start.take() {
                    elements.push(query[s..element_end].to_string());
                }
                continue;
            }
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        element_start.get_or_insert(tok.span.start);
        element_end = tok.span.end;
    }
    if let Some(s) = element_start {
        elements.push(query[s..element_end].to_string());
    }
    elements
}

fn extract_between(query: &str, tokens: &[Token], idx: usize) -> DiffResult<ClauseOccurrence> {
    let keyword = "BETWEEN";
    let position = tokens[idx].span.start;
    let (start, negated) = locate_target(query, tokens, idx, keyword)?;

    let mut low_start = idx + 1;
    let symmetric = tokens.get(low_start).is_some_and(|t| t.is_word(query, "SYMMETRIC"));
    if symmetric {
        low_start += 1;
    }

    let low_end = expr_end(query, tokens, low_start, true)
        .ok_or_else(|| DiffError::malformed(keyword, position, "missing low bound"))?;
    if !tokens.get(low_end).is_some_and(|t| t.is_word(query, "AND")) {
        return Err(DiffError::malformed(keyword, position, "expected AND after low bound"));
    }
    let high_start = low_end + 1;
    let high_end = expr_end(query, tokens, high_start, false)
        .ok_or_else(|| DiffError::malformed(keyword, position, "missing high bound"))?;

    let slice = |from: usize, to: usize| query[tokens[from].span.start..tokens[to - 1].span.end].to_string();
    let target_end = if negated { idx - 1 } else { idx };

    Ok(ClauseOccurrence {
        target: slice(start, target_end),
        variant: if negated { OperatorVariant::NotBetween } else { OperatorVariant::Between },
        symmetric,
        operands: vec![slice(low_start, low_end), slice(high_start, high_end)],
        span: tokens[start].span.start..tokens[high_end - 1].span.end,
    })
}

/// Keywords that can never be an operand.
fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "AND", "OR", "NOT", "IN", "BETWEEN", "SYMMETRIC", "WHERE", "SELECT", "FROM", "SET",
        "CASE", "WHEN", "THEN", "ELSE", "END", "IS", "LIKE", "VALUES", "BY", "ON", "AS",
        "NULL", "TRUE", "FALSE",
    ];
    RESERVED.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Reserved words that are still values.
fn is_value_keyword(word: &str) -> bool {
    ["NULL", "TRUE", "FALSE"].iter().any(|k| word.eq_ignore_ascii_case(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_in() {
        let occ = extract("SELECT * FROM t WHERE c0 IN (c0,NULL)", ClauseKind::In).unwrap();
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].target, "c0");
        assert_eq!(occ[0].variant, OperatorVariant::In);
        assert_eq!(occ[0].operands, vec!["c0", "NULL"]);
        assert_eq!(occ[0].render(), "c0 IN (c0,NULL)");
    }

    #[test]
    fn test_not_in() {
        let sql = "True AND c1 NOT IN ('0','1','2',NULL)";
        let occ = extract(sql, ClauseKind::In).unwrap();
        assert_eq!(occ[0].variant, OperatorVariant::NotIn);
        assert_eq!(occ[0].target, "c1");
        assert_eq!(&sql[occ[0].span.clone()], "c1 NOT IN ('0','1','2',NULL)");
    }

    #[test]
    fn test_between_and_not_between() {
        let sql = "c0 BETWEEN c0 AND NULL AND c2 NOT BETWEEN '0' AND NULL";
        let occ = extract(sql, ClauseKind::Between).unwrap();
        assert_eq!(occ.len(), 2);
        assert_eq!(occ[0].operands, vec!["c0", "NULL"]);
        assert_eq!(occ[1].variant, OperatorVariant::NotBetween);
        assert_eq!(occ[1].target, "c2");
        assert_eq!(occ[1].operands, vec!["'0'", "NULL"]);
        assert_eq!(&sql[occ[1].span.clone()], "c2 NOT BETWEEN '0' AND NULL");
    }

    #[test]
    fn test_high_bound_stops_at_comparison() {
        let sql = "c0 BETWEEN c0 AND '5'<>'5' AND c1 IN (c1)";
        let occ = extract(sql, ClauseKind::Between).unwrap();
        assert_eq!(occ[0].operands, vec!["c0", "'5'"]);
        assert_eq!(&sql[occ[0].span.clone()], "c0 BETWEEN c0 AND '5'");
    }

    #[test]
    fn test_high_bound_keeps_bitwise_chain() {
        let sql = "c0 BETWEEN 0 AND CAST(NULL AS INT)&(~NULL::INT)";
        let occ = extract(sql, ClauseKind::Between).unwrap();
        assert_eq!(occ[0].operands, vec!["0", "CAST(NULL AS INT)&(~NULL::INT)"]);
    }

    #[test]
    fn test_between_symmetric() {
        let occ = extract("x BETWEEN SYMMETRIC 10 AND 5", ClauseKind::Between).unwrap();
        assert!(occ[0].symmetric);
        assert_eq!(occ[0].operands, vec!["10", "5"]);
        assert_eq!(occ[0].render(), "x BETWEEN SYMMETRIC 10 AND 5");
    }

    #[test]
    fn test_operands_with_spaces() {
        let sql = "c0 BETWEEN CAST(0 AS INT) AND CAST(NULL AS INT)&(~NULL::INT) AND True";
        let occ = extract(sql, ClauseKind::Between).unwrap();
        assert_eq!(occ[0].operands, vec!["CAST(0 AS INT)", "CAST(NULL AS INT)&(~NULL::INT)"]);

        let occ = extract("c1 IN (CAST(NULL AS FLOAT),'a b')", ClauseKind::In).unwrap();
        assert_eq!(occ[0].operands, vec!["CAST(NULL AS FLOAT)", "'a b'"]);
    }

    #[test]
    fn test_cast_target() {
        let occ = extract("~NULL::INT IN (1)", ClauseKind::In).unwrap();
        assert_eq!(occ[0].target, "~NULL::INT");
    }

    #[test]
    fn test_keyword_inside_literal_ignored() {
        let occ = extract("SELECT 'a IN b' FROM t", ClauseKind::In).unwrap();
        assert!(occ.is_empty());
    }

    #[test]
    fn test_missing_list_is_error() {
        let err = extract("c0 IN c1", ClauseKind::In).unwrap_err();
        assert!(matches!(err, DiffError::MalformedClauseShape { keyword: "IN", .. }));
    }

    #[test]
    fn test_missing_target_is_error() {
        assert!(extract("IN (1,2)", ClauseKind::In).is_err());
        assert!(extract("WHERE BETWEEN 1 AND 2", ClauseKind::Between).is_err());
    }

    #[test]
    fn test_missing_and_is_error() {
        let err = extract("c0 BETWEEN 1 OR 2", ClauseKind::Between).unwrap_err();
        assert!(matches!(err, DiffError::MalformedClauseShape { keyword: "BETWEEN", .. }));
    }
}
