//! Minimal SQL lexer using nom.
//!
//! Produces spanned tokens for the clause subset the mapping rules touch:
//! words, numbers, literals, parentheses, commas, casts and operator runs.
//! Rewrites work on token spans and splice replacement text back into the
//! source, so untouched text is reproduced byte for byte.

use std::ops::Range;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};

use crate::error::{DiffError, DiffResult};

/// Token classes recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword, optionally dotted (`T1.c2`).
    Word,
    /// Numeric literal, with an optional unit suffix (`1d`).
    Number,
    /// Single-quoted string literal.
    Str,
    /// Double-quoted identifier.
    QuotedIdent,
    LParen,
    RParen,
    Comma,
    Semicolon,
    /// `::` cast marker.
    Cast,
    /// Run of operator characters (`<>`, `&`, `~`, `=`).
    Operator,
}

/// A token and its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    /// The token's text within `source`.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    /// Case-insensitive keyword match for word tokens.
    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(word)
    }
}

/// Tokenize a complete query.
pub fn tokenize(source: &str) -> DiffResult<Vec<Token>> {
    match parse_tokens(source) {
        Ok((rest, raw)) => {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                let position = source.len() - rest.len();
                return Err(DiffError::Tokenize {
                    position,
                    message: format!("Unexpected character '{}'", rest.chars().next().unwrap_or(' ')),
                });
            }
            let tokens = raw
                .into_iter()
                .map(|(kind, text)| {
                    let start = offset(source, text);
                    Token {
                        kind,
                        span: start..start + text.len(),
                    }
                })
                .collect();
            Ok(tokens)
        }
        Err(e) => Err(DiffError::Tokenize {
            position: 0,
            message: format!("Tokenize failed: {:?}", e),
        }),
    }
}

/// Byte offset of a subslice within its parent string.
fn offset(source: &str, slice: &str) -> usize {
    slice.as_ptr() as usize - source.as_ptr() as usize
}

fn parse_tokens(input: &str) -> IResult<&str, Vec<(TokenKind, &str)>> {
    many0(preceded(multispace0, parse_token))(input)
}

fn parse_token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((
        map(parse_string_literal, |s| (TokenKind::Str, s)),
        map(parse_quoted_ident, |s| (TokenKind::QuotedIdent, s)),
        map(tag("::"), |s| (TokenKind::Cast, s)),
        map(parse_number, |s| (TokenKind::Number, s)),
        map(parse_word, |s| (TokenKind::Word, s)),
        map(recognize(char('(')), |s| (TokenKind::LParen, s)),
        map(recognize(char(')')), |s| (TokenKind::RParen, s)),
        map(recognize(char(',')), |s| (TokenKind::Comma, s)),
        map(recognize(char(';')), |s| (TokenKind::Semicolon, s)),
        map(parse_operator, |s| (TokenKind::Operator, s)),
    ))(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `name`, `T1.c2`, `t.*`
fn parse_word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        pair(take_while1(is_ident_start), take_while(is_ident_char)),
        many0(preceded(
            char('.'),
            alt((take_while1(is_ident_char), tag("*"))),
        )),
    ))(input)
}

/// `42`, `0.5`, `1d`
fn parse_number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        take_while(|c: char| c.is_ascii_alphabetic()),
    )))(input)
}

/// `'abc'` with `''` escapes.
fn parse_string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        many0(alt((
            value((), tag("''")),
            value((), take_while1(|c| c != '\'')),
        ))),
        char('\''),
    ))(input)
}

fn parse_quoted_ident(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), take_while(|c| c != '"'), char('"')))(input)
}

fn parse_operator(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| "<>=!~&|^+-*/%".contains(c))(input)
}

/// Index of the `)` matching the `(` at `open`.
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `(` matching the `)` at `close`.
pub fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match tokens[i].kind {
            TokenKind::RParen => depth += 1,
            TokenKind::LParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Apply non-overlapping `(span, replacement)` edits to `source`.
pub fn splice(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = source.to_string();
    for (span, replacement) in edits {
        out.replace_range(span, &replacement);
    }
    out
}
