//! Query text canonicalization.
//!
//! Every positional step downstream assumes single-space token separation and
//! no space after a comma. Whitespace inside single-quoted literals and
//! double-quoted identifiers is copied verbatim.

/// Collapse whitespace runs to one space and drop the space after commas.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // quote character of the literal or identifier being copied
    let mut quoted: Option<char> = None;
    let mut pending_space = false;

    for c in raw.chars() {
        if let Some(q) = quoted {
            out.push(c);
            if c == q {
                // a doubled quote re-enters on the next one
                quoted = None;
            }
            continue;
        }

        if c.is_whitespace() {
            pending_space = true;
            continue;
        }

        if pending_space && !out.is_empty() && !out.ends_with(',') {
            out.push(' ');
        }
        pending_space = false;

        if c == '\'' || c == '"' {
            quoted = Some(c);
        }
        out.push(c);
    }

    out
}

/// Whether `query` already satisfies the normalized form.
pub fn is_normalized(query: &str) -> bool {
    normalize(query) == query
}
