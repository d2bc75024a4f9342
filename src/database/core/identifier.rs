//! Snowflake identifier comparison
//!
//! Unquoted identifiers are stored upper-case and compare case-insensitively;
//! double-quoted identifiers keep their case and compare exactly.

fn unquote(identifier: &str) -> Option<&str> {
    identifier
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
}

/// Whether two identifiers name the same object
///
/// An unquoted identifier resolves to its upper-case form, so `"MYAPP"` and
/// `myapp` are the same name while `"MyApp"` and `myapp` are not.
pub fn identifier_matches(left: &str, right: &str) -> bool {
    match (unquote(left), unquote(right)) {
        (Some(l), Some(r)) => l == r,
        (Some(l), None) => l == right.to_ascii_uppercase(),
        (None, Some(r)) => left.to_ascii_uppercase() == r,
        (None, None) => left.eq_ignore_ascii_case(right),
    }
}

/// Whether a name as reported by `show` (stored form, never quoted) is the
/// object `identifier` refers to.
///
/// A quoted identifier must match the stored text exactly. An unquoted one
/// matches regardless of case.
pub fn name_matches(stored: &str, identifier: &str) -> bool {
    match unquote(identifier) {
        Some(inner) => stored == inner,
        None => identifier_matches(stored, identifier),
    }
}

/// Escape a value for use inside a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}
