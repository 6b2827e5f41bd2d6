//! Placeholder scanning for `?`-style SQL.
//!
//! The scanner skips quoted strings, quoted identifiers, comments and
//! dollar-quoted blocks via a lightweight state machine; it may still miss
//! edge cases in complex SQL (for example the `jsonb ?` operator on Postgres).

use std::borrow::Cow;

mod scanner;

use scanner::placeholder_offsets;

/// Target placeholder style for a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Positional `?`, sent as written (`SQLite`).
    Positional,
    /// Numbered `$1`, `$2`, ... (`PostgreSQL`).
    Numbered,
}

/// Number of `?` placeholders outside literals and comments.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    placeholder_offsets(sql).len()
}

/// Why an IN-list fragment could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InListIssue {
    /// The fragment must hold exactly one `?`; it held this many.
    PlaceholderCount(usize),
    /// `IN ()` is not valid SQL.
    EmptyList,
}

impl std::fmt::Display for InListIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InListIssue::PlaceholderCount(found) => write!(
                f,
                "must contain exactly one `?` placeholder, found {found}"
            ),
            InListIssue::EmptyList => f.write_str("needs at least one value"),
        }
    }
}

/// Replace the single `?` in `fragment` with `count` comma-joined placeholders.
///
/// ```rust
/// use simple_db::translation::expand_in_list;
///
/// assert_eq!(expand_in_list("id IN (?)", 3).unwrap(), "id IN (?,?,?)");
/// ```
///
/// # Errors
/// Returns `InListIssue` unless the fragment holds exactly one placeholder and
/// `count` is positive.
pub fn expand_in_list(fragment: &str, count: usize) -> Result<String, InListIssue> {
    let offsets = placeholder_offsets(fragment);
    if offsets.len() != 1 {
        return Err(InListIssue::PlaceholderCount(offsets.len()));
    }
    if count == 0 {
        return Err(InListIssue::EmptyList);
    }

    let at = offsets[0];
    let mut out = String::with_capacity(fragment.len() + count * 2);
    out.push_str(&fragment[..at]);
    out.push_str(&vec!["?"; count].join(","));
    out.push_str(&fragment[at + 1..]);
    Ok(out)
}

/// Rewrite `?` placeholders for the target style.
///
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    if target == PlaceholderStyle::Positional {
        return Cow::Borrowed(sql);
    }

    let offsets = placeholder_offsets(sql);
    if offsets.is_empty() {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + offsets.len() * 2);
    let mut last = 0;
    for (n, at) in offsets.into_iter().enumerate() {
        out.push_str(&sql[last..at]);
        out.push('$');
        out.push_str(&(n + 1).to_string());
        last = at + 1;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}
