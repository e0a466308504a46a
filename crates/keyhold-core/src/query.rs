//! Query-string helpers shared by the listing endpoints.
//!
//! `offset` and `limit` arrive as free-form strings. They are read the way
//! JavaScript's `parseInt` reads them: surrounding junk after a numeric
//! prefix is ignored (`"10abc"` is 10) and a string with no numeric prefix is
//! absent rather than an error. The existing API clients rely on that.

use crate::error::ServiceError;

/// Parse the leading integer of `input` with `parseInt` semantics.
///
/// Leading whitespace is skipped, one `+`/`-` sign is accepted, and a `0x`
/// prefix switches to base 16. Parsing stops at the first character that is
/// not a digit in the active base. Returns `None` when no digit was read.
/// Values beyond the `i64` range saturate.
#[must_use]
pub fn parse_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match s.get(..2) {
        Some("0x" | "0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        seen = true;
        value = value
            .saturating_mul(i64::from(radix))
            .saturating_add(i64::from(d));
    }

    seen.then(|| if negative { value.saturating_neg() } else { value })
}

/// Skip/limit pair resolved from raw `offset` / `limit` query values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Number of matches to skip.
    pub skip: usize,
    /// Maximum number of matches to return; `None` returns all.
    pub limit: Option<usize>,
}

impl Pagination {
    /// Resolve raw query values.
    ///
    /// A non-numeric or missing offset skips nothing; a non-numeric, missing
    /// or zero limit returns everything; a negative limit counts as its
    /// absolute value.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] for a negative offset.
    pub fn from_query(offset: Option<&str>, limit: Option<&str>) -> Result<Self, ServiceError> {
        let skip = match offset.and_then(parse_int) {
            None => 0,
            Some(n) if n < 0 => {
                return Err(ServiceError::InvalidInput {
                    reason: format!("offset must be non-negative, got {n}"),
                });
            }
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let limit = match limit.and_then(parse_int) {
            None | Some(0) => None,
            Some(n) => Some(usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX)),
        };

        Ok(Self { skip, limit })
    }
}
