use std::str::FromStr;

use crate::error::{HwError, Result};

/// Drop any trailing CR/LF from a received line.
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Parse a reply of the form `<prefix><value>`, e.g. `AV1.33` with prefix `AV`.
pub fn parse_prefixed<T: FromStr>(query: &str, response: &str, prefix: &str) -> Result<T> {
    response
        .strip_prefix(prefix)
        .and_then(|rest| rest.trim().parse::<T>().ok())
        .ok_or_else(|| HwError::InvalidResponse {
            query: query.to_string(),
            response: response.to_string(),
        })
}
