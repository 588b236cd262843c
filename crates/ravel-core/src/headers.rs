//! Header block parsing: tokenization, name normalization, value
//! sanitization, and the DoS limits.
//!
//! The parser runs in four stages so each is testable on its own:
//! pre-parse validation (line count), structural parsing (name/value
//! split), per-value sanitization (trim + control-byte stripping), and
//! security policy (token-name check, length limits).

use std::collections::HashMap;

use crate::error::HeaderError;

/// Maximum header lines per request.
pub const MAX_HEADER_COUNT: usize = 100;
/// Maximum header name length in bytes.
pub const MAX_NAME_LENGTH: usize = 200;
/// Maximum header value length in bytes.
pub const MAX_VALUE_LENGTH: usize = 8192;

/// Parse a header block into a lowercased name -> value map.
///
/// CR, LF, and CRLF line endings are all accepted. Lines without a colon
/// or with an empty name are skipped; duplicate names keep the last value.
pub fn parse(block: &str) -> Result<HashMap<String, String>, HeaderError> {
    // Normalize all line endings to LF before splitting.
    let normalized = block.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').filter(|l| !l.is_empty()).collect();

    if lines.len() > MAX_HEADER_COUNT {
        return Err(HeaderError::TooManyHeaders {
            count: lines.len(),
            limit: MAX_HEADER_COUNT,
        });
    }

    let mut headers = HashMap::with_capacity(lines.len());
    for line in lines {
        let (raw_name, raw_value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        let name = raw_name.trim();
        if name.is_empty() {
            continue;
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(HeaderError::NameTooLong {
                limit: MAX_NAME_LENGTH,
            });
        }
        if !name.bytes().all(is_token_byte) {
            return Err(HeaderError::InvalidName {
                name: name.to_string(),
            });
        }

        let value = sanitize_value(raw_value.trim());
        if value.len() > MAX_VALUE_LENGTH {
            return Err(HeaderError::ValueTooLong {
                limit: MAX_VALUE_LENGTH,
            });
        }

        headers.insert(name.to_ascii_lowercase(), value);
    }
    Ok(headers)
}

/// RFC 7230 `token` production.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+'
        | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}

/// Strip control characters from a value. Horizontal tab survives; the
/// rest of 0x00-0x1F and 0x7F do not.
fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .filter(|&c| c == '\t' || !(c.is_ascii_control()))
        .collect()
}
