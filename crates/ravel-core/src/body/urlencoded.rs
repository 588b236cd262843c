//! `application/x-www-form-urlencoded` decoding.
//!
//! Field limits are checked both before and after percent-decoding, so a
//! short encoded field cannot smuggle an oversized decoded one and vice
//! versa.

use std::collections::HashMap;

use crate::config::UrlEncodedLimits;
use crate::error::BodyError;

/// Percent-decode a form component. `+` becomes a space; a malformed
/// escape is kept literally; a result that is not valid UTF-8 falls back
/// to the original input.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        c @ b'0'..=b'9' => Some(c - b'0'),
        c @ b'a'..=b'f' => Some(c - b'a' + 10),
        c @ b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode a form body into a decoded-key -> decoded-value map.
pub fn decode(
    text: &str,
    limits: &UrlEncodedLimits,
) -> Result<HashMap<String, String>, BodyError> {
    if text.len() > limits.max_size {
        return Err(BodyError::FormTooLarge {
            size: text.len(),
            limit: limits.max_size,
        });
    }

    let pairs: Vec<&str> = text.split('&').filter(|p| !p.is_empty()).collect();
    if pairs.len() > limits.max_fields {
        return Err(BodyError::FormTooManyFields {
            limit: limits.max_fields,
        });
    }

    let mut out = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (raw_name, raw_value) = match pair.split_once('=') {
            Some(split) => split,
            None => (pair, ""),
        };

        check_field(raw_name, raw_value, limits)?;
        let name = percent_decode(raw_name);
        let value = percent_decode(raw_value);
        check_field(&name, &value, limits)?;

        if name.is_empty() {
            continue;
        }
        out.insert(name, value);
    }
    Ok(out)
}

fn check_field(name: &str, value: &str, limits: &UrlEncodedLimits) -> Result<(), BodyError> {
    if name.len() > limits.max_field_name_length {
        return Err(BodyError::FormFieldNameTooLong {
            limit: limits.max_field_name_length,
        });
    }
    if value.len() > limits.max_field_length {
        return Err(BodyError::FormFieldTooLong {
            limit: limits.max_field_length,
        });
    }
    Ok(())
}
