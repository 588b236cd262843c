//! Body decoding: content-type dispatch to the JSON, URL-encoded, and
//! multipart decoders, plus shape inference for requests that declare no
//! content type.

pub mod json;
pub mod multipart;
pub mod urlencoded;

use crate::config::BodyParserConfig;
use crate::error::BodyError;
use crate::request::RequestBody;

/// Split a `Content-Type` header into its lowercased main type and the
/// `boundary` parameter, if any.
pub fn content_type_parts(header: &str) -> (String, Option<String>) {
    let mut parts = header.split(';');
    let main = parts.next().unwrap_or("").trim().to_ascii_lowercase();

    let boundary = parts.find_map(|p| {
        let p = p.trim();
        p.strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    });
    (main, boundary)
}

/// Decode a raw body according to the declared content type, or by
/// inference when none was declared.
pub fn decode(
    raw: &[u8],
    declared: Option<&str>,
    boundary: Option<&str>,
    cfg: &BodyParserConfig,
) -> Result<RequestBody, BodyError> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Ok(RequestBody::Empty);
    }

    match declared {
        Some("application/json") => Ok(RequestBody::Json(json::decode(&text, &cfg.json)?)),
        Some("application/x-www-form-urlencoded") => Ok(RequestBody::Form(urlencoded::decode(
            &text,
            &cfg.url_encoded,
        )?)),
        Some("multipart/form-data") => {
            let boundary = boundary.ok_or(BodyError::MissingBoundary)?;
            Ok(RequestBody::Multipart(multipart::decode(
                raw,
                boundary,
                &cfg.file_uploads,
            )?))
        }
        Some(_) => Ok(RequestBody::Text(text.into_owned())),
        None => infer(raw, &text, cfg),
    }
}

/// Shape-based inference for bodies without a declared content type.
/// The limit checks of the selected decoder still apply.
fn infer(raw: &[u8], text: &str, cfg: &BodyParserConfig) -> Result<RequestBody, BodyError> {
    let trimmed = text.trim();

    let json_shaped = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if json_shaped && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(RequestBody::Json(json::decode(text, &cfg.json)?));
    }

    if text.contains('=') && text.contains('&') {
        return Ok(RequestBody::Form(urlencoded::decode(
            text,
            &cfg.url_encoded,
        )?));
    }

    if let Some(idx) = text.find("boundary=") {
        let boundary: String = text[idx + "boundary=".len()..]
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != ';')
            .collect();
        if !boundary.is_empty() {
            return Ok(RequestBody::Multipart(multipart::decode(
                raw,
                &boundary,
                &cfg.file_uploads,
            )?));
        }
    }

    Ok(RequestBody::Text(text.to_string()))
}
