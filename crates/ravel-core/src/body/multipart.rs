//! `multipart/form-data` decoding with file-upload limits.

use std::collections::HashMap;

use memchr::memmem;

use crate::config::FileUploadLimits;
use crate::error::BodyError;
use crate::request::{FileContent, MultipartForm, UploadedFile};

/// One raw part: its header lines and its content bytes.
struct RawPart<'a> {
    headers: &'a str,
    content: &'a [u8],
}

/// Iterate the parts between boundary markers.
///
/// Content runs from after the part's blank line to the next boundary,
/// minus the trailing CRLF that precedes every boundary.
struct Parts<'a> {
    body: &'a [u8],
    marker: Vec<u8>,
}

impl<'a> Parts<'a> {
    fn new(body: &'a [u8], boundary: &str) -> Self {
        let mut marker = Vec::with_capacity(boundary.len() + 2);
        marker.extend_from_slice(b"--");
        marker.extend_from_slice(boundary.as_bytes());
        Parts { body, marker }
    }
}

impl<'a> Iterator for Parts<'a> {
    type Item = RawPart<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.body.is_empty() {
                return None;
            }

            let mut start = memmem::find(self.body, &self.marker)?;
            start += self.marker.len();

            // `--` after the marker closes the stream.
            if self.body[start..].starts_with(b"--") {
                self.body = &[];
                return None;
            }
            if self.body[start..].starts_with(b"\r\n") {
                start += 2;
            }

            let rest = &self.body[start..];
            let header_end = match memmem::find(rest, b"\r\n\r\n") {
                Some(i) => i,
                None => {
                    self.body = &[];
                    return None;
                }
            };
            let headers = &rest[..header_end];
            let content_start = header_end + 4;

            let content_end = match memmem::find(&rest[content_start..], &self.marker) {
                Some(i) => content_start + i,
                None => {
                    self.body = &[];
                    return None;
                }
            };

            // Strip the CRLF that separates content from the next marker.
            let mut content = &rest[content_start..content_end];
            if content.ends_with(b"\r\n") {
                content = &content[..content.len() - 2];
            }

            self.body = &rest[content_end..];

            match std::str::from_utf8(headers) {
                Ok(headers) => {
                    return Some(RawPart { headers, content });
                }
                // Unreadable part headers: drop the part, keep scanning.
                Err(_) => continue,
            }
        }
    }
}

/// Pull `name` and `filename` out of a Content-Disposition line. The
/// attributes are parsed per `;`-separated token, so `filename=` never
/// shadows `name=`.
fn disposition_attrs(line: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut filename = None;
    for token in line.split(';').map(str::trim) {
        let Some((attr, value)) = token.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match attr.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(value),
            "filename" => filename = Some(value),
            _ => {}
        }
    }
    (name, filename)
}

/// File content types kept as raw bytes rather than text.
fn is_binary_content_type(ct: &str) -> bool {
    ct.starts_with("image/")
        || ct.starts_with("audio/")
        || ct.starts_with("video/")
        || ct == "application/octet-stream"
        || ct == "application/pdf"
        || ct == "application/zip"
        || ct.starts_with("application/x-")
}

/// Lowercased extension after the final dot, or empty.
fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Decode a multipart body into fields and files, enforcing upload limits.
pub fn decode(
    body: &[u8],
    boundary: &str,
    limits: &FileUploadLimits,
) -> Result<MultipartForm, BodyError> {
    let mut fields = HashMap::new();
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut total_size = 0usize;

    for part in Parts::new(body, boundary) {
        let mut name = None;
        let mut filename = None;
        let mut content_type = None;

        for line in part.headers.split("\r\n") {
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("content-disposition:") {
                (name, filename) = disposition_attrs(line);
            } else if let Some(ct) = lower.strip_prefix("content-type:") {
                content_type = Some(ct.trim().to_string());
            }
        }

        // A part without a field name is not addressable; skip it.
        let Some(name) = name else { continue };

        let Some(filename) = filename else {
            fields.insert(
                name,
                String::from_utf8_lossy(part.content).into_owned(),
            );
            continue;
        };

        if files.len() + 1 > limits.max_files {
            return Err(BodyError::TooManyFiles {
                limit: limits.max_files,
            });
        }
        if filename.len() > limits.max_filename_length {
            return Err(BodyError::FilenameTooLong {
                limit: limits.max_filename_length,
            });
        }

        let ext = extension(&filename);
        if limits.blocked_extensions.iter().any(|b| *b == ext) {
            return Err(BodyError::ExtensionBlocked { extension: ext });
        }
        if !limits.allowed_extensions.is_empty()
            && !limits.allowed_extensions.iter().any(|a| *a == ext)
        {
            return Err(BodyError::ExtensionNotAllowed { extension: ext });
        }

        let size = part.content.len();
        if size > limits.max_file_size {
            return Err(BodyError::FileTooLarge {
                filename,
                limit: limits.max_file_size,
            });
        }
        total_size += size;
        if total_size > limits.max_total_size {
            return Err(BodyError::TotalUploadTooLarge {
                limit: limits.max_total_size,
            });
        }

        let content_type =
            content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let content = if is_binary_content_type(&content_type) {
            FileContent::Bytes(part.content.to_vec())
        } else {
            FileContent::Text(String::from_utf8_lossy(part.content).into_owned())
        };

        files.push(UploadedFile {
            field: name,
            filename,
            content_type,
            size,
            content,
        });
    }

    Ok(MultipartForm { fields, files })
}
