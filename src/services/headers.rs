//! Maps an object's catalog properties onto response headers.

use crate::{models::object::Object, services::conditional::format_wire_date};
use axum::http::{HeaderMap, HeaderValue, header};

/// Service-metadata keys that surface as response headers.
const MAPPED_PROPERTIES: [(&str, header::HeaderName); 2] = [
    ("CacheControl", header::CACHE_CONTROL),
    ("ContentDisposition", header::CONTENT_DISPOSITION),
];

/// Decode a CRLF-delimited `Key:Value` service-metadata blob.
///
/// Only `\r\n` separates entries; a bare `\n` stays part of the value.
/// Best effort: blank lines, lines without a colon, and lines whose key or
/// first value part is blank are skipped. The value keeps everything after the
/// first colon. When a key repeats, the first occurrence wins.
pub fn parse_service_metadata(blob: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(blob);
    let mut properties: Vec<(String, String)> = Vec::new();

    for line in text.split("\r\n") {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let first_part = value.split(':').next().unwrap_or_default();
        if key.trim().is_empty() || first_part.trim().is_empty() {
            continue;
        }
        if properties.iter().any(|(existing, _)| existing == key) {
            continue;
        }
        properties.push((key.to_string(), value.to_string()));
    }

    properties
}

/// Write `Content-Type`, `Last-Modified` and any mapped service properties.
pub fn apply_object_headers(headers: &mut HeaderMap, object: &Object) {
    let content_type = object
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().is_empty())
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Ok(value) = HeaderValue::from_str(&format_wire_date(object.last_modification_time)) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    let properties = parse_service_metadata(&object.service_metadata);
    for (key, name) in MAPPED_PROPERTIES {
        let Some((_, value)) = properties.iter().find(|(k, _)| k == key) else {
            continue;
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::debug!(
                "skipping {} for `{}`: not a valid header value",
                key,
                object.name
            ),
        }
    }
}
