//! Request path normalization.
//!
//! # Responsibilities
//! - Give every later stage, and the upstream, one canonical spelling of
//!   the request path
//! - Refuse paths whose meaning depends on how the next hop decodes them
//!
//! # Design Decisions
//! - Percent-encoded unreserved characters are decoded, everything else
//!   stays encoded
//! - Repeated slashes collapse and dot segments are resolved
//! - Encoded `/` and `\` are rejected rather than guessed at
//! - The query string is never touched

use std::borrow::Cow;

use axum::{
    body::Body,
    http::{uri::PathAndQuery, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GateError;

pub const INVALID_PATH: &str = "Invalid request path";

/// Why a path cannot be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// `%2F` or `%5C` inside the path.
    EncodedSeparator,
}

/// Canonical form of `path`. Borrowed when it is canonical already.
pub fn normalize_path(path: &str) -> Result<Cow<'_, str>, PathError> {
    let decoded = decode_unreserved(path)?;

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in decoded.split('/') {
        trailing_slash = matches!(segment, "" | "." | "..");
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut normalized = String::with_capacity(decoded.len());
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if trailing_slash || segments.is_empty() {
        normalized.push('/');
    }

    if normalized == path {
        Ok(Cow::Borrowed(path))
    } else {
        Ok(Cow::Owned(normalized))
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_unreserved(path: &str) -> Result<Cow<'_, str>, PathError> {
    if !path.contains('%') {
        return Ok(Cow::Borrowed(path));
    }

    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            // '%' is ASCII, so the slice ends on a char boundary.
            let end = path[i..].find('%').map_or(path.len(), |n| i + n);
            out.push_str(&path[i..end]);
            i = end;
            continue;
        }

        let escape = bytes
            .get(i + 1..i + 3)
            .and_then(|hex| Some((hex_value(hex[0])?, hex_value(hex[1])?)));
        let Some((hi, lo)) = escape else {
            out.push('%');
            i += 1;
            continue;
        };

        let decoded = (hi << 4) | lo;
        if matches!(decoded, b'/' | b'\\') {
            return Err(PathError::EncodedSeparator);
        }
        if is_unreserved(decoded) {
            out.push(char::from(decoded));
        } else {
            out.push('%');
            out.push(char::from(bytes[i + 1].to_ascii_uppercase()));
            out.push(char::from(bytes[i + 2].to_ascii_uppercase()));
        }
        i += 3;
    }
    Ok(Cow::Owned(out))
}

/// Rewrite the request URI to its canonical path before any other stage
/// sees it.
pub async fn normalize_path_stage(mut request: Request<Body>, next: Next) -> Response {
    let rewritten = match normalize_path(request.uri().path()) {
        Ok(Cow::Borrowed(_)) => None,
        Ok(Cow::Owned(path)) => Some(path),
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = ?e, "Rejected request path");
            return GateError::bad_request(INVALID_PATH).into_response();
        }
    };

    if let Some(path) = rewritten {
        match rebuild_uri(request.uri(), &path) {
            Some(uri) => {
                tracing::debug!(from = %request.uri(), to = %uri, "Normalized request path");
                *request.uri_mut() = uri;
            }
            None => return GateError::bad_request(INVALID_PATH).into_response(),
        }
    }

    next.run(request).await
}

fn rebuild_uri(original: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match original.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = original.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
