// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Boundary-delimited reader for `multipart/form-data` bodies.

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    /// The `name` attribute of a `Content-Disposition: form-data` header.
    pub fn name(&self) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-disposition")).and_then(|(_, v)| {
            v.split(';').map(str::trim).find_map(|kv| kv.strip_prefix("name=").map(|s| s.trim_matches('"')))
        })
    }
}

/// Splits a complete `multipart/form-data` body on `--{boundary}`
/// delimiters. `body` must be the full buffered payload; this does
/// not stream incrementally, matching the lazy-decode-on-first-access
/// model the HTTP message body uses.
pub struct MultipartReader<'a> {
    boundary: Vec<u8>,
    body: &'a [u8],
}

impl<'a> MultipartReader<'a> {
    pub fn new(body: &'a [u8], boundary: &str) -> Self {
        MultipartReader { boundary: format!("--{boundary}").into_bytes(), body }
    }

    pub fn parts(&self) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        let mut cursor = self.body;

        let first = find(cursor, &self.boundary).ok_or_else(|| Error::parse("multipart", "no boundary found"))?;
        cursor = &cursor[first + self.boundary.len()..];

        loop {
            if cursor.starts_with(b"--") {
                break;
            }
            cursor = skip_crlf(cursor);

            let header_end =
                find(cursor, b"\r\n\r\n").ok_or_else(|| Error::parse("multipart", "missing header terminator"))?;
            let header_block = &cursor[..header_end];
            let headers = parse_headers(header_block)?;
            cursor = &cursor[header_end + 4..];

            let next_boundary =
                find(cursor, &self.boundary).ok_or_else(|| Error::parse("multipart", "unterminated part"))?;
            let mut body_end = next_boundary;
            if body_end >= 2 && &cursor[body_end - 2..body_end] == b"\r\n" {
                body_end -= 2;
            }
            parts.push(Part { headers, body: cursor[..body_end].to_vec() });
            cursor = &cursor[next_boundary + self.boundary.len()..];
        }

        Ok(parts)
    }
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    if let Some(rest) = data.strip_prefix(b"\r\n") { rest } else { data }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, String)>> {
    let text = std::str::from_utf8(block).map_err(|_| Error::parse("multipart", "non-UTF8 headers"))?;
    let mut headers = Vec::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let (name, value) =
            line.split_once(':').ok_or_else(|| Error::parse("multipart", format!("malformed header line \"{line}\"")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_parts() {
        let body = b"--BOUND\r\n\
Content-Disposition: form-data; name=\"field1\"\r\n\r\n\
value1\r\n\
--BOUND\r\n\
Content-Disposition: form-data; name=\"file1\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
hello\r\n\
--BOUND--\r\n";
        let reader = MultipartReader::new(body, "BOUND");
        let parts = reader.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name(), Some("field1"));
        assert_eq!(parts[0].body, b"value1");
        assert_eq!(parts[1].name(), Some("file1"));
        assert_eq!(parts[1].body, b"hello");
    }

    #[test]
    fn missing_boundary_is_an_error() {
        let reader = MultipartReader::new(b"no boundary here", "BOUND");
        assert!(reader.parts().is_err());
    }
}
