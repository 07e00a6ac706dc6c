// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The HTTP request/response model: a case-insensitive, order-
//! preserving header map and a body that is decoded into a name→value
//! map lazily, on first access, per §3.3.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::{Error, Result},
    stream::MultipartReader,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// A case-insensitive, multi-value header map. Insertion order is
/// preserved per header name so rendering is deterministic.
#[derive(Clone, Debug, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace all existing values for `name` with a single one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries.iter().filter(move |(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    Empty,
    Buffered(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Buffered(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Request { method: method.into(), uri: uri.into(), version: Version::Http11, headers: HeaderMap::new(), body: Body::Empty }
    }

    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or(&self.uri)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.header("Cookie")?;
        raw.split(';').map(str::trim).find_map(|kv| {
            let (k, v) = kv.split_once('=')?;
            (k == name).then(|| v.to_string())
        })
    }

    /// Lazily decode an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> Result<HashMap<String, String>> {
        let text = std::str::from_utf8(self.body.as_bytes()).map_err(|_| Error::parse("http", "non-UTF8 form body"))?;
        Ok(url_decode_pairs(text))
    }

    /// Lazily split a `multipart/form-data` body into its parts.
    pub fn multipart(&self) -> Result<Vec<crate::stream::multipart::Part>> {
        let content_type = self.header("Content-Type").ok_or_else(|| Error::invalid("no Content-Type header"))?;
        let boundary = content_type
            .split(';')
            .map(str::trim)
            .find_map(|kv| kv.strip_prefix("boundary="))
            .ok_or_else(|| Error::invalid("multipart Content-Type missing boundary"))?
            .trim_matches('"');
        MultipartReader::new(self.body.as_bytes(), boundary).parts()
    }

    pub async fn read_from<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Request> {
        let head = read_head(stream).await?;
        let mut headers_buf = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Request::new(&mut headers_buf);
        let status = parsed.parse(&head).map_err(|e| Error::parse("http", e.to_string()))?;
        if status.is_partial() {
            return Err(Error::parse("http", "incomplete request head"));
        }
        let method = parsed.method.ok_or_else(|| Error::parse("http", "missing method"))?.to_string();
        let uri = parsed.path.ok_or_else(|| Error::parse("http", "missing path"))?.to_string();
        let version = match parsed.version {
            Some(0) => Version::Http10,
            _ => Version::Http11,
        };
        let mut headers = HeaderMap::new();
        for h in parsed.headers.iter() {
            headers.append(h.name.to_string(), String::from_utf8_lossy(h.value).to_string());
        }
        let body = read_body(stream, &headers).await?;
        Ok(Request { method, uri, version, headers, body })
    }

    pub fn render(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version.as_str()).into_bytes();
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.body.as_bytes());
        out
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.render()).await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMap,
    body: Vec<u8>,
    body_started: bool,
}

impl Response {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Response {
            status,
            reason: reason.into(),
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: Vec::new(),
            body_started: false,
        }
    }

    pub fn ok() -> Self {
        Response::new(200, "OK")
    }

    /// Set a header. Errors once the body has started, matching the
    /// "headers buffer until the body starts" rule.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        if self.body_started {
            return Err(Error::invalid("cannot set headers after body has started"));
        }
        self.headers.set(name, value);
        Ok(())
    }

    pub fn write_body(&mut self, bytes: &[u8]) {
        self.body_started = true;
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn render(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.version.as_str(), self.status, self.reason).into_bytes();
        let mut wrote_length = false;
        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("content-length") {
                wrote_length = true;
            }
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !wrote_length {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.render()).await?;
        Ok(())
    }

    pub async fn read_from<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Response> {
        let head = read_head(stream).await?;
        let mut headers_buf = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Response::new(&mut headers_buf);
        let status = parsed.parse(&head).map_err(|e| Error::parse("http", e.to_string()))?;
        if status.is_partial() {
            return Err(Error::parse("http", "incomplete response head"));
        }
        let version = match parsed.version {
            Some(0) => Version::Http10,
            _ => Version::Http11,
        };
        let code = parsed.code.ok_or_else(|| Error::parse("http", "missing status code"))?;
        let reason = parsed.reason.unwrap_or("").to_string();
        let mut headers = HeaderMap::new();
        for h in parsed.headers.iter() {
            headers.append(h.name.to_string(), String::from_utf8_lossy(h.value).to_string());
        }
        let body = read_body(stream, &headers).await?;
        Ok(Response { status: code, reason, version, headers, body: body.as_bytes().to_vec(), body_started: true })
    }
}

async fn read_head<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::parse("http", "connection closed before headers completed"));
        }
        buf.push(byte[0]);
        if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
            return Ok(buf);
        }
        if buf.len() > 64 * 1024 {
            return Err(Error::parse("http", "header block too large"));
        }
    }
}

async fn read_body<R: AsyncRead + Unpin>(stream: &mut R, headers: &HeaderMap) -> Result<Body> {
    let Some(len) = headers.get("Content-Length") else { return Ok(Body::Empty) };
    let len: usize = len.trim().parse().map_err(|_| Error::parse("http", "bad Content-Length"))?;
    if len == 0 {
        return Ok(Body::Empty);
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Body::Buffered(buf))
}

fn url_decode_pairs(text: &str) -> HashMap<String, String> {
    text.split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Some((url_decode(k), url_decode(v)))
        })
        .collect()
}

fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            },
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            },
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_simple_request() {
        let mut req = Request::new("GET", "/foo?x=1");
        req.headers.set("Host", "example.com");
        let rendered = req.render();
        let mut cursor = std::io::Cursor::new(rendered);
        let parsed = Request::read_from(&mut cursor).await.unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.path(), "/foo");
        assert_eq!(parsed.query(), Some("x=1"));
        assert_eq!(parsed.header("Host"), Some("example.com"));
    }

    #[tokio::test]
    async fn reads_a_buffered_request_body() {
        let mut resp = Response::ok();
        resp.write_body(b"hello");
        let rendered = resp.render();
        let mut cursor = std::io::Cursor::new(rendered);
        let parsed = Response::read_from(&mut cursor).await.unwrap();
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, b"hello");
    }

    #[test]
    fn decodes_form_body() {
        let mut req = Request::new("POST", "/");
        req.body = Body::Buffered(b"a=1&b=hello+world&c=%2F".to_vec());
        let form = req.form().unwrap();
        assert_eq!(form.get("a"), Some(&"1".to_string()));
        assert_eq!(form.get("b"), Some(&"hello world".to_string()));
        assert_eq!(form.get("c"), Some(&"/".to_string()));
    }

    #[test]
    fn header_set_replaces_and_append_accumulates() {
        let mut h = HeaderMap::new();
        h.append("X-Foo", "1");
        h.append("X-Foo", "2");
        assert_eq!(h.get_all("x-foo").count(), 2);
        h.set("X-Foo", "3");
        assert_eq!(h.get_all("x-foo").count(), 1);
        assert_eq!(h.get("X-FOO"), Some("3"));
    }
}
