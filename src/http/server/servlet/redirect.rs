// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Unconditional 302 redirect, grounded on `http_servlet_redirect.c`.

use crate::{
    error::Result,
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

use super::Servlet;

pub struct RedirectServlet {
    base_url: String,
    /// Name of the query parameter the original request URL is
    /// appended under, or `None` to redirect bare.
    orig_url_param: Option<String>,
}

impl RedirectServlet {
    pub fn new(base_url: impl Into<String>, orig_url_param: Option<impl Into<String>>) -> Self {
        RedirectServlet { base_url: base_url.into(), orig_url_param: orig_url_param.map(Into::into) }
    }

    pub fn location_for(&self, request_uri: &str) -> String {
        match &self.orig_url_param {
            Some(param) => {
                let encoded = url_encode(request_uri);
                let sep = if self.base_url.contains('?') { '&' } else { '?' };
                format!("{}{sep}{param}={encoded}", self.base_url)
            },
            None => self.base_url.clone(),
        }
    }
}

impl Servlet for RedirectServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        *resp = Response::new(302, "Found");
        resp.set_header("Location", self.location_for(&req.uri))?;
        resp.write_body(b"");
        Ok(Outcome::Handled)
    }
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_with_original_url_appended() {
        let servlet = RedirectServlet::new("https://example.com/login", Some("return_to"));
        let req = Request::new("GET", "/secret?x=1");
        let mut resp = Response::ok();
        let outcome = servlet.run(&req, &mut resp).unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(resp.status, 302);
        assert_eq!(resp.headers.get("Location"), Some("https://example.com/login?return_to=%2Fsecret%3Fx%3D1"));
    }

    #[test]
    fn redirects_bare_without_param() {
        let servlet = RedirectServlet::new("https://example.com/login", None::<String>);
        let req = Request::new("GET", "/secret");
        let mut resp = Response::ok();
        servlet.run(&req, &mut resp).unwrap();
        assert_eq!(resp.headers.get("Location"), Some("https://example.com/login"));
    }
}
