// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP Basic authentication gate, grounded on `http_servlet_basicauth.c`.
//! The check callback returns `None` to allow the request through, or
//! `Some(realm)` to deny it with that realm advertised in the
//! `WWW-Authenticate` challenge.

use base64::Engine;

use crate::{
    error::Result,
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

use super::Servlet;

pub struct BasicAuthServlet {
    check: Box<dyn Fn(&str, &str) -> Option<String> + Send + Sync>,
    default_realm: String,
}

impl BasicAuthServlet {
    pub fn new(
        default_realm: impl Into<String>,
        check: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        BasicAuthServlet { check: Box::new(check), default_realm: default_realm.into() }
    }

    fn deny(&self, resp: &mut Response, realm: &str) -> Result<()> {
        *resp = Response::new(401, "Unauthorized");
        resp.set_header("WWW-Authenticate", format!("Basic realm=\"{realm}\""))?;
        resp.write_body(b"unauthorized");
        Ok(())
    }
}

impl Servlet for BasicAuthServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        let Some((user, pass)) = req.header("Authorization").and_then(decode_basic) else {
            self.deny(resp, &self.default_realm)?;
            return Ok(Outcome::Handled);
        };

        match (self.check)(&user, &pass) {
            None => Ok(Outcome::Continue),
            Some(realm) => {
                self.deny(resp, &realm)?;
                Ok(Outcome::Handled)
            },
        }
    }
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_header(user: &str, pass: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        format!("Basic {encoded}")
    }

    #[test]
    fn valid_credentials_continue() {
        let servlet = BasicAuthServlet::new("realm", |u, p| (u != "alice" || p != "secret").then(|| "realm".to_string()));
        let mut req = Request::new("GET", "/");
        req.headers.set("Authorization", auth_header("alice", "secret"));
        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Continue);
    }

    #[test]
    fn missing_header_is_denied_with_default_realm() {
        let servlet = BasicAuthServlet::new("realm", |_, _| None);
        let req = Request::new("GET", "/");
        let mut resp = Response::ok();
        let outcome = servlet.run(&req, &mut resp).unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(resp.status, 401);
        assert_eq!(resp.headers.get("WWW-Authenticate"), Some("Basic realm=\"realm\""));
    }

    #[test]
    fn wrong_credentials_are_denied_with_callback_realm() {
        let servlet = BasicAuthServlet::new("realm", |_, _| Some("nope".to_string()));
        let mut req = Request::new("GET", "/");
        req.headers.set("Authorization", auth_header("bob", "wrong"));
        let mut resp = Response::ok();
        servlet.run(&req, &mut resp).unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(resp.headers.get("WWW-Authenticate"), Some("Basic realm=\"nope\""));
    }
}
