// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Signed-cookie session authentication, grounded on
//! `http/servlet/cookieauth.h`/`http_servlet_cookieauth.c`.
//!
//! The cookie is a fixed binary layout (length-prefixed strings, fixed-
//! width integers) signed with RSA/MD5 over itself with the signature
//! field zeroed, then base64-encoded onto the wire. Signature padding
//! is PKCS#1 v1.5 without the ASN.1 `DigestInfo` prefix
//! ([`rsa::Pkcs1v15Sign::new_unprefixed`]) rather than the OID-tagged
//! form, since MD5 isn't guaranteed to carry the `AssociatedOid` impl
//! the prefixed form requires — both sides of a signature only ever
//! need to agree with each other, not with a third party.

use base64::Engine;
use md5::{Digest, Md5};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::{
    error::{Error, Result},
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

use super::{Servlet, redirect::RedirectServlet};

#[derive(Clone, Debug, PartialEq)]
pub struct Cookie {
    pub username: String,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub session_only: bool,
    pub timestamp: u64,
    /// Absolute expiry (unix seconds); 0 means never.
    pub expire: u64,
    /// Max seconds since `timestamp` before the cookie goes stale
    /// regardless of `expire`; 0 means unbounded.
    pub linger: u64,
    pub system_id: String,
    pub rsa_signature: Vec<u8>,
}

impl Cookie {
    fn encode_fields(&self, zero_signature: bool) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.username);
        write_str(&mut out, &self.path);
        write_str(&mut out, &self.domain);
        out.push(self.secure as u8);
        out.push(self.session_only as u8);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.expire.to_be_bytes());
        out.extend_from_slice(&self.linger.to_be_bytes());
        write_str(&mut out, &self.system_id);
        if zero_signature {
            write_bytes(&mut out, &[]);
        } else {
            write_bytes(&mut out, &self.rsa_signature);
        }
        out
    }

    fn digest(&self) -> [u8; 16] {
        Md5::digest(self.encode_fields(true)).into()
    }

    pub fn sign(&mut self, key: &RsaPrivateKey) -> Result<()> {
        let digest = self.digest();
        self.rsa_signature = key
            .sign(Pkcs1v15Sign::new_unprefixed(), &digest)
            .map_err(|e| Error::invalid(format!("cookie signing failed: {e}")))?;
        Ok(())
    }

    pub fn verify(&self, key: &RsaPublicKey) -> bool {
        let digest = self.digest();
        key.verify(Pkcs1v15Sign::new_unprefixed(), &digest, &self.rsa_signature).is_ok()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.encode_fields(false))
    }

    pub fn from_base64(s: &str) -> Option<Cookie> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(s.trim()).ok()?;
        let mut cur = &bytes[..];
        let username = read_str(&mut cur)?;
        let path = read_str(&mut cur)?;
        let domain = read_str(&mut cur)?;
        let secure = read_u8(&mut cur)? != 0;
        let session_only = read_u8(&mut cur)? != 0;
        let timestamp = read_u64(&mut cur)?;
        let expire = read_u64(&mut cur)?;
        let linger = read_u64(&mut cur)?;
        let system_id = read_str(&mut cur)?;
        let rsa_signature = read_bytes(&mut cur)?;
        Some(Cookie { username, path, domain, secure, session_only, timestamp, expire, linger, system_id, rsa_signature })
    }

    /// `timestamp <= now`, `expire == 0 || now < expire`, and
    /// `linger == 0 || now < timestamp + linger`.
    pub fn is_live(&self, now: u64) -> bool {
        self.timestamp <= now
            && (self.expire == 0 || now < self.expire)
            && (self.linger == 0 || now < self.timestamp.saturating_add(self.linger))
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_u8(cur: &mut &[u8]) -> Option<u8> {
    let (b, rest) = cur.split_first()?;
    *cur = rest;
    Some(*b)
}

fn read_u64(cur: &mut &[u8]) -> Option<u64> {
    if cur.len() < 8 {
        return None;
    }
    let (head, rest) = cur.split_at(8);
    *cur = rest;
    Some(u64::from_be_bytes(head.try_into().ok()?))
}

fn read_bytes(cur: &mut &[u8]) -> Option<Vec<u8>> {
    if cur.len() < 4 {
        return None;
    }
    let (len_bytes, rest) = cur.split_at(4);
    let len = u32::from_be_bytes(len_bytes.try_into().ok()?) as usize;
    if rest.len() < len {
        return None;
    }
    let (data, rest) = rest.split_at(len);
    *cur = rest;
    Some(data.to_vec())
}

fn read_str(cur: &mut &[u8]) -> Option<String> {
    String::from_utf8(read_bytes(cur)?).ok()
}

/// Issues and validates [`Cookie`]s for one protected area. On a
/// missing or invalid cookie, dispatches to an internal redirect to
/// the configured login page. `linger > 0` causes every successful
/// access to re-issue the cookie with a fresh timestamp, which
/// requires `signing_key`.
pub struct CookieAuthServlet {
    cookie_name: String,
    system_id: String,
    public_key: RsaPublicKey,
    signing_key: Option<RsaPrivateKey>,
    redirect: RedirectServlet,
    now: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl CookieAuthServlet {
    pub fn new(
        cookie_name: impl Into<String>,
        system_id: impl Into<String>,
        public_key: RsaPublicKey,
        signing_key: Option<RsaPrivateKey>,
        login_url: impl Into<String>,
        orig_url_param: Option<impl Into<String>>,
    ) -> Self {
        CookieAuthServlet {
            cookie_name: cookie_name.into(),
            system_id: system_id.into(),
            public_key,
            signing_key,
            redirect: RedirectServlet::new(login_url, orig_url_param),
            now: Box::new(|| std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs()),
        }
    }

    /// Build a fresh, signed login cookie for `username`.
    pub fn issue(
        &self,
        username: impl Into<String>,
        path: impl Into<String>,
        domain: impl Into<String>,
        secure: bool,
        session_only: bool,
        expire: u64,
        linger: u64,
    ) -> Result<Cookie> {
        let key = self.signing_key.as_ref().ok_or_else(|| Error::invalid("cookie-auth servlet has no signing key"))?;
        let mut cookie = Cookie {
            username: username.into(),
            path: path.into(),
            domain: domain.into(),
            secure,
            session_only,
            timestamp: (self.now)(),
            expire,
            linger,
            system_id: self.system_id.clone(),
            rsa_signature: Vec::new(),
        };
        cookie.sign(key)?;
        Ok(cookie)
    }

    /// A cookie that, once set, immediately reads as expired — used
    /// for logout.
    pub fn logout_cookie(&self) -> Cookie {
        Cookie {
            username: String::new(),
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            session_only: true,
            timestamp: 0,
            expire: 1,
            linger: 0,
            system_id: self.system_id.clone(),
            rsa_signature: Vec::new(),
        }
    }

    fn validate(&self, cookie: &Cookie) -> bool {
        cookie.system_id == self.system_id && cookie.verify(&self.public_key) && cookie.is_live((self.now)())
    }
}

impl Servlet for CookieAuthServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        let Some(raw) = req.cookie(&self.cookie_name) else {
            self.redirect.run(req, resp)?;
            return Ok(Outcome::Handled);
        };

        let Some(cookie) = Cookie::from_base64(&raw) else {
            self.redirect.run(req, resp)?;
            return Ok(Outcome::Handled);
        };

        if !self.validate(&cookie) {
            self.redirect.run(req, resp)?;
            return Ok(Outcome::Handled);
        }

        if cookie.linger > 0 {
            if let Some(key) = &self.signing_key {
                let mut refreshed = cookie.clone();
                refreshed.timestamp = (self.now)();
                if refreshed.sign(key).is_ok() {
                    resp.set_header("Set-Cookie", format!("{}={}", self.cookie_name, refreshed.to_base64()))?;
                }
            }
        }

        Ok(Outcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 512).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn cookie_round_trips_through_base64() {
        let (key, _) = keypair();
        let mut cookie = Cookie {
            username: "alice".to_string(),
            path: "/".to_string(),
            domain: "example.com".to_string(),
            secure: true,
            session_only: false,
            timestamp: 1000,
            expire: 0,
            linger: 0,
            system_id: "sys".to_string(),
            rsa_signature: Vec::new(),
        };
        cookie.sign(&key).unwrap();
        let encoded = cookie.to_base64();
        let decoded = Cookie::from_base64(&encoded).unwrap();
        assert_eq!(decoded, cookie);
    }

    #[test]
    fn verify_accepts_matching_key_and_rejects_other() {
        let (key, public) = keypair();
        let (_, other_public) = keypair();
        let mut cookie = Cookie {
            username: "alice".to_string(),
            path: "/".to_string(),
            domain: "".to_string(),
            secure: false,
            session_only: true,
            timestamp: 5,
            expire: 0,
            linger: 0,
            system_id: "sys".to_string(),
            rsa_signature: Vec::new(),
        };
        cookie.sign(&key).unwrap();
        assert!(cookie.verify(&public));
        assert!(!cookie.verify(&other_public));
    }

    #[test]
    fn is_live_honors_expire_and_linger() {
        let cookie =
            Cookie { username: "a".into(), path: "/".into(), domain: "".into(), secure: false, session_only: false, timestamp: 100, expire: 200, linger: 50, system_id: "s".into(), rsa_signature: vec![] };
        assert!(cookie.is_live(120));
        assert!(!cookie.is_live(151));
        assert!(!cookie.is_live(200));
        assert!(!cookie.is_live(99));
    }

    #[test]
    fn missing_cookie_redirects_to_login() {
        let (_, public) = keypair();
        let servlet = CookieAuthServlet::new("session", "sys", public, None, "https://example.com/login", Some("orig"));
        let req = Request::new("GET", "/secret");
        let mut resp = Response::ok();
        let outcome = servlet.run(&req, &mut resp).unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(resp.status, 302);
    }

    #[test]
    fn valid_cookie_continues() {
        let (key, public) = keypair();
        let servlet =
            CookieAuthServlet::new("session", "sys", public, Some(key), "https://example.com/login", Some("orig"));
        let cookie = servlet.issue("alice", "/", "", false, true, 0, 0).unwrap();
        let mut req = Request::new("GET", "/secret");
        req.headers.set("Cookie", format!("session={}", cookie.to_base64()));
        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Continue);
    }
}
