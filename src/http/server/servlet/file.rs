// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Serves files rooted at a document root, grounded on
//! `http_servlet_file.c`.

use std::path::{Path, PathBuf};

use crate::{
    error::Result,
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

use super::Servlet;

pub struct FileServlet {
    doc_root: PathBuf,
    /// URL prefix stripped from the request path before it is joined
    /// to `doc_root` (e.g. `/static` for requests under `/static/*`).
    url_prefix: String,
    /// When set, resolved paths that symlink outside `doc_root` are
    /// rejected rather than served.
    deny_symlink_escape: bool,
}

impl FileServlet {
    pub fn new(doc_root: impl Into<PathBuf>, url_prefix: impl Into<String>, deny_symlink_escape: bool) -> Self {
        FileServlet { doc_root: doc_root.into(), url_prefix: url_prefix.into(), deny_symlink_escape }
    }

    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let stripped = request_path.strip_prefix(&self.url_prefix).unwrap_or(request_path);
        let relative = stripped.trim_start_matches('/');
        if relative.split('/').any(|seg| seg == "..") {
            return None;
        }
        Some(self.doc_root.join(relative))
    }

    fn escapes_root(&self, resolved: &Path) -> bool {
        let Ok(canonical) = resolved.canonicalize() else { return false };
        let Ok(root) = self.doc_root.canonicalize() else { return false };
        !canonical.starts_with(root)
    }
}

impl Servlet for FileServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        let Some(path) = self.resolve(req.path()) else {
            *resp = Response::new(403, "Forbidden");
            resp.write_body(b"forbidden");
            return Ok(Outcome::Handled);
        };

        if self.deny_symlink_escape && path.is_symlink() && self.escapes_root(&path) {
            *resp = Response::new(403, "Forbidden");
            resp.write_body(b"forbidden");
            return Ok(Outcome::Handled);
        }

        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Outcome::Continue),
            Err(_) => {
                *resp = Response::new(500, "Internal Server Error");
                resp.write_body(b"read error");
                return Ok(Outcome::Handled);
            },
        };

        let guess = mime_guess::from_path(&path).first_or_octet_stream();
        resp.set_header("Content-Type", guess.essence_str().to_string())?;
        resp.write_body(&bytes);
        Ok(Outcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_an_existing_file_with_guessed_mime_type() {
        let dir = tempdir();
        std::fs::write(dir.join("hello.html"), b"<h1>hi</h1>").unwrap();
        let servlet = FileServlet::new(&dir, "/static", false);

        let req = Request::new("GET", "/static/hello.html");
        let mut resp = Response::ok();
        let outcome = servlet.run(&req, &mut resp).unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(resp.body(), b"<h1>hi</h1>");
        assert_eq!(resp.headers.get("Content-Type"), Some("text/html"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_falls_through_to_the_next_route() {
        let dir = tempdir();
        let servlet = FileServlet::new(&dir, "/static", false);
        let req = Request::new("GET", "/static/nope.html");
        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Continue);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn dotdot_in_path_is_rejected() {
        let dir = tempdir();
        let servlet = FileServlet::new(&dir, "/static", false);
        let req = Request::new("GET", "/static/../secret");
        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Handled);
        assert_eq!(resp.status, 403);
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> PathBuf {
        static COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("pdel-file-servlet-test-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
