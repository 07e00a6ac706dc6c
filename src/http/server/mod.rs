// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An HTTP server with a priority-ordered servlet routing table,
//! grounded on `http_server.c`/`http_servlet.h`. Connections are
//! served over [`crate::net::Server`]; each request is matched against
//! the routing table by virtual host and path regex, most specific
//! (highest priority) first.

pub mod servlet;

use std::{sync::Arc, time::Duration};

use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    error::Result,
    http::message::{Request, Response},
    log::{self, Severity},
};

pub use servlet::Servlet;

/// What a servlet decided to do with a request.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Try the next matching route (used by gating servlets like
    /// basic-auth and cookie-auth once access is granted).
    Continue,
    /// The response is complete; stop routing.
    Handled,
}

struct Route {
    virtual_host: Option<String>,
    pattern: Regex,
    priority: i32,
    servlet: Arc<dyn Servlet>,
}

/// The ordered table of `(virtual_host, regex, priority, servlet)`
/// entries a server dispatches requests through.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Register a route. `virtual_host` of `None` matches any `Host`
    /// header (or its absence). Routes are re-sorted by descending
    /// priority after every insertion.
    pub fn add(
        &mut self,
        virtual_host: Option<impl Into<String>>,
        pattern: Regex,
        priority: i32,
        servlet: Arc<dyn Servlet>,
    ) {
        self.routes.push(Route { virtual_host: virtual_host.map(Into::into), pattern, priority, servlet });
        self.routes.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Run `request` through matching routes in priority order until
    /// one returns [`Outcome::Handled`] or the table is exhausted.
    pub fn dispatch(&self, request: &Request, response: &mut Response) -> Result<bool> {
        let host = request.header("Host").map(|h| h.split(':').next().unwrap_or(h));

        for route in &self.routes {
            if let Some(want) = &route.virtual_host {
                if host != Some(want.as_str()) {
                    continue;
                }
            }
            if !route.pattern.is_match(request.path()) {
                continue;
            }
            if route.servlet.run(request, response)? == Outcome::Handled {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        for route in &self.routes {
            route.servlet.destroy();
        }
    }
}

pub struct ServerConfig {
    pub max_conn: usize,
    pub idle_timeout: Duration,
    pub log_channel: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { max_conn: 0, idle_timeout: Duration::from_secs(30), log_channel: 0 }
    }
}

/// Serve HTTP/1.0 and HTTP/1.1 requests from `conn` against `router`
/// until the peer closes the connection, a parse error occurs, or the
/// connection goes idle past `idle_timeout`. One call handles exactly
/// one accepted connection; callers spawn this per connection the way
/// [`crate::net::Server`] does.
pub async fn serve_connection<S>(mut conn: S, router: Arc<Router>, config: &ServerConfig)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let request = match tokio::time::timeout(config.idle_timeout, Request::read_from(&mut conn)).await {
            Ok(Ok(req)) => req,
            Ok(Err(_)) => return,
            Err(_) => return,
        };

        let keep_alive = request.version == crate::http::Version::Http11
            && !request.header("Connection").is_some_and(|v| v.eq_ignore_ascii_case("close"));
        let connection_header = if keep_alive { "keep-alive" } else { "close" };

        let mut response = Response::ok();
        let _ = response.set_header("Connection", connection_header);

        let outcome = router.dispatch(&request, &mut response);
        let response = match outcome {
            Ok(true) => response,
            Ok(false) => {
                let mut not_found = Response::new(404, "Not Found");
                let _ = not_found.set_header("Connection", connection_header);
                not_found.write_body(b"not found");
                not_found
            },
            Err(e) => {
                log::log_to(config.log_channel, Severity::Warning, format!("servlet error: {e}"));
                let mut error = Response::new(500, "Internal Server Error");
                let _ = error.set_header("Connection", connection_header);
                error.write_body(b"internal server error");
                error
            },
        };

        if response.write_to(&mut conn).await.is_err() || !keep_alive {
            return;
        }
    }
}
