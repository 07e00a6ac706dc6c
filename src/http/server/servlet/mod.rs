// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The servlet trait and the six provided servlet implementations.

pub mod basic_auth;
pub mod cookie_auth;
pub mod file;
pub mod redirect;
pub mod xml;
pub mod xmlrpc;

pub use basic_auth::BasicAuthServlet;
pub use cookie_auth::CookieAuthServlet;
pub use file::FileServlet;
pub use redirect::RedirectServlet;
pub use xml::XmlServlet;
pub use xmlrpc::XmlRpcServlet;

use crate::{
    error::Result,
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

/// A unit of request handling in the routing table. `run` may inspect
/// and write to `resp` before returning [`Outcome::Continue`] (try the
/// next route — used by gating servlets) or [`Outcome::Handled`] (stop
/// here). `destroy` runs once, when the servlet is removed from its
/// router, for releasing any resources it holds (e.g. closing a file).
pub trait Servlet: Send + Sync {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome>;

    fn destroy(&self) {}
}
