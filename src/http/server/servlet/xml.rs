// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed XML request/reply bodies, grounded on `http_servlet_xml.c`.
//! The request body is decoded against `request_schema` into a
//! [`Value`], handed to `handler`, and the returned `Value` (of
//! `reply_schema`) is serialized back as the response body.

use crate::{
    codec::xml::{self, InputFlags, OutputFlags},
    error::{Error, Result},
    http::{
        message::{Request, Response},
        server::Outcome,
    },
    structs::{Schema, Value},
};

use super::Servlet;

pub struct XmlServlet {
    request_schema: &'static Schema,
    reply_schema: &'static Schema,
    request_tag: &'static str,
    reply_tag: &'static str,
    handler: Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>,
}

impl XmlServlet {
    pub fn new(
        request_schema: &'static Schema,
        reply_schema: &'static Schema,
        request_tag: &'static str,
        reply_tag: &'static str,
        handler: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        XmlServlet { request_schema, reply_schema, request_tag, reply_tag, handler: Box::new(handler) }
    }

    pub fn decode_request(&self, body: &str) -> Result<Value> {
        let (value, _attrs) = xml::input(self.request_schema, self.request_tag, body, InputFlags::UNINIT)?;
        Ok(value)
    }

    pub fn encode_reply(&self, value: &Value) -> Result<String> {
        xml::output(self.reply_schema, self.reply_tag, value, &[], OutputFlags::empty())
    }
}

impl Servlet for XmlServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        let content_type = req.header("Content-Type").unwrap_or("");
        if !content_type.starts_with("application/xml") && !content_type.starts_with("text/xml") {
            return Ok(Outcome::Continue);
        }

        let body = std::str::from_utf8(req.body.as_bytes()).map_err(|_| Error::parse("xml", "non-UTF8 body"))?;
        let value = self.decode_request(body)?;
        let reply = (self.handler)(&value)?;
        let rendered = self.encode_reply(&reply)?;

        resp.set_header("Content-Type", "application/xml")?;
        resp.write_body(rendered.as_bytes());
        Ok(Outcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::primitive::PrimitiveKind;

    static ECHO_SCHEMA: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });

    #[test]
    fn unmatched_content_type_falls_through() {
        let servlet = XmlServlet::new(&ECHO_SCHEMA, &ECHO_SCHEMA, "echo", "echo", |v| Ok(v.clone()));
        let req = Request::new("POST", "/echo");
        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Continue);
    }
}
