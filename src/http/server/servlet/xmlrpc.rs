// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! XML-RPC method dispatch, layered on the same `application/xml`
//! POST-body handling as [`super::xml::XmlServlet`] but using the
//! `codec::xmlrpc` envelope rather than a schema-typed one, grounded
//! on `http_servlet_xmlrpc.c`.

use std::collections::HashMap;

use crate::{
    codec::xmlrpc::{self, Fault, MethodCall, MethodResponse, Value as RpcValue},
    error::{Error, Result},
    http::{
        message::{Request, Response},
        server::Outcome,
    },
};

use super::Servlet;

/// What a method handler hands back.
pub enum MethodOutcome {
    /// A single value, wrapped as the sole XML-RPC response parameter.
    Value(RpcValue),
    /// The full, already-exploded parameter list for the response.
    Params(Vec<RpcValue>),
    Fault(Fault),
}

pub struct Method {
    /// Inclusive bounds on the number of call parameters this method
    /// accepts, supporting variadic methods.
    pub min_params: usize,
    pub max_params: usize,
    pub handler: Box<dyn Fn(&[RpcValue]) -> Result<MethodOutcome> + Send + Sync>,
}

impl Method {
    pub fn new(
        min_params: usize,
        max_params: usize,
        handler: impl Fn(&[RpcValue]) -> Result<MethodOutcome> + Send + Sync + 'static,
    ) -> Self {
        Method { min_params, max_params, handler: Box::new(handler) }
    }
}

/// Dispatches `POST` bodies as XML-RPC method calls to a table of
/// named [`Method`]s.
pub struct XmlRpcServlet {
    methods: HashMap<String, Method>,
}

impl XmlRpcServlet {
    pub fn new(methods: HashMap<String, Method>) -> Self {
        XmlRpcServlet { methods }
    }

    fn dispatch(&self, call: &MethodCall) -> MethodResponse {
        let Some(method) = self.methods.get(&call.method_name) else {
            return MethodResponse::Fault(Fault { code: -1, message: format!("no such method: {}", call.method_name) });
        };

        if call.params.len() < method.min_params || call.params.len() > method.max_params {
            return MethodResponse::Fault(Fault {
                code: -2,
                message: format!(
                    "{} expects {}..={} params, got {}",
                    call.method_name,
                    method.min_params,
                    method.max_params,
                    call.params.len()
                ),
            });
        }

        match (method.handler)(&call.params) {
            Ok(MethodOutcome::Value(v)) => MethodResponse::Success(vec![v]),
            Ok(MethodOutcome::Params(vs)) => MethodResponse::Success(vs),
            Ok(MethodOutcome::Fault(f)) => MethodResponse::Fault(f),
            Err(e) => MethodResponse::Fault(Fault { code: -3, message: e.to_string() }),
        }
    }
}

impl Servlet for XmlRpcServlet {
    fn run(&self, req: &Request, resp: &mut Response) -> Result<Outcome> {
        let content_type = req.header("Content-Type").unwrap_or("");
        if req.method != "POST" || !content_type.starts_with("text/xml") && !content_type.starts_with("application/xml") {
            return Ok(Outcome::Continue);
        }

        let body = std::str::from_utf8(req.body.as_bytes()).map_err(|_| Error::parse("xmlrpc", "non-UTF8 body"))?;
        let call = xmlrpc::decode_call(body)?;
        let response = self.dispatch(&call);
        let rendered = xmlrpc::encode_response(&response)?;

        resp.set_header("Content-Type", "text/xml")?;
        resp.write_body(rendered.as_bytes());
        Ok(Outcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_servlet() -> XmlRpcServlet {
        let mut methods = HashMap::new();
        methods.insert(
            "echo".to_string(),
            Method::new(1, 1, |params| Ok(MethodOutcome::Value(params[0].clone()))),
        );
        methods.insert(
            "sum".to_string(),
            Method::new(0, 8, |params| {
                let total: i32 = params
                    .iter()
                    .map(|p| if let RpcValue::Int(i) = p { *i } else { 0 })
                    .sum();
                Ok(MethodOutcome::Value(RpcValue::Int(total)))
            }),
        );
        XmlRpcServlet::new(methods)
    }

    #[test]
    fn dispatches_to_matching_method() {
        let servlet = echo_servlet();
        let call = MethodCall { method_name: "echo".to_string(), params: vec![RpcValue::String("hi".to_string())] };
        let xml = xmlrpc::encode_call(&call).unwrap();

        let mut req = Request::new("POST", "/rpc");
        req.headers.set("Content-Type", "text/xml");
        req.body = crate::http::message::Body::Buffered(xml.into_bytes());

        let mut resp = Response::ok();
        assert_eq!(servlet.run(&req, &mut resp).unwrap(), Outcome::Handled);
        let response = xmlrpc::decode_response(std::str::from_utf8(resp.body()).unwrap()).unwrap();
        match response {
            MethodResponse::Success(params) => assert_eq!(params, vec![RpcValue::String("hi".to_string())]),
            MethodResponse::Fault(f) => panic!("unexpected fault: {f:?}"),
        }
    }

    #[test]
    fn unknown_method_returns_fault() {
        let servlet = echo_servlet();
        let call = MethodCall { method_name: "nope".to_string(), params: vec![] };
        let xml = xmlrpc::encode_call(&call).unwrap();
        let mut req = Request::new("POST", "/rpc");
        req.headers.set("Content-Type", "text/xml");
        req.body = crate::http::message::Body::Buffered(xml.into_bytes());
        let mut resp = Response::ok();
        servlet.run(&req, &mut resp).unwrap();
        let response = xmlrpc::decode_response(std::str::from_utf8(resp.body()).unwrap()).unwrap();
        assert!(matches!(response, MethodResponse::Fault(_)));
    }

    #[test]
    fn param_count_out_of_range_returns_fault() {
        let servlet = echo_servlet();
        let call = MethodCall {
            method_name: "echo".to_string(),
            params: vec![RpcValue::String("a".to_string()), RpcValue::String("b".to_string())],
        };
        let xml = xmlrpc::encode_call(&call).unwrap();
        let mut req = Request::new("POST", "/rpc");
        req.headers.set("Content-Type", "text/xml");
        req.body = crate::http::message::Body::Buffered(xml.into_bytes());
        let mut resp = Response::ok();
        servlet.run(&req, &mut resp).unwrap();
        let response = xmlrpc::decode_response(std::str::from_utf8(resp.body()).unwrap()).unwrap();
        assert!(matches!(response, MethodResponse::Fault(_)));
    }
}
