// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S5: an `arrayOfStructsTest`-style method summing a struct field
//! across an array parameter. S9: a fault reply carries the handler's
//! literal `faultCode`/`faultString`.

use std::collections::HashMap;

use pdel::{
    codec::xmlrpc::{self, Fault, MethodCall, MethodResponse, Value as RpcValue},
    http::{
        Body, Request, Response,
        server::servlet::{
            Servlet,
            xmlrpc::{Method, MethodOutcome, XmlRpcServlet},
        },
    },
};

fn struct_field(v: &RpcValue, name: &str) -> i32 {
    let RpcValue::Struct(members) = v else { panic!("expected struct") };
    for (k, val) in members {
        if k == name {
            if let RpcValue::Int(i) = val {
                return *i;
            }
        }
    }
    panic!("missing field {name}")
}

fn post_call(servlet: &dyn Servlet, call: &MethodCall) -> MethodResponse {
    let xml = xmlrpc::encode_call(call).unwrap();
    let mut req = Request::new("POST", "/rpc");
    req.headers.set("Content-Type", "text/xml");
    req.body = Body::Buffered(xml.into_bytes());
    let mut resp = Response::ok();
    servlet.run(&req, &mut resp).unwrap();
    xmlrpc::decode_response(std::str::from_utf8(resp.body()).unwrap()).unwrap()
}

#[tokio::test]
async fn array_of_structs_sums_curly_field() {
    let mut methods = HashMap::new();
    methods.insert(
        "arrayOfStructsTest".to_string(),
        Method::new(1, 1, |params| {
            let RpcValue::Array(items) = &params[0] else { panic!("expected array") };
            let total: i32 = items.iter().map(|s| struct_field(s, "curly")).sum();
            Ok(MethodOutcome::Value(RpcValue::Int(total)))
        }),
    );
    let servlet = XmlRpcServlet::new(methods);

    let array = RpcValue::Array(vec![
        RpcValue::Struct(vec![
            ("moe".to_string(), RpcValue::Int(1)),
            ("larry".to_string(), RpcValue::Int(2)),
            ("curly".to_string(), RpcValue::Int(3)),
        ]),
        RpcValue::Struct(vec![
            ("moe".to_string(), RpcValue::Int(4)),
            ("larry".to_string(), RpcValue::Int(5)),
            ("curly".to_string(), RpcValue::Int(6)),
        ]),
    ]);
    let call = MethodCall { method_name: "arrayOfStructsTest".to_string(), params: vec![array] };

    let response = post_call(&servlet, &call);
    assert_eq!(response, MethodResponse::Success(vec![RpcValue::Int(9)]));
}

#[tokio::test]
async fn handler_fault_carries_literal_code_and_message() {
    let mut methods = HashMap::new();
    methods.insert(
        "explode".to_string(),
        Method::new(0, 0, |_| {
            Ok(MethodOutcome::Fault(Fault { code: 4, message: "too many secrets".to_string() }))
        }),
    );
    let servlet = XmlRpcServlet::new(methods);
    let call = MethodCall { method_name: "explode".to_string(), params: vec![] };

    let response = post_call(&servlet, &call);
    assert_eq!(response, MethodResponse::Fault(Fault { code: 4, message: "too many secrets".to_string() }));
}
