// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S4: with a warm, non-full cache, two sequential requests to the
//! same origin share one TCP connection when the server advertises
//! keep-alive.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use pdel::http::{
    client::{ClientConfig, HttpClient},
    message::Request,
};
use tokio::net::TcpListener;

#[tokio::test]
async fn two_requests_reuse_one_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let accepts2 = accepts.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut conn, _)) = listener.accept().await else { return };
            accepts2.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                loop {
                    let req = match pdel::http::message::Request::read_from(&mut conn).await {
                        Ok(r) => r,
                        Err(_) => return,
                    };
                    let mut resp = pdel::http::message::Response::ok();
                    resp.set_header("Connection", "keep-alive").unwrap();
                    resp.write_body(req.path().as_bytes());
                    if resp.write_to(&mut conn).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    let client = HttpClient::new(ClientConfig { max_cached: 4, ..ClientConfig::default() });

    let r1 = client.send(&addr.ip().to_string(), addr.port(), &Request::new("GET", "/one")).await.unwrap();
    assert_eq!(r1.body(), b"/one");
    let r2 = client.send(&addr.ip().to_string(), addr.port(), &Request::new("GET", "/two")).await.unwrap();
    assert_eq!(r2.body(), b"/two");

    assert_eq!(accepts.load(Ordering::SeqCst), 1, "second request should reuse the pooled connection");
}
