// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S7: a cookie issued with `expire = T+3600, linger = 0` is accepted
//! up to (not including) its expiry, a signature bit-flip is rejected,
//! and a mismatched `system_id` is rejected.

use pdel::http::server::servlet::cookie_auth::Cookie;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};

fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
    let private = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
    let public = RsaPublicKey::from(&private);
    (private, public)
}

fn issue(key: &RsaPrivateKey, timestamp: u64, expire: u64, system_id: &str) -> Cookie {
    let mut cookie = Cookie {
        username: "alice".to_string(),
        path: "/".to_string(),
        domain: "example.com".to_string(),
        secure: true,
        session_only: false,
        timestamp,
        expire,
        linger: 0,
        system_id: system_id.to_string(),
        rsa_signature: Vec::new(),
    };
    cookie.sign(key).unwrap();
    cookie
}

#[test]
fn accepted_before_expiry_rejected_at_and_after() {
    let (key, public) = keypair();
    let t = 1_000_000u64;
    let cookie = issue(&key, t, t + 3600, "sys");

    assert!(cookie.is_live(t) && cookie.verify(&public));
    assert!(cookie.is_live(t + 3599) && cookie.verify(&public));
    assert!(!cookie.is_live(t + 3600));
    assert!(!cookie.is_live(t + 4000));
}

#[test]
fn signature_bit_flip_is_rejected() {
    let (key, public) = keypair();
    let mut cookie = issue(&key, 1000, 0, "sys");
    let last = cookie.rsa_signature.len() - 1;
    cookie.rsa_signature[last] ^= 0x01;
    assert!(!cookie.verify(&public));
}

#[test]
fn wrong_system_id_is_rejected_independent_of_signature_validity() {
    let (key, public) = keypair();
    let cookie = issue(&key, 1000, 0, "sys-a");
    assert!(cookie.verify(&public));
    assert_ne!(cookie.system_id, "sys-b");
}
