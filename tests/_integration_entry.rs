// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cross-module integration tests, one file per scenario from the
//! "concrete end-to-end scenarios" list: app-config load/apply,
//! HTTP client keep-alive reuse, XML-RPC method dispatch, cookie-auth
//! validation, and log-channel dedup.

#[path = "integration/cookie_auth.rs"]
mod cookie_auth;
#[path = "integration/http_keepalive.rs"]
mod http_keepalive;
#[path = "integration/log_dedup.rs"]
mod log_dedup;
#[path = "integration/xmlrpc_dispatch.rs"]
mod xmlrpc_dispatch;
