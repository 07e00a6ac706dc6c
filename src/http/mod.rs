// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP message model, client with pooled connections
//! (`http_client.c`/`http_connection_cache.c`), and server with a
//! servlet routing table.

pub mod cache;
pub mod client;
pub mod message;
pub mod server;

pub use message::{Body, HeaderMap, Request, Response, Version};
