// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A systems utility library: typed structural values, a versioned
//! app-config engine, an event loop, and an HTTP client/server stack.

/// Debug-only tagged allocation accounting.
pub mod alloc;
/// The versioned application-configuration engine and its built-in
/// subsystems.
pub mod app_config;
/// Command-line parsing and process diagnostic logging bootstrap.
pub mod cfg;
/// XML and XML-RPC structural codecs.
pub mod codec;
/// Crate-wide error type.
pub mod error;
/// HTTP client and server.
pub mod http;
/// Severity-filtered, deduplicating logging channels.
pub mod log;
/// Bounded-concurrency connection-serving fabric.
pub mod net;
/// Event-driven concurrency substrate.
pub mod pevent;
/// Reflective structural types: schemas and values.
pub mod structs;
/// Stream filters (base64, bounded reads, multipart, TLS).
pub mod stream;

pub use error::{Error, Result};
