// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Stream filters and the TLS wrapper, grounded on `io/filter.h` and
//! `io/ssl_fp.h`.
//!
//! A [`Filter`] sits between a caller and an underlying byte stream,
//! transcoding data as it passes through (base64, length bounds,
//! multipart boundaries). [`ssl::SslStream`] wraps an async stream with
//! TLS via `rustls`/`tokio-rustls`.

mod base64_filter;
mod bounded;
mod filter;
mod multipart;
pub mod ssl;

pub use base64_filter::Base64Filter;
pub use bounded::BoundedReader;
pub use filter::{Filter, IdentityFilter};
pub use multipart::MultipartReader;
pub use ssl::SslStream;
