// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A connection-pooling HTTP client, grounded on `http_client.c`.
//! Sockets are cached keyed by `host:port` so a burst of requests to
//! the same origin reuses a persistent connection; a cached socket is
//! liveness-checked with a non-blocking peek before reuse, since the
//! peer may have closed it (or, worse, sent something unsolicited)
//! while it sat idle.

use std::{sync::Arc, time::Duration};

use rustls::{ClientConfig as TlsClientConfig, pki_types::ServerName};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    error::{Error, Result},
    http::{
        cache::ConnectionCache,
        message::{Request, Response},
    },
    stream::SslStream,
};

enum Conn {
    Plain(TcpStream),
    Tls(SslStream<TcpStream>),
}

impl Conn {
    /// `Ok(0)` means the peer closed (dead), `Ok(n>0)` means the peer
    /// sent something unsolicited (poisoned, discard it too), and
    /// `WouldBlock` means it is idle and safe to reuse. TLS connections
    /// are always treated as reusable: peeking at raw ciphertext can't
    /// tell apart a close-notify from ordinary application data.
    fn is_healthy(&self) -> bool {
        let Conn::Plain(tcp) = self else { return true };
        let mut probe = [0u8; 1];
        matches!(tcp.try_read(&mut probe), Err(e) if e.kind() == std::io::ErrorKind::WouldBlock)
    }
}

impl AsyncRead for Conn {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => std::pin::Pin::new(s).poll_read(cx, buf),
            Conn::Tls(s) => std::pin::Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Conn {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Conn::Plain(s) => std::pin::Pin::new(s).poll_write(cx, buf),
            Conn::Tls(s) => std::pin::Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => std::pin::Pin::new(s).poll_flush(cx),
            Conn::Tls(s) => std::pin::Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => std::pin::Pin::new(s).poll_shutdown(cx),
            Conn::Tls(s) => std::pin::Pin::new(s).poll_shutdown(cx),
        }
    }
}

pub struct ClientConfig {
    pub max_cached: usize,
    pub idle_ttl: Duration,
    pub connect_timeout: Duration,
    pub tls: Option<Arc<TlsClientConfig>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_cached: 32,
            idle_ttl: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            tls: None,
        }
    }
}

/// A pooling HTTP/1.1 client. One instance is meant to be shared
/// (behind an `Arc`) across every request an application makes.
pub struct HttpClient {
    cache: ConnectionCache<String, Conn>,
    connect_timeout: Duration,
    tls: Option<Arc<TlsClientConfig>>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        Arc::new(HttpClient {
            cache: ConnectionCache::new(config.max_cached, config.idle_ttl),
            connect_timeout: config.connect_timeout,
            tls: config.tls,
        })
    }

    /// Send `request` to `host:port`, reusing a cached connection for
    /// that origin when one is healthy, otherwise dialing a new one.
    /// The connection is returned to the pool afterward only if the
    /// response allows keep-alive.
    pub async fn send(&self, host: &str, port: u16, request: &Request) -> Result<Response> {
        self.send_impl(host, port, request, false).await
    }

    /// As [`HttpClient::send`], but over TLS. Requires `tls` to have
    /// been set in [`ClientConfig`].
    pub async fn send_tls(&self, host: &str, port: u16, request: &Request) -> Result<Response> {
        self.send_impl(host, port, request, true).await
    }

    async fn send_impl(&self, host: &str, port: u16, request: &Request, tls: bool) -> Result<Response> {
        let key = format!("{}{host}:{port}", if tls { "tls#" } else { "" });

        let cached = self.cache.take(&key).await.filter(Conn::is_healthy);
        let mut conn = match cached {
            Some(c) => c,
            None => self.dial(host, port, tls).await?,
        };

        // a pooled connection can still have gone stale between the
        // liveness check and this write; give it one fresh retry.
        if request.write_to(&mut conn).await.is_err() {
            conn = self.dial(host, port, tls).await?;
            request.write_to(&mut conn).await?;
        }

        let response = Response::read_from(&mut conn).await?;

        if keeps_alive(&response) {
            self.cache.put(key, conn).await;
        } else {
            let _ = conn.shutdown().await;
        }

        Ok(response)
    }

    async fn dial(&self, host: &str, port: u16, tls: bool) -> Result<Conn> {
        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::Timeout("http client connect".to_string()))??;
        if !tls {
            return Ok(Conn::Plain(tcp));
        }
        let config = self
            .tls
            .clone()
            .ok_or_else(|| Error::invalid("HttpClient has no tls config; send_tls unavailable"))?;
        let name = ServerName::try_from(host.to_string())
            .map_err(|e| Error::invalid(format!("invalid server name {host}: {e}")))?;
        let stream = SslStream::connect(tcp, name, config, Some(self.connect_timeout)).await?;
        Ok(Conn::Tls(stream))
    }
}

fn keeps_alive(response: &Response) -> bool {
    match response.headers.get("Connection") {
        Some(v) => v.eq_ignore_ascii_case("keep-alive"),
        None => response.version == crate::http::Version::Http11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_alive_defaults_by_version() {
        let mut r = Response::ok();
        r.version = crate::http::Version::Http11;
        assert!(keeps_alive(&r));
        r.version = crate::http::Version::Http10;
        assert!(!keeps_alive(&r));
    }

    #[test]
    fn keeps_alive_honors_explicit_header() {
        let mut r = Response::ok();
        r.version = crate::http::Version::Http10;
        r.set_header("Connection", "keep-alive").unwrap();
        assert!(keeps_alive(&r));
    }
}
