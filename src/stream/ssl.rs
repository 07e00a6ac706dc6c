// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! TLS stream wrapper, grounded on `io/ssl_fp.h`'s `ssl_stream`: drives
//! the handshake with an idle timeout and performs a graceful shutdown
//! on close. Uses `rustls`/`tokio-rustls` rather than the original's
//! OpenSSL binding, matching this crate's pure-Rust TLS stack.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use rustls::{ClientConfig, ServerConfig, pki_types::ServerName};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::{TlsAcceptor, TlsConnector, client, server};

use crate::error::{Error, Result};

/// Either side of an established TLS connection.
pub enum SslStream<S> {
    Client(client::TlsStream<S>),
    Server(server::TlsStream<S>),
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> SslStream<S> {
    /// Perform the client-side handshake, bounded by `timeout` (no
    /// bound if `None`). Translates handshake errors and a timeout
    /// into [`Error::Timeout`]/[`Error::Io`], matching `ssl_stream`'s
    /// poll-with-idle-timeout behavior.
    pub async fn connect(
        stream: S,
        server_name: ServerName<'static>,
        config: Arc<ClientConfig>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let connector = TlsConnector::from(config);
        let handshake = connector.connect(server_name, stream);
        let tls = match timeout {
            Some(d) => tokio::time::timeout(d, handshake)
                .await
                .map_err(|_| Error::Timeout("tls client handshake".to_string()))??,
            None => handshake.await?,
        };
        Ok(SslStream::Client(tls))
    }

    /// Perform the server-side handshake, bounded by `timeout`.
    pub async fn accept(stream: S, config: Arc<ServerConfig>, timeout: Option<Duration>) -> Result<Self> {
        let acceptor = TlsAcceptor::from(config);
        let handshake = acceptor.accept(stream);
        let tls = match timeout {
            Some(d) => tokio::time::timeout(d, handshake)
                .await
                .map_err(|_| Error::Timeout("tls server handshake".to_string()))??,
            None => handshake.await?,
        };
        Ok(SslStream::Server(tls))
    }

    /// Idempotent graceful close: performs the TLS `close_notify`
    /// shutdown, then lets the underlying stream close as it drops.
    pub async fn close(&mut self) -> Result<()> {
        match self {
            SslStream::Client(s) => tokio::io::AsyncWriteExt::shutdown(s).await?,
            SslStream::Server(s) => tokio::io::AsyncWriteExt::shutdown(s).await?,
        }
        Ok(())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for SslStream<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SslStream::Client(s) => Pin::new(s).poll_read(cx, buf),
            SslStream::Server(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for SslStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SslStream::Client(s) => Pin::new(s).poll_write(cx, buf),
            SslStream::Server(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SslStream::Client(s) => Pin::new(s).poll_flush(cx),
            SslStream::Server(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SslStream::Client(s) => Pin::new(s).poll_shutdown(cx),
            SslStream::Server(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
