// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Concrete [`super::Acceptor`] implementations for TCP and UNIX-domain
//! listeners, grounded on `tcp_server.c`/`domain_server.c`.

use std::{future::Future, io, net::SocketAddr, pin::Pin};

use tokio::net::{TcpListener, TcpStream};

use super::Acceptor;

/// Where a connection came from.
#[derive(Clone, Debug)]
pub enum PeerAddr {
    Inet(SocketAddr),
    #[cfg(unix)]
    Unix(Option<std::path::PathBuf>),
}

pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
        Ok(TcpAcceptor { listener: TcpListener::bind(addr).await? })
    }

    pub fn from_std(listener: std::net::TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(TcpAcceptor { listener: TcpListener::from_std(listener)? })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Acceptor for TcpAcceptor {
    type Conn = TcpStream;

    fn accept(&self) -> Pin<Box<dyn Future<Output = io::Result<(TcpStream, PeerAddr)>> + Send + '_>> {
        Box::pin(async move {
            let (stream, addr) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            Ok((stream, PeerAddr::Inet(addr)))
        })
    }
}

#[cfg(unix)]
pub struct UnixAcceptor {
    listener: tokio::net::UnixListener,
}

#[cfg(unix)]
impl UnixAcceptor {
    pub fn bind(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        Ok(UnixAcceptor { listener: tokio::net::UnixListener::bind(path)? })
    }
}

#[cfg(unix)]
impl Acceptor for UnixAcceptor {
    type Conn = tokio::net::UnixStream;

    fn accept(
        &self,
    ) -> Pin<Box<dyn Future<Output = io::Result<(tokio::net::UnixStream, PeerAddr)>> + Send + '_>> {
        Box::pin(async move {
            let (stream, addr) = self.listener.accept().await?;
            Ok((stream, PeerAddr::Unix(addr.as_pathname().map(|p| p.to_path_buf()))))
        })
    }
}
