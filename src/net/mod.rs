// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded-concurrency connection-serving fabric, modeled on
//! `tcp_server(3)`/`domain_server(3)`: one [`Acceptor`] trait covers
//! both TCP and UNIX-domain listeners, a `Server` runs the accept loop
//! with 250ms backpressure once `max_conn` is reached, and each
//! accepted connection gets an independent setup/handler/teardown
//! lifecycle.

mod acceptor;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub use acceptor::{PeerAddr, TcpAcceptor};
#[cfg(unix)]
pub use acceptor::UnixAcceptor;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::log::{self, Severity};

/// Accept-side backpressure pause, matching `TCP_SERVER_PAUSE` (250ms).
const ACCEPT_PAUSE: Duration = Duration::from_millis(250);

/// A listener `Server` can accept connections from.
pub trait Acceptor: Send + Sync + 'static {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> Pin<Box<dyn Future<Output = std::io::Result<(Self::Conn, PeerAddr)>> + Send + '_>>;
}

pub struct ServerConfig {
    /// 0 means unbounded.
    pub max_conn: usize,
    pub conn_timeout: Option<Duration>,
    /// Channel index handler/teardown failures are logged to.
    pub log_channel: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { max_conn: 0, conn_timeout: None, log_channel: 0 }
    }
}

/// A running server. Dropping this handle does not stop the server;
/// call [`Server::stop`] explicitly, matching `tcp_server_stop`'s
/// requirement that shutdown be a deliberate act.
pub struct Server {
    cancel: CancellationToken,
    accept_task: tokio::task::JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Start serving `acceptor`. `setup` runs synchronously right
    /// after accept and decides whether the connection proceeds at
    /// all (returning `None` drops it without calling `handler` or
    /// `teardown`, mirroring a `NULL` cookie). `handler` does the
    /// connection's actual work, borrowing the cookie rather than
    /// consuming it, so the cookie is still available for `teardown`
    /// afterward; `teardown` always runs if `setup` succeeded, even if
    /// `handler` times out.
    pub fn start<A, C, Setup, Handler, Teardown>(
        acceptor: A,
        config: ServerConfig,
        setup: Setup,
        handler: Handler,
        teardown: Teardown,
    ) -> Server
    where
        A: Acceptor,
        C: Send + 'static,
        Setup: Fn(&A::Conn, &PeerAddr) -> Option<C> + Send + Sync + 'static,
        Handler: for<'c> Fn(A::Conn, &'c C) -> Pin<Box<dyn Future<Output = ()> + Send + 'c>> + Send + Sync + 'static,
        Teardown: Fn(C) + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let acceptor = Arc::new(acceptor);
        let setup = Arc::new(setup);
        let handler = Arc::new(handler);
        let teardown = Arc::new(teardown);

        let accept_cancel = cancel.clone();
        let accept_active = active.clone();
        let log_channel = config.log_channel;

        let accept_task = tokio::spawn(async move {
            loop {
                if config.max_conn > 0 && accept_active.load(Ordering::Acquire) >= config.max_conn {
                    tokio::select! {
                        _ = accept_cancel.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_PAUSE) => continue,
                    }
                }

                let accepted = tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    r = acceptor.accept() => r,
                };

                let (conn, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::log_to(log_channel, Severity::Warning, format!("accept failed: {e}"));
                        continue;
                    },
                };

                accept_active.fetch_add(1, Ordering::AcqRel);
                let active = accept_active.clone();
                let setup = setup.clone();
                let handler = handler.clone();
                let teardown = teardown.clone();
                let timeout = config.conn_timeout;

                tokio::spawn(async move {
                    let Some(cookie) = setup(&conn, &peer) else {
                        active.fetch_sub(1, Ordering::AcqRel);
                        return;
                    };

                    let run = handler(conn, &cookie);
                    let outcome = match timeout {
                        Some(d) => tokio::time::timeout(d, run).await,
                        None => Ok(run.await),
                    };
                    if outcome.is_err() {
                        log::log_to(log_channel, Severity::Warning, "connection handler timed out");
                    }
                    teardown(cookie);
                    active.fetch_sub(1, Ordering::AcqRel);
                });
            }
        });

        Server { cancel, accept_task, active }
    }

    /// Current number of in-flight connections.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Stop accepting new connections and wait for the accept loop to
    /// exit. In-flight connection tasks are not forcibly cancelled —
    /// they run to completion (or `conn_timeout`) independently.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.accept_task.await;
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::net::TcpStream;

    use super::*;

    #[tokio::test]
    async fn serves_one_connection_end_to_end() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let local_addr = acceptor.local_addr().unwrap();

        let handled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handled2 = handled.clone();
        let torn_down = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let torn_down2 = torn_down.clone();

        let server = Server::start(
            acceptor,
            ServerConfig::default(),
            |_conn, _peer| Some(()),
            move |_conn, _cookie: &()| {
                let handled2 = handled2.clone();
                Box::pin(async move {
                    handled2.store(true, Ordering::SeqCst);
                })
            },
            move |_cookie| {
                torn_down2.store(true, Ordering::SeqCst);
            },
        );

        let addr: SocketAddr = local_addr;
        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(handled.load(Ordering::SeqCst));
        assert!(torn_down.load(Ordering::SeqCst));
        server.stop().await;
    }

    #[tokio::test]
    async fn setup_returning_none_skips_handler() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let local_addr = acceptor.local_addr().unwrap();
        let handled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handled2 = handled.clone();

        let server = Server::start(
            acceptor,
            ServerConfig::default(),
            |_conn, _peer| None::<()>,
            move |_conn, _cookie: &()| {
                let handled2 = handled2.clone();
                Box::pin(async move {
                    handled2.store(true, Ordering::SeqCst);
                })
            },
            |_cookie| {},
        );

        let _client = TcpStream::connect(local_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handled.load(Ordering::SeqCst));
        server.stop().await;
    }
}
