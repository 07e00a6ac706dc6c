// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Event-driven concurrency substrate, modeled on `pevent(3)`.
//!
//! A [`Context`] owns a set of registered events. Each event watches
//! one [`Source`] (a readiness future, a timer, a message port, or a
//! manually [`PEvent::trigger`]-ed user event), runs its handler under
//! a caller-supplied mutex, and is either one-shot or [`Flags::RECURRING`].
//! [`Flags::OWN_THREAD`] events run on a dedicated blocking thread
//! instead of the shared task pool, mirroring the original library's
//! distinction between events multiplexed on one dispatch thread and
//! events that need their own.

mod message_port;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bitflags::bitflags;
use dashmap::DashMap;
pub use message_port::MessagePort;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u32 {
        const RECURRING  = 0x0001;
        const OWN_THREAD = 0x0002;
    }
}

/// Future returned by a [`ReadinessSource`]'s `wait_ready`.
pub type ReadyFuture<'a> = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>>;

/// Something a `Read`/`Write` event can wait on — typically a socket's
/// `readable()`/`writable()` future. Decoupled from any concrete
/// transport so `pevent` does not depend on [`crate::net`].
pub trait ReadinessSource: Send + Sync {
    fn wait_ready(&self) -> ReadyFuture<'_>;
}

/// What triggers an event's handler.
pub enum Source {
    Read(Arc<dyn ReadinessSource>),
    Write(Arc<dyn ReadinessSource>),
    Timer(Duration),
    MessagePort(Arc<MessagePort>),
    User,
}

impl Source {
    fn type_name(&self) -> &'static str {
        match self {
            Source::Read(_) => "read",
            Source::Write(_) => "write",
            Source::Timer(_) => "timer",
            Source::MessagePort(_) => "mesg_port",
            Source::User => "user",
        }
    }
}

/// Snapshot returned by [`PEvent::info`], analogous to `pevent_get_info`.
#[derive(Debug)]
pub struct Info {
    pub type_name: &'static str,
    pub millis: Option<u64>,
}

struct Registered {
    cancel: CancellationToken,
    join: Option<tokio::task::JoinHandle<()>>,
}

/// An event context: the set of events registered against it share no
/// state with any other context, matching `pevent_ctx_create`'s
/// isolation.
pub struct Context {
    events: DashMap<u64, Registered>,
    next_id: AtomicU64,
}

impl Default for Context {
    fn default() -> Self {
        Context { events: DashMap::new(), next_id: AtomicU64::new(1) }
    }
}

thread_local! {
    static CURRENT_EVENT: std::cell::Cell<Option<u64>> = const { std::cell::Cell::new(None) };
}

impl Context {
    pub fn new() -> Arc<Context> {
        Arc::new(Context::default())
    }

    /// Number of currently-registered events.
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Register a new event. `handler` runs with `mutex` held for its
    /// duration (mirroring the original's per-handler mutex coupling);
    /// pass a fresh `Arc::new(AsyncMutex::new(()))` if no sharing with
    /// other events is needed.
    pub fn register<F>(
        self: &Arc<Self>,
        flags: Flags,
        mutex: Arc<AsyncMutex<()>>,
        source: Source,
        handler: F,
    ) -> Result<PEvent>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let trigger = Arc::new(Notify::new());
        let type_name = source.type_name();
        let millis = match &source {
            Source::Timer(d) => Some(d.as_millis() as u64),
            _ => None,
        };

        let handler = Arc::new(handler);
        let ctx = self.clone();
        let cancel_for_task = cancel.clone();
        let trigger_for_task = trigger.clone();

        let run_once = {
            let mutex = mutex.clone();
            let handler = handler.clone();
            move |id: u64| {
                let mutex = mutex.clone();
                let handler = handler.clone();
                async move {
                    let _guard = mutex.lock().await;
                    CURRENT_EVENT.with(|c| c.set(Some(id)));
                    handler();
                    CURRENT_EVENT.with(|c| c.set(None));
                }
            }
        };

        let body = async move {
            loop {
                let wait: Pin<Box<dyn Future<Output = ()> + Send>> = match &source {
                    Source::Read(r) => {
                        let r = r.clone();
                        Box::pin(async move {
                            let _ = r.wait_ready().await;
                        })
                    },
                    Source::Write(w) => {
                        let w = w.clone();
                        Box::pin(async move {
                            let _ = w.wait_ready().await;
                        })
                    },
                    Source::Timer(d) => {
                        let d = *d;
                        Box::pin(tokio::time::sleep(d))
                    },
                    Source::MessagePort(p) => {
                        let p = p.clone();
                        Box::pin(async move {
                            p.recv().await;
                        })
                    },
                    Source::User => {
                        let n = trigger_for_task.clone();
                        Box::pin(async move {
                            n.notified().await;
                        })
                    },
                };

                tokio::select! {
                    _ = cancel_for_task.cancelled() => break,
                    _ = wait => {
                        run_once(id).await;
                        if !flags.contains(Flags::RECURRING) {
                            break;
                        }
                    }
                }
            }
            ctx.events.remove(&id);
        };

        let join = if flags.contains(Flags::OWN_THREAD) {
            Some(tokio::task::spawn_blocking(move || {
                tokio::runtime::Handle::current().block_on(body);
            }))
        } else {
            Some(tokio::spawn(body))
        };

        self.events.insert(id, Registered { cancel: cancel.clone(), join });

        Ok(PEvent { ctx: self.clone(), id, cancel, trigger, type_name, millis })
    }
}

/// A handle to one registered event.
pub struct PEvent {
    ctx: Arc<Context>,
    id: u64,
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    type_name: &'static str,
    millis: Option<u64>,
}

impl PEvent {
    /// Fire a `Source::User` event's waiter.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn info(&self) -> Info {
        Info { type_name: self.type_name, millis: self.millis }
    }

    /// Unregister the event.
    ///
    /// - If the event is not currently running its handler, it is
    ///   removed immediately.
    /// - If called from *within* the event's own handler, returns
    ///   immediately without blocking (the task cannot join itself).
    /// - Otherwise blocks until the currently-running handler, if any,
    ///   completes.
    pub async fn unregister(self) -> Result<()> {
        self.cancel.cancel();
        let reentrant = CURRENT_EVENT.with(|c| c.get() == Some(self.id));
        if reentrant {
            return Ok(());
        }
        if let Some(mut entry) = self.ctx.events.get_mut(&self.id)
            && let Some(join) = entry.join.take()
        {
            drop(entry);
            let _ = join.await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PEvent").field("id", &self.id).field("type", &self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn timer_event_fires_and_recurs() {
        let ctx = Context::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();
        let ev = ctx
            .register(
                Flags::RECURRING,
                Arc::new(AsyncMutex::new(())),
                Source::Timer(Duration::from_millis(5)),
                move || {
                    count2.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);
        ev.unregister().await.unwrap();
    }

    #[tokio::test]
    async fn user_event_only_fires_on_trigger() {
        let ctx = Context::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        let ev = ctx
            .register(Flags::empty(), Arc::new(AsyncMutex::new(())), Source::User, move || {
                fired2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        ev.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent_in_shape() {
        let ctx = Context::new();
        let ev = ctx
            .register(Flags::empty(), Arc::new(AsyncMutex::new(())), Source::User, || {})
            .unwrap();
        assert_eq!(ctx.count(), 1);
        ev.unregister().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(ctx.count(), 0);
    }
}
