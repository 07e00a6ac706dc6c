// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A minimal `mesg_port(3)`-style byte-message queue, usable both as a
//! [`super::Source::MessagePort`] event source and directly by callers
//! that just want a cheap inter-task mailbox.

use tokio::sync::Mutex;

/// An unbounded FIFO queue of opaque byte messages with an async
/// `recv`. `send` never blocks; callers that need backpressure should
/// bound the number of outstanding messages themselves.
pub struct MessagePort {
    inner: Mutex<Inner>,
    notify: tokio::sync::Notify,
}

struct Inner {
    queue: std::collections::VecDeque<Vec<u8>>,
}

impl Default for MessagePort {
    fn default() -> Self {
        MessagePort { inner: Mutex::new(Inner { queue: std::collections::VecDeque::new() }), notify: tokio::sync::Notify::new() }
    }
}

impl MessagePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn send(&self, message: Vec<u8>) {
        self.inner.lock().await.queue.push_back(message);
        self.notify.notify_one();
    }

    /// Wait for and pop the next message.
    pub async fn recv(&self) -> Vec<u8> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(msg) = inner.queue.pop_front() {
                    return msg;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_recv() {
        let port = MessagePort::new();
        port.send(b"hello".to_vec()).await;
        assert_eq!(port.recv().await, b"hello".to_vec());
    }

    #[tokio::test]
    async fn recv_waits_for_send() {
        let port = std::sync::Arc::new(MessagePort::new());
        let port2 = port.clone();
        let handle = tokio::spawn(async move { port2.recv().await });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        port.send(b"later".to_vec()).await;
        assert_eq!(handle.await.unwrap(), b"later".to_vec());
    }
}
