// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A reader that returns EOF after a fixed number of bytes, regardless
//! of how much more the underlying stream has to offer.

use std::pin::Pin;

use tokio::io::{AsyncRead, ReadBuf};

/// Wraps `inner` and limits total bytes read to `limit`, independent
/// of `inner`'s own length. Used to bound a servlet body read to a
/// `Content-Length` value without consuming past it.
pub struct BoundedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R> BoundedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        BoundedReader { inner, remaining: limit }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BoundedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        if self.remaining == 0 {
            return std::task::Poll::Ready(Ok(()));
        }
        let max = self.remaining.min(buf.remaining() as u64) as usize;
        let mut limited = buf.take(max);
        match Pin::new(&mut self.inner).poll_read(cx, &mut limited) {
            std::task::Poll::Ready(Ok(())) => {
                let read = limited.filled().len();
                buf.advance(read);
                self.remaining -= read as u64;
                std::task::Poll::Ready(Ok(()))
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn stops_at_limit_even_with_more_data() {
        let data: &[u8] = b"0123456789";
        let mut reader = BoundedReader::new(data, 4);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123");
    }

    #[tokio::test]
    async fn passes_through_short_data_unchanged() {
        let data: &[u8] = b"ab";
        let mut reader = BoundedReader::new(data, 10);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"ab");
    }
}
