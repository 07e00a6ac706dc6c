// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Debug-only tagged allocation accounting, modeled on the original
//! library's `MALLOC`/`FREE` macros with a `mtype` tag: every tracked
//! allocation is attributed to a named tag, and a running `(live
//! blocks, live bytes)` count is kept per tag for diagnostics.
//!
//! In release builds this degrades to a transparent wrapper with no
//! bookkeeping cost; the counters only exist under `debug_assertions`.

use std::ops::{Deref, DerefMut};

use dashmap::DashMap;
use once_cell::sync::Lazy;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagStats {
    pub live_blocks: u64,
    pub live_bytes: u64,
}

static REGISTRY: Lazy<DashMap<&'static str, TagStats>> = Lazy::new(DashMap::new);

fn track(tag: &'static str, bytes: usize) {
    if cfg!(debug_assertions) {
        let mut entry = REGISTRY.entry(tag).or_default();
        entry.live_blocks += 1;
        entry.live_bytes += bytes as u64;
    }
}

fn untrack(tag: &'static str, bytes: usize) {
    if cfg!(debug_assertions)
        && let Some(mut entry) = REGISTRY.get_mut(tag)
    {
        entry.live_blocks = entry.live_blocks.saturating_sub(1);
        entry.live_bytes = entry.live_bytes.saturating_sub(bytes as u64);
    }
}

/// Current live-allocation stats for `tag`, or zeroes if nothing has
/// been tagged with it yet.
pub fn stats(tag: &'static str) -> TagStats {
    REGISTRY.get(tag).map(|e| *e).unwrap_or_default()
}

/// A value wrapped with a static "allocation tag" for debug-mode
/// tracking. Transparent in every other respect via `Deref`/`DerefMut`.
pub struct Tagged<T> {
    tag: &'static str,
    size: usize,
    value: T,
}

impl<T> Tagged<T> {
    pub fn new(tag: &'static str, value: T) -> Self {
        let size = std::mem::size_of::<T>();
        track(tag, size);
        Tagged { tag, size, value }
    }

    pub fn into_inner(self) -> T {
        // Drop handles untracking; extract the value without running
        // the destructor twice.
        let value = unsafe { std::ptr::read(&self.value) };
        untrack(self.tag, self.size);
        std::mem::forget(self);
        value
    }
}

impl<T> Deref for Tagged<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tagged<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Tagged<T> {
    fn drop(&mut self) {
        untrack(self.tag, self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_and_releases() {
        let before = stats("test.alloc.tracks_and_releases");
        {
            let _v = Tagged::new("test.alloc.tracks_and_releases", vec![0u8; 16]);
            let mid = stats("test.alloc.tracks_and_releases");
            assert_eq!(mid.live_blocks, before.live_blocks + 1);
        }
        let after = stats("test.alloc.tracks_and_releases");
        assert_eq!(after.live_blocks, before.live_blocks);
    }

    #[test]
    fn into_inner_releases_without_double_counting() {
        let before = stats("test.alloc.into_inner");
        let tagged = Tagged::new("test.alloc.into_inner", 42u32);
        let v = tagged.into_inner();
        assert_eq!(v, 42);
        let after = stats("test.alloc.into_inner");
        assert_eq!(after.live_blocks, before.live_blocks);
    }
}
