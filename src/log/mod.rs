// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logging channels: severity-filtered, deduplicating message sinks.
//!
//! Mirrors the `alog(3)` API: up to [`MAX_CHANNELS`] independently
//! configured channels, each with a minimum severity, a sink (stderr,
//! local syslog, remote syslog, or an in-memory ring history), and a
//! "last message" dedup state that collapses runs of identical
//! messages into a single "last message repeated N times" line.
//!
//! This is a library-level logging facade distinct from the process
//! diagnostic stream set up by [`crate::cfg::logger`]; applications
//! built on this crate log business events through here, the way the
//! original C library's callers used `alog()` independently of
//! whatever `syslog.conf` did with the output.

mod dedup;
mod sink;

use std::sync::Mutex;

use once_cell::sync::Lazy;

pub use sink::Sink;

use crate::error::{Error, Result};

pub const MAX_CHANNELS: usize = 16;

/// Severities, ordered least to most severe — matches syslog's scale
/// with `Debug` standing in for `LOG_DEBUG` (most verbose, sorts last).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }

    pub fn from_name(name: &str) -> Option<Severity> {
        Some(match name {
            "emerg" => Severity::Emergency,
            "alert" => Severity::Alert,
            "crit" => Severity::Critical,
            "err" | "error" => Severity::Error,
            "warning" | "warn" => Severity::Warning,
            "notice" => Severity::Notice,
            "info" => Severity::Info,
            "debug" => Severity::Debug,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub when: chrono::DateTime<chrono::Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Configuration for one channel, analogous to `struct alog_config`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    pub sink: Sink,
    pub min_severity: Severity,
    /// Number of entries retained in the in-memory history ring,
    /// regardless of `sink` (history is independent of where the
    /// message is additionally written).
    pub history_len: usize,
    /// When set, everything logged is *also* written to stderr.
    pub debug: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            sink: Sink::Null,
            min_severity: Severity::Info,
            history_len: 0,
            debug: false,
        }
    }
}

struct ChannelState {
    config: ChannelConfig,
    dedup: dedup::Dedup,
    history: std::collections::VecDeque<HistoryEntry>,
}

impl ChannelState {
    fn new(config: ChannelConfig) -> Self {
        ChannelState { config, dedup: dedup::Dedup::new(), history: std::collections::VecDeque::new() }
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() >= self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    fn emit(&mut self, severity: Severity, message: &str, now: chrono::DateTime<chrono::Utc>) {
        self.config.sink.write(severity, message, now);
        if self.config.debug && !matches!(self.config.sink, Sink::Stderr) {
            Sink::Stderr.write(severity, message, now);
        }
        self.push_history(HistoryEntry { when: now, severity, message: message.to_string() });
    }
}

static CHANNELS: Lazy<Mutex<Vec<Option<ChannelState>>>> =
    Lazy::new(|| Mutex::new((0..MAX_CHANNELS).map(|_| None).collect()));

thread_local! {
    static CURRENT: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn check_channel(channel: usize) -> Result<()> {
    if channel >= MAX_CHANNELS {
        Err(Error::Range(format!("channel {channel} >= MAX_CHANNELS ({MAX_CHANNELS})")))
    } else {
        Ok(())
    }
}

/// Initialize or reconfigure a channel.
pub fn configure(channel: usize, config: ChannelConfig) -> Result<()> {
    check_channel(channel)?;
    let mut channels = CHANNELS.lock().unwrap();
    channels[channel] = Some(ChannelState::new(config));
    Ok(())
}

/// Reset a channel to unconfigured.
pub fn shutdown(channel: usize) -> Result<()> {
    check_channel(channel)?;
    CHANNELS.lock().unwrap()[channel] = None;
    Ok(())
}

/// Set the calling thread's active channel for [`log`].
pub fn set_current_channel(channel: usize) -> Result<()> {
    check_channel(channel)?;
    CURRENT.with(|c| c.set(channel));
    Ok(())
}

/// Enable/disable the "also echo to stderr" debug flag on a channel.
pub fn set_debug(channel: usize, enabled: bool) -> Result<()> {
    check_channel(channel)?;
    let mut channels = CHANNELS.lock().unwrap();
    if let Some(state) = channels[channel].as_mut() {
        state.config.debug = enabled;
    }
    Ok(())
}

/// Log `message` to the calling thread's current channel, applying
/// severity filtering and last-message deduplication.
pub fn log(severity: Severity, message: impl Into<String>) {
    let channel = CURRENT.with(|c| c.get());
    log_to(channel, severity, message);
}

/// Log `message` to a specific channel, bypassing the thread-local
/// current-channel selector.
pub fn log_to(channel: usize, severity: Severity, message: impl Into<String>) {
    if channel >= MAX_CHANNELS {
        return;
    }
    let message = message.into();
    let now = chrono::Utc::now();
    let mut channels = CHANNELS.lock().unwrap();
    let Some(state) = channels[channel].as_mut() else {
        return;
    };
    dedup::flush_if_expired(state, now);
    if severity > state.config.min_severity {
        return;
    }
    match dedup::observe(state, &message, severity, now) {
        dedup::Action::WriteNow => state.emit(severity, &message, now),
        dedup::Action::Suppressed => {},
    }
}

/// Flush any pending "repeated N times" summary for `channel`, as if
/// its dedup timer had just expired. Channels should call this before
/// shutting down so a trailing repeat run is not silently lost.
pub fn flush(channel: usize) -> Result<()> {
    check_channel(channel)?;
    let mut channels = CHANNELS.lock().unwrap();
    if let Some(state) = channels[channel].as_mut() {
        dedup::force_flush(state, chrono::Utc::now());
    }
    Ok(())
}

/// Query the in-memory ring history for a channel. A dedup run that
/// hasn't hit its repeat-suppression timeout yet is not in `history`
/// proper; its "last message repeated N times" summary is synthesized
/// here as if it had just been flushed, so callers that read without
/// calling [`flush`] first still see it.
pub fn history(
    channel: usize,
    min_severity: Severity,
    max_entries: usize,
    filter: impl Fn(&str) -> bool,
) -> Result<Vec<HistoryEntry>> {
    check_channel(channel)?;
    let channels = CHANNELS.lock().unwrap();
    let Some(state) = channels[channel].as_ref() else {
        return Ok(Vec::new());
    };
    let pending = dedup::pending_summary(state).into_iter();
    Ok(pending
        .chain(state.history.iter().rev().cloned())
        .filter(|e| e.severity <= min_severity && filter(&e.message))
        .take(max_entries)
        .collect())
}

/// Forget all history entries for a channel.
pub fn clear_history(channel: usize) -> Result<()> {
    check_channel(channel)?;
    let mut channels = CHANNELS.lock().unwrap();
    if let Some(state) = channels[channel].as_mut() {
        state.history.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_syslog_scale() {
        assert!(Severity::Emergency < Severity::Debug);
        assert!(Severity::Error < Severity::Info);
    }

    #[test]
    fn unconfigured_channel_drops_silently() {
        // channel 15 left unconfigured; must not panic.
        log_to(15, Severity::Error, "nobody hears this");
    }

    #[test]
    fn severity_name_round_trip() {
        for s in [
            Severity::Emergency,
            Severity::Alert,
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Notice,
            Severity::Info,
            Severity::Debug,
        ] {
            assert_eq!(Severity::from_name(s.name()), Some(s));
        }
    }

    #[test]
    fn history_respects_min_severity_and_capacity() {
        let chan = 1;
        configure(
            chan,
            ChannelConfig { sink: Sink::Null, min_severity: Severity::Debug, history_len: 2, debug: false },
        )
        .unwrap();
        log_to(chan, Severity::Info, "one");
        log_to(chan, Severity::Warning, "two");
        log_to(chan, Severity::Error, "three");
        let entries = history(chan, Severity::Debug, 10, |_| true).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "three");
        shutdown(chan).unwrap();
    }

    #[test]
    fn filtered_below_min_severity_is_not_logged() {
        let chan = 2;
        configure(
            chan,
            ChannelConfig { sink: Sink::Null, min_severity: Severity::Error, history_len: 8, debug: false },
        )
        .unwrap();
        log_to(chan, Severity::Info, "too verbose");
        let entries = history(chan, Severity::Debug, 10, |_| true).unwrap();
        assert!(entries.is_empty());
        shutdown(chan).unwrap();
    }
}
