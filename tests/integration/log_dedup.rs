// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S6/S8: repeated identical messages within the dedup window collapse
//! into a single "last message repeated N times" line once the window
//! is flushed, and messages below the channel's minimum severity never
//! reach the sink or history at all. `log::flush` is used in place of
//! waiting out the real dedup timer (it performs the identical
//! force-flush the engine itself uses when tearing a channel down).

use pdel::log::{self, ChannelConfig, Severity, Sink};

#[test]
fn repeated_message_collapses_into_one_summary_line() {
    let channel = 9;
    log::configure(channel, ChannelConfig { sink: Sink::Null, min_severity: Severity::Warning, history_len: 16, debug: false })
        .unwrap();

    log::log_to(channel, Severity::Warning, "disk nearly full");
    for _ in 0..7 {
        log::log_to(channel, Severity::Warning, "disk nearly full");
    }
    log::flush(channel).unwrap();

    let entries = log::history(channel, Severity::Debug, 16, |_| true).unwrap();
    let messages: Vec<&str> = entries.iter().rev().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["disk nearly full", "last message repeated 7 times"]);

    log::shutdown(channel).unwrap();
}

#[test]
fn message_below_min_severity_never_reaches_history() {
    let channel = 10;
    log::configure(channel, ChannelConfig { sink: Sink::Null, min_severity: Severity::Warning, history_len: 16, debug: false })
        .unwrap();

    log::log_to(channel, Severity::Info, "just fyi");
    let entries = log::history(channel, Severity::Debug, 16, |_| true).unwrap();
    assert!(entries.is_empty());

    log::shutdown(channel).unwrap();
}
