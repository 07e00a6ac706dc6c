// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! "Last message repeated N times" collapsing, ported from `alog.c`'s
//! `alog_last_check`/`alog_flush_lastmsg`/repeat-counting logic.

use chrono::{DateTime, Utc};

use super::{ChannelState, HistoryEntry, Severity};

const TIMEOUT_INITIAL: i64 = 5;

pub(super) struct Dedup {
    last_message: Option<String>,
    last_severity: Severity,
    last_when: DateTime<Utc>,
    repeat: u32,
    timeout: i64,
    timer_expiry: Option<DateTime<Utc>>,
}

impl Dedup {
    pub(super) fn new() -> Self {
        Dedup {
            last_message: None,
            last_severity: Severity::Info,
            last_when: chrono::DateTime::<Utc>::UNIX_EPOCH,
            repeat: 0,
            timeout: TIMEOUT_INITIAL,
            timer_expiry: None,
        }
    }
}

pub(super) enum Action {
    WriteNow,
    Suppressed,
}

/// Check whether the repeat-suppression timer has expired and, if so,
/// flush the pending "repeated N times" summary. Must run before the
/// severity filter so a timer that expired while the channel was
/// quiet still gets flushed.
pub(super) fn flush_if_expired(state: &mut ChannelState, now: DateTime<Utc>) {
    let Some(expiry) = state.dedup.timer_expiry else { return };
    if expiry > now {
        return;
    }
    let timeout = state.dedup.timeout;
    flush_lastmsg(state, timeout, now);
}

/// Unconditionally flush, as if the timer had just expired.
pub(super) fn force_flush(state: &mut ChannelState, now: DateTime<Utc>) {
    let timeout = state.dedup.timeout;
    flush_lastmsg(state, timeout, now);
}

fn flush_lastmsg(state: &mut ChannelState, new_timeout: i64, now: DateTime<Utc>) {
    match state.dedup.repeat {
        0 => {},
        1 => {
            if let Some(msg) = state.dedup.last_message.clone() {
                state.emit(state.dedup.last_severity, &msg, state.dedup.last_when);
            }
        },
        n => {
            let msg = format!("last message repeated {n} times");
            let sev = state.dedup.last_severity;
            let when = state.dedup.last_when;
            state.emit(sev, &msg, when);
        },
    }
    state.dedup.repeat = 0;
    state.dedup.timeout = new_timeout;
    state.dedup.timer_expiry = None;
    let _ = now;
}

/// The "repeated N times" entry that a flush would emit right now, for
/// callers reading history without having flushed first. Returns
/// `None` once there's nothing pending (`repeat` is 0) or only the
/// single held-back message (`repeat` is 1, which flushes verbatim
/// rather than as a repeat count).
pub(super) fn pending_summary(state: &ChannelState) -> Option<HistoryEntry> {
    if state.dedup.repeat < 2 {
        return None;
    }
    Some(HistoryEntry {
        when: state.dedup.last_when,
        severity: state.dedup.last_severity,
        message: format!("last message repeated {} times", state.dedup.repeat),
    })
}

/// Record `message` against the dedup state. Returns whether the
/// caller should write it immediately (new/changed message) or it was
/// folded into the running repeat count.
pub(super) fn observe(
    state: &mut ChannelState,
    message: &str,
    severity: Severity,
    now: DateTime<Utc>,
) -> Action {
    let changed = state.dedup.last_message.as_deref() != Some(message);
    if changed {
        let timeout = TIMEOUT_INITIAL;
        flush_lastmsg(state, timeout, now);
        state.dedup.last_message = Some(message.to_string());
        state.dedup.last_severity = severity;
        state.dedup.last_when = now;
        Action::WriteNow
    } else {
        let delay = (now - state.dedup.last_when).num_seconds().max(0);
        state.dedup.timeout += delay;
        state.dedup.repeat += 1;
        state.dedup.last_when = now;
        state.dedup.timer_expiry = Some(now + chrono::Duration::seconds(state.dedup.timeout.max(1)));
        Action::Suppressed
    }
}
