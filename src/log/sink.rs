// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Where a channel's messages actually go.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use super::Severity;

/// One channel's output destination. `LocalSyslog` shells out to the
/// host syslog daemon via the `syslog` crate; `RemoteSyslog` speaks a
/// minimal RFC 3164 datagram directly over UDP since the `syslog`
/// crate's UDP transport does not expose the facility/severity
/// encoding this library's config wants to control explicitly.
#[derive(Clone, Debug, PartialEq)]
pub enum Sink {
    Null,
    Stderr,
    LocalSyslog { ident: String, facility: syslog::Facility },
    RemoteSyslog { ident: String, facility: syslog::Facility, server: SocketAddr },
}

impl Sink {
    pub(super) fn write(&self, severity: Severity, message: &str, now: DateTime<Utc>) {
        match self {
            Sink::Null => {},
            Sink::Stderr => {
                eprintln!("{} {} {}", now.format("%Y-%m-%dT%H:%M:%SZ"), severity.name(), message);
            },
            Sink::LocalSyslog { ident, facility } => write_local_syslog(ident, *facility, severity, message),
            Sink::RemoteSyslog { ident, facility, server } => {
                write_remote_syslog(ident, *facility, *server, severity, message, now)
            },
        }
    }
}

fn severity_to_syslog_level(severity: Severity) -> syslog::Severity {
    match severity {
        Severity::Emergency => syslog::Severity::LOG_EMERG,
        Severity::Alert => syslog::Severity::LOG_ALERT,
        Severity::Critical => syslog::Severity::LOG_CRIT,
        Severity::Error => syslog::Severity::LOG_ERR,
        Severity::Warning => syslog::Severity::LOG_WARNING,
        Severity::Notice => syslog::Severity::LOG_NOTICE,
        Severity::Info => syslog::Severity::LOG_INFO,
        Severity::Debug => syslog::Severity::LOG_DEBUG,
    }
}

fn write_local_syslog(ident: &str, facility: syslog::Facility, severity: Severity, message: &str) {
    let formatter = syslog::Formatter3164 {
        facility,
        hostname: None,
        process: ident.to_string(),
        pid: std::process::id(),
    };
    let Ok(mut writer) = syslog::unix(formatter) else {
        eprintln!("alog: local syslog unavailable, dropping: {message}");
        return;
    };
    let level = severity_to_syslog_level(severity);
    let _ = match level {
        syslog::Severity::LOG_EMERG => writer.emerg(message),
        syslog::Severity::LOG_ALERT => writer.alert(message),
        syslog::Severity::LOG_CRIT => writer.crit(message),
        syslog::Severity::LOG_ERR => writer.err(message),
        syslog::Severity::LOG_WARNING => writer.warning(message),
        syslog::Severity::LOG_NOTICE => writer.notice(message),
        syslog::Severity::LOG_INFO => writer.info(message),
        syslog::Severity::LOG_DEBUG => writer.debug(message),
    };
}

/// Hand-rolled RFC 3164 `<PRI>TIMESTAMP HOSTNAME TAG: MSG` datagram,
/// fired over a fresh, best-effort UDP socket per message.
fn write_remote_syslog(
    ident: &str,
    facility: syslog::Facility,
    server: SocketAddr,
    severity: Severity,
    message: &str,
    now: DateTime<Utc>,
) {
    let pri = facility as i32 + syslog_numeric_severity(severity);
    let hostname = hostname_or_localhost();
    let timestamp = now.format("%b %e %H:%M:%S");
    let datagram = format!("<{pri}>{timestamp} {hostname} {ident}: {message}");

    let Ok(socket) = std::net::UdpSocket::bind(("0.0.0.0", 0)) else {
        return;
    };
    let _ = socket.send_to(datagram.as_bytes(), server);
}

fn syslog_numeric_severity(severity: Severity) -> i32 {
    match severity {
        Severity::Emergency => 0,
        Severity::Alert => 1,
        Severity::Critical => 2,
        Severity::Error => 3,
        Severity::Warning => 4,
        Severity::Notice => 5,
        Severity::Info => 6,
        Severity::Debug => 7,
    }
}

fn hostname_or_localhost() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string())
    }
    #[cfg(not(unix))]
    {
        "localhost".to_string()
    }
}
