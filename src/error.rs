// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Crate-wide error taxonomy.
//!
//! Every public operation in every component returns [`Result`]. The
//! variants mirror the conceptual taxonomy the library is built around:
//! structural misuse, missing names, quiescence requirements, config
//! version skew, (de)serialization failure, OS/TLS errors, timeouts,
//! auth denial, and resource exhaustion.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Precondition violation: bad argument, union set to unknown field,
    /// `max_conn <= max_cache`, and the like.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Named element, subsystem, or servlet route could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation requires quiescence (second concurrent login, uninit
    /// while subsystems are running).
    #[error("busy: {0}")]
    Busy(String),

    /// Config file version exceeds what the engine supports.
    #[error("version mismatch: have {have}, max supported {max}")]
    VersionMismatch { have: u32, max: u32 },

    /// ascii/binify/XML/XML-RPC reconstruction failed.
    #[error("parse error at {where_}: {message}")]
    Parse { where_: String, message: String },

    /// Numeric value out of the representable range for its type.
    #[error("value out of range: {0}")]
    Range(String),

    /// Underlying OS or TLS failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Idle/connect/handshake timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Auth servlet gate rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Allocation failure or bound exceeded (array cap, connection cap).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn parse(where_: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            where_: where_.into(),
            message: message.into(),
        }
    }

    /// Severity an active logging channel should attribute to this error
    /// class, per the propagation policy in the error-handling design.
    pub fn log_severity(&self) -> crate::log::Severity {
        use crate::log::Severity;
        match self {
            Error::Parse { .. } | Error::Range(_) => Severity::Error,
            Error::Timeout(_) => Severity::Warning,
            Error::PermissionDenied(_) => Severity::Info,
            Error::VersionMismatch { .. } => Severity::Error,
            Error::Io(_) => Severity::Error,
            Error::Busy(_) => Severity::Warning,
            Error::ResourceExhausted(_) => Severity::Warning,
            Error::InvalidArgument(_) | Error::NotFound(_) => Severity::Error,
        }
    }
}
