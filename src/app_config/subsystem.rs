// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The [`Subsystem`] interface, grounded on `app_config.h`'s
//! `app_subsystem` method table (`start`/`stop`/`willrun`/`changed`).

use crate::{error::Result, structs::Value};

/// One independently start/stoppable piece of application state, keyed
/// off a slice of the app's configuration tree.
///
/// Implementors are registered with [`super::AppConfigCtx::new`] in
/// declaration order; that order is also the forward start order and
/// the reverse stop order used by the apply pipeline.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    /// Dotted field names (resolved via [`crate::structs::find`]) this
    /// subsystem's restart decision depends on. An empty list means
    /// the subsystem is never elided: any config change big enough to
    /// restart another subsystem it depends on restarts this one too.
    fn dependency_fields(&self) -> &[&str] {
        &[]
    }

    /// Apply `config`, making the subsystem live. Returning `Err` logs
    /// and leaves the subsystem's `running` flag unset, so a later
    /// configuration can retry.
    fn start(&self, config: &Value) -> Result<()>;

    /// Tear the subsystem down. `config` is the configuration it was
    /// last successfully started with.
    fn stop(&self, config: &Value);

    /// Whether `config` calls for this subsystem to run at all.
    /// Default: always.
    fn will_run(&self, _config: &Value) -> bool {
        true
    }

    /// Whether the subsystem-relevant parts of `current` and
    /// `applying` differ enough to warrant a stop/start cycle, beyond
    /// whatever [`Subsystem::dependency_fields`] already compares
    /// structurally. Default: always treat as changed (never elide
    /// purely on this hook).
    fn changed(&self, _current: &Value, _applying: &Value) -> bool {
        true
    }
}
