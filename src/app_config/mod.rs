// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Versioned application-configuration engine, grounded on
//! `config/app_config.{h,c}`: a typed config tree, a set of
//! independently start/stoppable [`Subsystem`]s, and a delayed,
//! coalescing apply pipeline that stops what needs stopping, swaps in
//! the new configuration, and starts what needs starting.

pub mod builtin;
mod engine;
mod subsystem;

pub use engine::{AppConfigCtx, AppConfigSpec, Flags};
pub use subsystem::Subsystem;
