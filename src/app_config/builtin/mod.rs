// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Built-in subsystem templates, grounded on `config/app_config_*.c`:
//! [`pidfile::PidFileSubsystem`], [`directory::DirectorySubsystem`],
//! [`curconf::CurConfSubsystem`], [`alog::AlogSubsystem`].

pub mod alog;
pub mod curconf;
pub mod directory;
pub mod pidfile;

use crate::{
    error::{Error, Result},
    structs::{Schema, Value, primitive::PrimitiveValue},
};

/// Resolve `field` (a dotted path) in `value` against `schema` and
/// require it to be a string.
pub(crate) fn field_str(schema: &Schema, value: &Value, field: &str) -> Result<String> {
    let (_, found) = crate::structs::find(schema, value, field)?;
    match found {
        Value::Primitive(PrimitiveValue::Str(s)) => Ok(s.clone()),
        _ => Err(Error::invalid(format!("field \"{field}\" is not a string"))),
    }
}
