// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Working-directory subsystem, grounded on `config/app_config_directory.c`.

use super::field_str;
use crate::{
    app_config::Subsystem,
    error::Result,
    structs::{Schema, Value},
};

/// Copy this template, pointing `field` at the dotted name of the
/// config item holding the directory to `chdir(2)` into. An empty
/// path means no change is made and the subsystem won't run.
pub struct DirectorySubsystem {
    schema: &'static Schema,
    field: &'static str,
}

impl DirectorySubsystem {
    pub fn new(schema: &'static Schema, field: &'static str) -> Self {
        DirectorySubsystem { schema, field }
    }
}

impl Subsystem for DirectorySubsystem {
    fn name(&self) -> &str {
        "directory"
    }

    fn start(&self, config: &Value) -> Result<()> {
        let dir = field_str(self.schema, config, self.field)?;
        std::env::set_current_dir(&dir)?;
        Ok(())
    }

    fn stop(&self, _config: &Value) {}

    fn will_run(&self, config: &Value) -> bool {
        field_str(self.schema, config, self.field).is_ok_and(|d| !d.is_empty())
    }

    fn changed(&self, current: &Value, applying: &Value) -> bool {
        field_str(self.schema, current, self.field).ok() != field_str(self.schema, applying, self.field).ok()
    }
}
