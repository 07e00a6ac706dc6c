// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PID file subsystem, grounded on `config/app_config_pidfile.c`:
//! locks the file at startup, rewrites it whenever the subsystem
//! restarts, and considers the config "changed" whenever the path
//! changes or the running process's PID no longer matches the file.

use std::{
    io::{Seek, SeekFrom, Write},
    sync::Mutex,
};

use super::field_str;
use crate::{
    app_config::Subsystem,
    error::Result,
    structs::{Schema, Value},
};

#[cfg(unix)]
type LockedFile = nix::fcntl::Flock<std::fs::File>;
#[cfg(not(unix))]
type LockedFile = std::fs::File;

/// Copy this template, pointing `field` at the dotted name of the
/// config item holding the pidfile's path. An empty path means "no
/// pidfile" and the subsystem simply won't run.
pub struct PidFileSubsystem {
    schema: &'static Schema,
    field: &'static str,
    locked: Mutex<Option<LockedFile>>,
}

impl PidFileSubsystem {
    pub fn new(schema: &'static Schema, field: &'static str) -> Self {
        PidFileSubsystem { schema, field, locked: Mutex::new(None) }
    }
}

fn rewrite(file: &mut std::fs::File) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

impl Subsystem for PidFileSubsystem {
    fn name(&self) -> &str {
        "pidfile"
    }

    fn start(&self, config: &Value) -> Result<()> {
        let path = field_str(self.schema, config, self.field)?;
        let mut guard = self.locked.lock().expect("pidfile mutex poisoned");

        #[cfg(unix)]
        {
            if let Some(locked) = guard.as_mut() {
                rewrite(&mut *locked)?;
                return Ok(());
            }
            let file = std::fs::OpenOptions::new().create(true).write(true).truncate(false).open(&path)?;
            let mut locked = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusiveNonblock)
                .map_err(|(_, errno)| crate::error::Error::Io(std::io::Error::from(errno)))?;
            rewrite(&mut locked)?;
            *guard = Some(locked);
        }
        #[cfg(not(unix))]
        {
            if let Some(file) = guard.as_mut() {
                rewrite(file)?;
                return Ok(());
            }
            let mut file = std::fs::OpenOptions::new().create(true).write(true).truncate(false).open(&path)?;
            rewrite(&mut file)?;
            *guard = Some(file);
        }
        Ok(())
    }

    fn stop(&self, _config: &Value) {
        let mut guard = self.locked.lock().expect("pidfile mutex poisoned");
        *guard = None;
    }

    fn will_run(&self, config: &Value) -> bool {
        field_str(self.schema, config, self.field).is_ok_and(|p| !p.is_empty())
    }

    fn changed(&self, current: &Value, applying: &Value) -> bool {
        field_str(self.schema, current, self.field).ok() != field_str(self.schema, applying, self.field).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Field, primitive::PrimitiveKind};

    static PIDFILE_SCHEMA: Schema =
        Schema::Structure(&[Field { name: "path", schema: &Schema::Primitive(PrimitiveKind::Str { max_len: None }) }]);

    #[test]
    fn will_run_is_false_for_empty_path() {
        let ss = PidFileSubsystem::new(&PIDFILE_SCHEMA, "path");
        let config = Value::init(&PIDFILE_SCHEMA);
        assert!(!ss.will_run(&config));
    }
}
