// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! "Current configuration" publishing subsystem, grounded on
//! `config/app_config_curconf.c`: keeps a read-only copy of the
//! active config that other code can read without going through the
//! engine's own apply-pipeline mutex. Usually registered first so it
//! publishes before any other subsystem starts using the new config.

use std::sync::{Arc, RwLock};

use crate::{app_config::Subsystem, error::Result, structs::Value};

pub struct CurConfSubsystem {
    slot: Arc<RwLock<Option<Value>>>,
}

impl CurConfSubsystem {
    pub fn new() -> Self {
        CurConfSubsystem { slot: Arc::new(RwLock::new(None)) }
    }

    /// A cloneable handle consumers can read from independently of
    /// the app-config engine.
    pub fn handle(&self) -> Arc<RwLock<Option<Value>>> {
        self.slot.clone()
    }
}

impl Default for CurConfSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for CurConfSubsystem {
    fn name(&self) -> &str {
        "curconf"
    }

    fn start(&self, config: &Value) -> Result<()> {
        *self.slot.write().expect("curconf lock poisoned") = Some(config.clone());
        Ok(())
    }

    fn stop(&self, _config: &Value) {
        *self.slot.write().expect("curconf lock poisoned") = None;
    }

    fn changed(&self, _current: &Value, _applying: &Value) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Schema, primitive::{BoolVocabulary, PrimitiveKind}};

    static LEAF_SCHEMA: Schema = Schema::Primitive(PrimitiveKind::Bool(BoolVocabulary::TrueFalse));

    #[test]
    fn publishes_and_clears() {
        let ss = CurConfSubsystem::new();
        let handle = ss.handle();
        let value = Value::init(&LEAF_SCHEMA);
        ss.start(&value).unwrap();
        assert!(handle.read().unwrap().is_some());
        ss.stop(&value);
        assert!(handle.read().unwrap().is_none());
    }
}
