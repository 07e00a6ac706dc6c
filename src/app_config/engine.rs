// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The app-config engine itself, grounded on `app_config.c`'s
//! apply/load/reload state machine (`app_config_set`,
//! `app_config_timer_timeout`, `app_config_load`).

use std::{path::PathBuf, sync::Arc, time::Duration};

use bitflags::bitflags;
use quick_xml::{Reader, events::Event};
use tokio::sync::Mutex;

use super::subsystem::Subsystem;
use crate::{
    codec::xml::{self, InputFlags, OutputFlags},
    error::{Error, Result},
    log::{self, Severity},
    structs::{Schema, Value},
};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u8 {
        const PENDING    = 0b001;
        const APPLYING   = 0b010;
        const RESTARTING = 0b100;
    }
}

/// Application-supplied policy: the versioned type table and the
/// load-time hooks (`init`/`normalize`/`checker`/`upgrade`).
pub struct AppConfigSpec {
    /// XML element tag the top-level config document uses.
    pub xml_tag: String,
    /// `types[version]`, oldest to newest; index == version number.
    pub type_table: Vec<&'static Schema>,
    pub init: Option<Box<dyn Fn(&mut Value) + Send + Sync>>,
    pub normalize: Option<Box<dyn Fn(&mut Value) + Send + Sync>>,
    pub checker: Option<Box<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>>,
    /// Converts a value parsed with `type_table[old_version]` into one
    /// matching `type_table`'s latest schema.
    pub upgrade: Option<Box<dyn Fn(&Value, u32) -> Result<Value> + Send + Sync>>,
}

impl AppConfigSpec {
    pub fn latest_version(&self) -> u32 {
        self.type_table.len() as u32 - 1
    }

    pub fn latest_schema(&self) -> &'static Schema {
        self.type_table[self.type_table.len() - 1]
    }

    /// A fresh, application-initialized default value at the latest
    /// schema version.
    pub fn new_value(&self) -> Value {
        let mut value = Value::init(self.latest_schema());
        if let Some(init) = &self.init {
            init(&mut value);
        }
        value
    }
}

struct State {
    current: Option<Value>,
    /// `Some(None)` is a pending shutdown request; `Some(Some(v))` is
    /// a pending configuration; `None` means nothing pending.
    pending: Option<Option<Value>>,
    flags: Flags,
    running: Vec<bool>,
    scheduled: bool,
    xml_path: Option<PathBuf>,
    xml_writeback: bool,
}

pub struct AppConfigCtx {
    spec: AppConfigSpec,
    subsystems: Vec<Box<dyn Subsystem>>,
    state: Mutex<State>,
    log_channel: usize,
}

impl AppConfigCtx {
    pub fn new(spec: AppConfigSpec, subsystems: Vec<Box<dyn Subsystem>>, log_channel: usize) -> Arc<Self> {
        let running = vec![false; subsystems.len()];
        Arc::new(AppConfigCtx {
            spec,
            subsystems,
            state: Mutex::new(State {
                current: None,
                pending: None,
                flags: Flags::empty(),
                running,
                scheduled: false,
                xml_path: None,
                xml_writeback: false,
            }),
            log_channel,
        })
    }

    pub fn new_value(&self) -> Value {
        self.spec.new_value()
    }

    /// A read-only snapshot of the currently active configuration, if
    /// any subsystems are running.
    pub async fn current(&self) -> Option<Value> {
        self.state.lock().await.current.clone()
    }

    /// Request that the configuration become `config` after at most
    /// `delay`. `None` requests a full shutdown. Multiple calls within
    /// the delay window coalesce into the latest request, matching
    /// `app_config_set`'s coalescing timer.
    pub fn set(self: &Arc<Self>, config: Option<Value>, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            {
                let mut state = this.state.lock().await;
                state.pending = Some(config);
                state.flags.insert(Flags::PENDING);
                if state.scheduled {
                    return;
                }
                state.scheduled = true;
            }
            tokio::time::sleep(delay).await;
            if let Err(e) = this.apply().await {
                log::log_to(this.log_channel, Severity::Error, format!("apply failed: {e}"));
            }
        });
    }

    /// Synchronously tear everything down. Any `set` arriving while
    /// this runs is ignored, matching the shutdown-request semantics.
    pub async fn shutdown(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.pending = Some(None);
            state.flags.insert(Flags::PENDING);
        }
        self.apply().await
    }

    /// Load a versioned XML configuration file and schedule it for
    /// application after a 1ms delay, matching `app_config_load`.
    pub async fn load(self: &Arc<Self>, path: impl Into<PathBuf>, allow_writeback: bool) -> Result<()> {
        let path = path.into();
        let xml = tokio::fs::read_to_string(&path).await?;
        let value = self.parse_and_validate(&xml)?;
        {
            let mut state = self.state.lock().await;
            state.xml_path = Some(path);
            state.xml_writeback = allow_writeback;
        }
        self.set(Some(value), Duration::from_millis(1));
        Ok(())
    }

    /// Re-read the path passed to [`AppConfigCtx::load`].
    pub async fn reload(self: &Arc<Self>) -> Result<()> {
        let (path, writeback) = {
            let state = self.state.lock().await;
            let path = state.xml_path.clone().ok_or_else(|| Error::invalid("no config file registered"))?;
            (path, state.xml_writeback)
        };
        self.load(path, writeback).await
    }

    fn parse_and_validate(&self, xml: &str) -> Result<Value> {
        let version = scan_version(xml, &self.spec.xml_tag)?;
        let latest = self.spec.latest_version();
        if version > latest {
            return Err(Error::VersionMismatch { have: version, max: latest });
        }
        let schema = self.spec.type_table[version as usize];
        let (raw, _attrs) = xml::input(schema, &self.spec.xml_tag, xml, InputFlags::empty())?;
        let mut value = if version < latest {
            let upgrade = self
                .spec
                .upgrade
                .as_ref()
                .ok_or_else(|| Error::invalid("old config version present but no upgrade hook registered"))?;
            upgrade(&raw, version)?
        } else {
            raw
        };
        if let Some(normalize) = &self.spec.normalize {
            normalize(&mut value);
        }
        if let Some(checker) = &self.spec.checker {
            checker(&value).map_err(Error::invalid)?;
        }
        Ok(value)
    }

    /// The seven-step apply pipeline, run once per coalesced batch of
    /// `set` calls and looped while another one is pending by the time
    /// it finishes.
    async fn apply(self: &Arc<Self>) -> Result<()> {
        loop {
            // Step 1.
            let applying = {
                let mut state = self.state.lock().await;
                let pending = state.pending.take().unwrap_or(None);
                state.flags.remove(Flags::PENDING);
                state.flags.insert(Flags::APPLYING | Flags::RESTARTING);
                state.scheduled = false;
                pending
            };

            // Step 2.
            let current = { self.state.lock().await.current.clone() };
            let mut need_stop = vec![false; self.subsystems.len()];
            let mut need_start = vec![false; self.subsystems.len()];
            for (i, ss) in self.subsystems.iter().enumerate() {
                let running = self.state.lock().await.running[i];
                need_stop[i] = running && current.is_some();
                need_start[i] = applying.as_ref().is_some_and(|cfg| ss.will_run(cfg));
            }

            // Step 3: elide restarts whose dependencies didn't change.
            for (i, ss) in self.subsystems.iter().enumerate() {
                if !(need_stop[i] && need_start[i]) {
                    continue;
                }
                let (Some(cur), Some(app)) = (&current, &applying) else { continue };
                let schema = self.spec.latest_schema();
                let deps_unchanged = ss.dependency_fields().iter().all(|field| {
                    let a = crate::structs::find(schema, cur, field);
                    let b = crate::structs::find(schema, app, field);
                    matches!((a, b), (Ok((_, av)), Ok((_, bv))) if av == bv)
                });
                if deps_unchanged && !ss.changed(cur, app) {
                    need_stop[i] = false;
                    need_start[i] = false;
                }
            }

            // Step 4: stop in reverse declaration order.
            for (i, ss) in self.subsystems.iter().enumerate().rev() {
                if !need_stop[i] {
                    continue;
                }
                if let Some(cur) = &current {
                    ss.stop(cur);
                }
                self.state.lock().await.running[i] = false;
            }

            // Step 5.
            {
                let mut state = self.state.lock().await;
                state.current = applying.clone();
                state.flags.remove(Flags::APPLYING);
            }

            // Step 6: start in forward declaration order.
            for (i, ss) in self.subsystems.iter().enumerate() {
                if !need_start[i] {
                    continue;
                }
                let Some(app) = &applying else { continue };
                match ss.start(app) {
                    Ok(()) => self.state.lock().await.running[i] = true,
                    Err(e) => log::log_to(
                        self.log_channel,
                        Severity::Error,
                        format!("subsystem \"{}\" failed to start: {e}", ss.name()),
                    ),
                }
            }

            // Step 7.
            let again = {
                let mut state = self.state.lock().await;
                if state.flags.contains(Flags::PENDING) {
                    true
                } else {
                    state.flags.remove(Flags::RESTARTING);
                    false
                }
            };
            if !again {
                if let Some(value) = &applying {
                    self.writeback(value).await?;
                }
                return Ok(());
            }
        }
    }

    async fn writeback(&self, value: &Value) -> Result<()> {
        let (enabled, path) = {
            let state = self.state.lock().await;
            (state.xml_writeback, state.xml_path.clone())
        };
        let Some(path) = (if enabled { path } else { None }) else {
            return Ok(());
        };
        let schema = self.spec.latest_schema();
        let version = self.spec.latest_version().to_string();
        let xml = xml::output(schema, &self.spec.xml_tag, value, &[("version", version.as_str())], OutputFlags::empty())?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".new");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, xml).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Scans just the root element's attributes without interpreting the
/// body, so the configuration's version can be determined before
/// picking which `type_table` entry to parse it with.
fn scan_version(xml: &str, elem_tag: &str) -> Result<u32> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(|e| Error::parse("app_config", e.to_string()))? {
            Event::Start(start) | Event::Empty(start) => {
                if start.name().as_ref() != elem_tag.as_bytes() {
                    return Err(Error::parse("app_config", format!("expected root element <{elem_tag}>")));
                }
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| Error::parse("app_config", e.to_string()))?;
                    if attr.key.as_ref() == b"version" {
                        let text =
                            attr.unescape_value().map_err(|e| Error::parse("app_config", e.to_string()))?;
                        return text.parse().map_err(|_| Error::parse("app_config", "malformed version attribute"));
                    }
                }
                return Err(Error::parse("app_config", "missing version attribute on root element"));
            },
            Event::Eof => return Err(Error::parse("app_config", "empty document")),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::structs::{Field, primitive::PrimitiveKind};

    use super::*;

    static PORT_FIELD: Schema = Schema::Primitive(PrimitiveKind::U16);
    static TLS_FIELD: Schema = Schema::Primitive(PrimitiveKind::Bool(crate::structs::primitive::BoolVocabulary::TrueFalse));

    static V1_FIELDS: [Field; 1] = [Field { name: "port", schema: &PORT_FIELD }];
    static V1_SCHEMA: Schema = Schema::Structure(&V1_FIELDS);

    static V2_FIELDS: [Field; 2] =
        [Field { name: "port", schema: &PORT_FIELD }, Field { name: "tls", schema: &TLS_FIELD }];
    static V2_SCHEMA: Schema = Schema::Structure(&V2_FIELDS);

    struct RecordingSubsystem {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Subsystem for RecordingSubsystem {
        fn name(&self) -> &str {
            self.name
        }

        fn start(&self, _config: &Value) -> Result<()> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }

        fn stop(&self, _config: &Value) {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
        }
    }

    fn spec_v2_only() -> AppConfigSpec {
        AppConfigSpec {
            xml_tag: "config".to_string(),
            type_table: vec![&V2_SCHEMA],
            init: None,
            normalize: None,
            checker: None,
            upgrade: None,
        }
    }

    #[tokio::test]
    async fn apply_starts_forward_and_stops_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subsystems: Vec<Box<dyn Subsystem>> = vec![
            Box::new(RecordingSubsystem { name: "a", log: log.clone() }),
            Box::new(RecordingSubsystem { name: "b", log: log.clone() }),
            Box::new(RecordingSubsystem { name: "c", log: log.clone() }),
        ];
        let ctx = AppConfigCtx::new(spec_v2_only(), subsystems, 0);

        let config = ctx.new_value();
        ctx.set(Some(config), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().unwrap(), vec!["start:a", "start:b", "start:c"]);

        ctx.shutdown().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["start:a", "start:b", "start:c", "stop:c", "stop:b", "stop:a"]);
    }

    #[tokio::test]
    async fn load_upgrades_an_old_version_and_writes_back() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("pdel-app-config-test-{}.xml", std::process::id()));
        tokio::fs::write(&path, r#"<config version="0"><port>8080</port></config>"#).await.unwrap();

        let spec = AppConfigSpec {
            xml_tag: "config".to_string(),
            type_table: vec![&V1_SCHEMA, &V2_SCHEMA],
            init: None,
            normalize: None,
            checker: None,
            upgrade: Some(Box::new(|old, _version| {
                let (_, port) = crate::structs::find(&V1_SCHEMA, old, "port")?;
                Ok(Value::Structure(vec![
                    ("port", port.clone()),
                    ("tls", Value::Primitive(crate::structs::primitive::PrimitiveValue::Bool(false))),
                ]))
            })),
        };
        let ctx = AppConfigCtx::new(spec, Vec::new(), 0);
        ctx.load(&path, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let current = ctx.current().await.unwrap();
        let (_, port) = crate::structs::find(&V2_SCHEMA, &current, "port").unwrap();
        assert_eq!(port, &Value::Primitive(crate::structs::primitive::PrimitiveValue::U16(8080)));

        let rewritten = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(rewritten.contains("version=\"1\""));
        tokio::fs::remove_file(&path).await.ok();
    }
}
