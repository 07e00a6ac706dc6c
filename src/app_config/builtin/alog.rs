// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logging-channel subsystem, grounded on `config/app_config_alog.c`:
//! extracts a [`crate::log::ChannelConfig`] out of the application's
//! config tree and pushes it into [`crate::log`] on start, tearing the
//! channel down on stop.

use crate::{
    app_config::Subsystem,
    error::Result,
    log::{self, ChannelConfig},
    structs::Value,
};

/// Copy this template, supplying `channel` (the log channel index to
/// drive) and `extract`, a closure that pulls a [`ChannelConfig`] out
/// of the application's config value.
pub struct AlogSubsystem {
    channel: usize,
    extract: Box<dyn Fn(&Value) -> Result<ChannelConfig> + Send + Sync>,
}

impl AlogSubsystem {
    pub fn new(channel: usize, extract: impl Fn(&Value) -> Result<ChannelConfig> + Send + Sync + 'static) -> Self {
        AlogSubsystem { channel, extract: Box::new(extract) }
    }
}

impl Subsystem for AlogSubsystem {
    fn name(&self) -> &str {
        "alog"
    }

    fn start(&self, config: &Value) -> Result<()> {
        let channel_config = (self.extract)(config)?;
        log::configure(self.channel, channel_config)
    }

    fn stop(&self, _config: &Value) {
        let _ = log::shutdown(self.channel);
    }

    fn changed(&self, current: &Value, applying: &Value) -> bool {
        match ((self.extract)(current), (self.extract)(applying)) {
            (Ok(a), Ok(b)) => a != b,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Severity;

    #[test]
    fn start_configures_named_channel() {
        let ss = AlogSubsystem::new(
            5,
            |_v: &Value| Ok(ChannelConfig { sink: log::Sink::Null, min_severity: Severity::Info, history_len: 0, debug: false }),
        );
        let dummy = Value::init(&crate::structs::Schema::Primitive(crate::structs::primitive::PrimitiveKind::Bool(
            crate::structs::primitive::BoolVocabulary::TrueFalse,
        )));
        ss.start(&dummy).unwrap();
        ss.stop(&dummy);
    }
}
