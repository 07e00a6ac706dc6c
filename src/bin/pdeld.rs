// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Demo daemon: loads a versioned XML app-config, starts the
//! `pidfile`/`directory`/`curconf`/`alog` built-in subsystems plus an
//! HTTP server serving a public file servlet and a cookie-auth-gated
//! one, and re-applies the configuration on `SIGHUP`.

use std::{path::PathBuf, sync::Arc, sync::Mutex as StdMutex, time::Duration};

use anyhow::Context;
use pdel::{
    app_config::{
        AppConfigCtx, AppConfigSpec, Subsystem,
        builtin::{alog::AlogSubsystem, curconf::CurConfSubsystem, directory::DirectorySubsystem, pidfile::PidFileSubsystem},
    },
    cfg::{cli::resolve_config_path, logger::init_logger},
    error::Error,
    http::server::{
        Router, ServerConfig as HttpServerConfig, serve_connection,
        servlet::{CookieAuthServlet, FileServlet},
    },
    log::{self, ChannelConfig, Severity, Sink},
    net::{self, TcpAcceptor},
    structs::{Field, Schema, Value, find, primitive::{BoolVocabulary, PrimitiveKind, PrimitiveValue}},
};
use rand::rngs::OsRng;
use regex::Regex;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{info, warn};

/// The single log channel this demo drives; a real application would
/// carve out one per concern.
const LOG_CHANNEL: usize = 0;

static PIDFILE_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static DIRECTORY_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static LISTEN_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static DOC_ROOT_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static LOGIN_URL_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static LOG_SEVERITY_FIELD: Schema = Schema::Primitive(PrimitiveKind::Str { max_len: None });
static LOG_DEBUG_FIELD: Schema = Schema::Primitive(PrimitiveKind::Bool(BoolVocabulary::TrueFalse));

static CONFIG_FIELDS: [Field; 7] = [
    Field { name: "pidfile", schema: &PIDFILE_FIELD },
    Field { name: "directory", schema: &DIRECTORY_FIELD },
    Field { name: "listen", schema: &LISTEN_FIELD },
    Field { name: "doc_root", schema: &DOC_ROOT_FIELD },
    Field { name: "login_url", schema: &LOGIN_URL_FIELD },
    Field { name: "log_severity", schema: &LOG_SEVERITY_FIELD },
    Field { name: "log_debug", schema: &LOG_DEBUG_FIELD },
];
static CONFIG_SCHEMA: Schema = Schema::Structure(&CONFIG_FIELDS);

fn config_str(config: &Value, field: &str) -> pdel::error::Result<String> {
    match find(&CONFIG_SCHEMA, config, field)? {
        (_, Value::Primitive(PrimitiveValue::Str(s))) => Ok(s.clone()),
        _ => Err(Error::invalid(format!("field \"{field}\" is not a string"))),
    }
}

fn config_bool(config: &Value, field: &str) -> pdel::error::Result<bool> {
    match find(&CONFIG_SCHEMA, config, field)? {
        (_, Value::Primitive(PrimitiveValue::Bool(b))) => Ok(*b),
        _ => Err(Error::invalid(format!("field \"{field}\" is not a bool"))),
    }
}

fn severity_from_name(name: &str) -> Severity {
    match name {
        "emerg" => Severity::Emergency,
        "alert" => Severity::Alert,
        "crit" => Severity::Critical,
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        "notice" => Severity::Notice,
        "debug" => Severity::Debug,
        _ => Severity::Info,
    }
}

/// Serves `doc_root` publicly and `doc_root/private` behind a signed
/// cookie, restarting the listener whenever `listen`/`doc_root`/
/// `login_url` change.
struct HttpServerSubsystem {
    public_key: RsaPublicKey,
    signing_key: RsaPrivateKey,
    server: StdMutex<Option<net::Server>>,
}

impl HttpServerSubsystem {
    fn new(public_key: RsaPublicKey, signing_key: RsaPrivateKey) -> Self {
        HttpServerSubsystem { public_key, signing_key, server: StdMutex::new(None) }
    }

    fn build_router(&self, doc_root: &str, login_url: &str) -> pdel::error::Result<Router> {
        let mut router = Router::new();
        let cookie_auth = CookieAuthServlet::new(
            "pdeld_session",
            "pdeld",
            self.public_key.clone(),
            Some(self.signing_key.clone()),
            login_url.to_string(),
            Some("orig_url"),
        );
        let private_pattern = Regex::new("^/private/").map_err(|e| Error::invalid(e.to_string()))?;
        router.add(None::<String>, private_pattern.clone(), 20, Arc::new(cookie_auth));
        router.add(
            None::<String>,
            private_pattern,
            10,
            Arc::new(FileServlet::new(format!("{doc_root}/private"), "/private", true)),
        );
        let public_pattern = Regex::new("^/").map_err(|e| Error::invalid(e.to_string()))?;
        router.add(None::<String>, public_pattern, 0, Arc::new(FileServlet::new(doc_root.to_string(), "/", true)));
        Ok(router)
    }
}

impl Subsystem for HttpServerSubsystem {
    fn name(&self) -> &str {
        "http_server"
    }

    fn dependency_fields(&self) -> &[&str] {
        &["listen", "doc_root", "login_url"]
    }

    fn start(&self, config: &Value) -> pdel::error::Result<()> {
        let listen = config_str(config, "listen")?;
        let doc_root = config_str(config, "doc_root")?;
        let login_url = config_str(config, "login_url")?;
        let router = Arc::new(self.build_router(&doc_root, &login_url)?);

        let std_listener = std::net::TcpListener::bind(listen.as_str())?;
        let acceptor = TcpAcceptor::from_std(std_listener)?;

        let server = net::Server::start(
            acceptor,
            net::ServerConfig { max_conn: 0, conn_timeout: None, log_channel: LOG_CHANNEL },
            |_conn, _peer| Some(()),
            move |conn, _cookie: &()| {
                let router = router.clone();
                Box::pin(async move {
                    let config = HttpServerConfig { max_conn: 0, idle_timeout: Duration::from_secs(30), log_channel: LOG_CHANNEL };
                    serve_connection(conn, router, &config).await;
                })
            },
            |_cookie: ()| {},
        );
        *self.server.lock().map_err(|_| Error::invalid("http server subsystem lock poisoned"))? = Some(server);
        Ok(())
    }

    fn stop(&self, _config: &Value) {
        let taken = self.server.lock().ok().and_then(|mut guard| guard.take());
        if let Some(server) = taken {
            tokio::spawn(async move { server.stop().await });
        }
    }

    fn will_run(&self, config: &Value) -> bool {
        config_str(config, "listen").is_ok_and(|l| !l.is_empty())
    }

    fn changed(&self, current: &Value, applying: &Value) -> bool {
        config_str(current, "listen").ok() != config_str(applying, "listen").ok()
            || config_str(current, "doc_root").ok() != config_str(applying, "doc_root").ok()
            || config_str(current, "login_url").ok() != config_str(applying, "login_url").ok()
    }
}

fn cli_arg(flag: &str, default: &str) -> String {
    let args: Vec<String> = std::env::args().collect();
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned().unwrap_or_else(|| default.to_string())
}

#[cfg(unix)]
async fn wait_for_reload_or_shutdown(ctx: &Arc<AppConfigCtx>) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("SIGHUP received, reloading configuration");
                if let Err(e) = ctx.reload().await {
                    warn!("reload failed: {e}");
                }
            }
            _ = terminate.recv() => {
                info!("SIGTERM received, shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_reload_or_shutdown(_ctx: &Arc<AppConfigCtx>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger_config = cli_arg("--logger-config", "demos/pdeld.logger.yaml");
    let _logger_guard = init_logger(&logger_config).context("failed to initialize diagnostic logger")?;

    log::configure(LOG_CHANNEL, ChannelConfig { sink: Sink::Stderr, min_severity: Severity::Info, history_len: 256, debug: false })
        .context("failed to configure the business-event log channel")?;

    let config_rel = cli_arg("--config", "demos/pdeld.xml");
    let config_path: PathBuf = resolve_config_path(&config_rel).context("failed to resolve config path")?;

    let signing_key = RsaPrivateKey::new(&mut OsRng, 1024).context("failed to generate cookie-signing key")?;
    let public_key = RsaPublicKey::from(&signing_key);

    let subsystems: Vec<Box<dyn Subsystem>> = vec![
        Box::new(CurConfSubsystem::new()),
        Box::new(DirectorySubsystem::new(&CONFIG_SCHEMA, "directory")),
        Box::new(PidFileSubsystem::new(&CONFIG_SCHEMA, "pidfile")),
        Box::new(AlogSubsystem::new(LOG_CHANNEL, |config| {
            Ok(ChannelConfig {
                sink: Sink::Stderr,
                min_severity: severity_from_name(&config_str(config, "log_severity")?),
                history_len: 256,
                debug: config_bool(config, "log_debug")?,
            })
        })),
        Box::new(HttpServerSubsystem::new(public_key, signing_key)),
    ];

    let spec = AppConfigSpec {
        xml_tag: "pdeld".to_string(),
        type_table: vec![&CONFIG_SCHEMA],
        init: None,
        normalize: None,
        checker: None,
        upgrade: None,
    };

    let ctx = AppConfigCtx::new(spec, subsystems, LOG_CHANNEL);
    ctx.load(config_path.clone(), true).await.context("failed to load configuration")?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    info!(path = %config_path.display(), "pdeld started");
    wait_for_reload_or_shutdown(&ctx).await?;

    ctx.shutdown().await.context("shutdown failed")?;
    Ok(())
}
