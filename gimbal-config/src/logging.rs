//! Structured logging init and the logger hot-reload watcher (SPEC_FULL.md §6, §8, §9).
//!
//! `init` mirrors `env-tracing-logger`'s `EnvFilter::from_default_env()` + compact `fmt` layer
//! setup, but returns a `reload::Handle` alongside the drop guard so a background thread can push
//! a fresh filter in after the config file's `logs` subtree changes, without resurrecting the
//! original's `Logger`/`Appender` class hierarchy.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing_subscriber::{fmt, reload, util::SubscriberInitExt, EnvFilter};

use crate::config::{parse_config_file, LogConfig};

pub type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Initialise the global subscriber with a reloadable `EnvFilter` seeded from `initial_level`
/// (falling back to `RUST_LOG` if set). Returns a drop guard (keep it alive for the process
/// lifetime) and a handle the hot-reload watcher uses to swap the filter later.
pub fn init(initial_level: &str) -> (impl Drop, FilterHandle) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(initial_level.to_string()));
    let (filter, handle) = reload::Layer::new(filter);

    let evt_fmt = fmt::format().with_timer(fmt::time::Uptime::default()).compact();
    let fmt_layer = fmt::layer().event_format(evt_fmt);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    (Guard, handle)
}

struct Guard;
impl Drop for Guard {
    fn drop(&mut self) {}
}

/// Poll `config_path`'s mtime every `poll_interval`; on change, re-parse only the config file's
/// `logs` subtree and push a new filter through `handle`. Runs until `stop` is set.
pub fn spawn_reload_watcher(
    config_path: PathBuf,
    handle: FilterHandle,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("config-log-watch".to_string())
        .spawn(move || watch(config_path, handle, poll_interval, stop))
}

fn watch(config_path: PathBuf, handle: FilterHandle, poll_interval: Duration, stop: Arc<AtomicBool>) {
    let mut last_mtime: Option<SystemTime> = None;
    let mut last_logs: Option<LogConfig> = None;

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(poll_interval);

        let mtime = match std::fs::metadata(&config_path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(err) => {
                tracing::debug!(%err, "could not stat config file for hot-reload");
                continue;
            }
        };
        if Some(mtime) == last_mtime {
            continue;
        }
        last_mtime = Some(mtime);

        let config = match parse_config_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "config file changed but failed to parse, keeping current logger");
                continue;
            }
        };

        if last_logs.as_ref() == Some(&config.logs) {
            continue;
        }
        match handle.reload(EnvFilter::new(config.logs.level.clone())) {
            Ok(()) => tracing::info!(level = %config.logs.level, "reloaded log filter"),
            Err(err) => tracing::warn!(%err, "failed to reload log filter"),
        }
        last_logs = Some(config.logs);
    }
}
