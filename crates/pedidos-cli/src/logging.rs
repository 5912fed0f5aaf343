// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Overrides `[log].level` when set, using `EnvFilter` directive syntax.
pub const LOG_ENV: &str = "PEDIDOS_LOG";

pub fn filter(level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var(LOG_ENV)
        && !directives.trim().is_empty()
    {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {LOG_ENV} directives {directives:?}"));
    }
    EnvFilter::try_new(level).with_context(|| {
        format!("invalid log.level {level:?}; use error, warn, info, debug or trace")
    })
}

pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].path to a writable location",
                path.display()
            )
        })
}

/// Sends `tracing` output to `path`. The terminal belongs to the wizard, so
/// nothing is written to stdout or stderr.
pub fn init(path: &Path, level: &str) -> Result<()> {
    let filter = filter(level)?;
    let file = open_log_file(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;
    Ok(())
}
