//! # holotable
//!
//! Session server binary: loads settings, opens the database, and serves
//! group sockets until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use holotable_core::logging::init_subscriber;
use holotable_server::metrics::install_recorder;
use holotable_server::{HolotableServer, ServerConfig};
use holotable_settings::HolotableSettings;
use holotable_store::{ConnectionConfig, SessionStore, SqliteStore};

/// Holotable session server.
#[derive(Parser, Debug)]
#[command(name = "holotable", about = "Real-time group session server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// `SQLite` database file (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file (default `~/.holotable/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `holotable_server=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut HolotableSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(db_path) = &self.db_path {
            settings.storage.db_path = db_path.to_string_lossy().into_owned();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(holotable_settings::settings_path);
    let loaded = holotable_settings::load_settings_from_path(&settings_path);
    let mut settings = match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => HolotableSettings::default(),
    };
    args.apply(&mut settings);

    init_subscriber(&settings.logging.level, settings.logging.format);
    if let Err(e) = &loaded {
        tracing::warn!(path = %settings_path.display(), error = %e, "settings not loaded, using defaults");
    }

    let db_path = PathBuf::from(&settings.storage.db_path);
    ensure_parent_dir(&db_path)?;
    let store = SqliteStore::open(&settings.storage.db_path, &ConnectionConfig::default())
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let store: Arc<dyn SessionStore> = Arc::new(store);

    let mut server = HolotableServer::new(ServerConfig::from_settings(&settings.server), store);
    match install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    let heartbeat = server.spawn_heartbeat();
    tracing::info!(db = %db_path.display(), "holotable listening on http://{addr}");

    server.shutdown().wait_for_signal().await;
    tracing::info!("shutting down");
    server
        .shutdown()
        .graceful_shutdown(vec![handle, heartbeat], None)
        .await;

    tracing::info!("shutdown complete");
    Ok(())
}
