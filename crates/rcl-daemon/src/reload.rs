//! Control document hot-reload.
//!
//! File events are coalesced into a single pending reload. A reload that the
//! policy store refuses (a locked policy changed or removed) leaves every
//! policy as it was and is reported on the SSE bus.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rcl_config::load_control_document;
use rcl_policy::ReloadSummary;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::state::AppState;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Re-read `paths` and apply the policies they declare.
///
/// Account, broker and ledger sections are read at startup only; changes to
/// them are logged and wait for a restart.
pub async fn reload_config(state: &AppState, paths: &[PathBuf]) -> anyhow::Result<ReloadSummary> {
    let (loaded, doc) = load_control_document(paths)?;
    let summary = state
        .policies
        .reload(&doc)
        .with_context(|| format!("reload rejected (config_hash={})", loaded.config_hash))?;

    let enabled: Vec<_> = doc.accounts.iter().filter(|a| a.enabled).collect();
    let accounts_changed = enabled.len() != state.accounts.len()
        || enabled
            .iter()
            .any(|a| state.accounts.get(&a.account_id).map(|h| &h.config) != Some(*a));
    if accounts_changed {
        warn!("account configuration changed on disk; restart to apply");
    }

    *state.config_hash.write().await = loaded.config_hash.clone();
    info!(
        config_hash = %loaded.config_hash,
        changed = ?summary.changed,
        removed = ?summary.removed,
        "control document reloaded"
    );
    Ok(summary)
}

/// Watch `paths` and reload on change. The returned watcher must be kept
/// alive for as long as reloads are wanted.
pub fn spawn_config_watcher(state: Arc<AppState>, paths: Vec<PathBuf>) -> anyhow::Result<RecommendedWatcher> {
    let (tx, mut rx) = mpsc::channel::<()>(1);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(ev) if matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
            // A full queue already holds a pending reload.
            let _ = tx.try_send(());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "config watcher error"),
    })
    .context("failed to create config watcher")?;

    for p in &paths {
        watcher
            .watch(p, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", p.display()))?;
    }

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            tokio::time::sleep(DEBOUNCE).await;
            while rx.try_recv().is_ok() {}

            match reload_config(&state, &paths).await {
                Ok(summary) if summary.is_noop() => {}
                Ok(summary) => state.log(
                    "INFO",
                    format!("policies reloaded: changed {:?}, removed {:?}", summary.changed, summary.removed),
                ),
                Err(e) => {
                    error!(error = %format!("{e:#}"), "control document reload failed");
                    state.log("ERROR", format!("reload failed: {e:#}"));
                }
            }
        }
    });

    Ok(watcher)
}
