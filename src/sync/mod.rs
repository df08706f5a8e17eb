//! Live Sync Engine.
//!
//! Mirrors a plugin's source tree into a running container and keeps it in
//! sync while the developer edits:
//!
//! ```text
//!   notify watcher (own thread) ──blocking_send──► mpsc ──► watch task
//!                                                             │
//!                         WatchRegistration::plan (filter, debounce, path map)
//!                                                             │
//!                           push_file / rm -f ──► reload trigger (best effort)
//! ```
//!
//! One registration per plugin name. Failures while syncing are logged and
//! the watch keeps running.

mod debounce;
mod filter;
mod manifest;

pub use debounce::DebounceGate;
pub use filter::WatchFilter;
pub use manifest::{CustomMount, MANIFEST_FILE, MountMapping, PluginManifest};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::runtime::{ContainerRuntime, TreeFilter};

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// A raw change under a plugin directory, absolute host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Work the watch task performs for an accepted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Push {
        host_path: PathBuf,
        container_path: String,
    },
    Remove {
        container_path: String,
    },
}

/// Per-plugin watch state: where events come from, where files go and
/// the debounce gate.
#[derive(Debug, Clone)]
pub struct WatchRegistration {
    pub plugin_name: String,
    pub plugin_dir: PathBuf,
    pub container: String,
    /// Container directory holding this plugin.
    pub container_dir: String,
    filter: Arc<WatchFilter>,
    gate: DebounceGate,
}

impl WatchRegistration {
    pub fn new(
        plugin_name: impl Into<String>,
        plugin_dir: impl Into<PathBuf>,
        container: impl Into<String>,
        plugin_root: &str,
        filter: Arc<WatchFilter>,
        debounce: Duration,
    ) -> Self {
        let plugin_name = plugin_name.into();
        let container_dir = format!("{}/{}", plugin_root.trim_end_matches('/'), plugin_name);
        Self {
            plugin_name,
            plugin_dir: plugin_dir.into(),
            container: container.into(),
            container_dir,
            filter,
            gate: DebounceGate::new(debounce),
        }
    }

    /// Filter, debounce and map one change. `None` means drop it.
    pub fn plan(&mut self, change: &FileChange, now: Instant) -> Option<SyncAction> {
        if change.kind != ChangeKind::Deleted && change.path.is_dir() {
            return None;
        }
        let rel = change.path.strip_prefix(&self.plugin_dir).ok()?;
        if !self.filter.matches(rel) {
            return None;
        }
        if !self.gate.try_accept(now) {
            tracing::trace!(path = %rel.display(), "Change suppressed by debounce");
            return None;
        }

        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let container_path = format!("{}/{}", self.container_dir, rel);

        Some(match change.kind {
            ChangeKind::Deleted => SyncAction::Remove { container_path },
            ChangeKind::Created | ChangeKind::Modified => SyncAction::Push {
                host_path: change.path.clone(),
                container_path,
            },
        })
    }
}

/// Apply one action to the container. Returns `false` when there was
/// nothing to do (the file vanished before it could be pushed).
pub async fn apply(
    runtime: &dyn ContainerRuntime,
    container: &str,
    action: &SyncAction,
) -> Result<bool> {
    match action {
        SyncAction::Push {
            host_path,
            container_path,
        } => {
            if !host_path.exists() {
                tracing::debug!(path = %host_path.display(), "File gone before sync");
                return Ok(false);
            }
            runtime.push_file(container, host_path, container_path).await?;
            tracing::info!(container = %container, "Synced {}", container_path);
        }
        SyncAction::Remove { container_path } => {
            let argv = vec!["rm".to_string(), "-f".to_string(), container_path.clone()];
            let out = runtime.exec(container, &argv).await?;
            if out.success() {
                tracing::info!(container = %container, "Removed {}", container_path);
            } else {
                tracing::warn!(
                    container = %container,
                    exit_code = out.exit_code,
                    "Failed to remove {}: {}",
                    container_path,
                    out.output.trim()
                );
            }
        }
    }
    Ok(true)
}

/// Touch the plugin's reload sentinel and signal the reloadable process.
/// Never fails the caller.
pub async fn trigger_reload(
    runtime: &dyn ContainerRuntime,
    container: &str,
    plugin_root: &str,
    plugin_name: &str,
    reload_pattern: &str,
) {
    let root = plugin_root.trim_end_matches('/');
    let script = format!(
        "mkdir -p {root}/.reload && touch {root}/.reload/{plugin_name}; \
         pkill -USR1 -f '{reload_pattern}' 2>/dev/null || true"
    );
    let argv = vec!["sh".to_string(), "-c".to_string(), script];
    match runtime.exec(container, &argv).await {
        Ok(out) if out.success() => {
            tracing::debug!(plugin = %plugin_name, "Triggered reload");
        }
        Ok(out) => {
            tracing::debug!(plugin = %plugin_name, exit_code = out.exit_code, "Reload trigger failed");
        }
        Err(e) => tracing::debug!(plugin = %plugin_name, "Could not trigger reload: {}", e),
    }
}

struct ActiveWatch {
    plugin_dir: PathBuf,
    container: String,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Summary of an active registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSync {
    pub plugin_name: String,
    pub plugin_dir: PathBuf,
    pub container: String,
}

/// Owns the watch registrations.
pub struct LiveSyncEngine {
    runtime: Arc<dyn ContainerRuntime>,
    config: SyncConfig,
    filter: Arc<WatchFilter>,
    registry: Mutex<BTreeMap<String, ActiveWatch>>,
}

impl LiveSyncEngine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &SyncConfig) -> Result<Self> {
        let filter = WatchFilter::new(&config.watch_extensions[..], &config.ignore_patterns[..])?;
        Ok(Self {
            runtime,
            config: config.clone(),
            filter: Arc::new(filter),
            registry: Mutex::new(BTreeMap::new()),
        })
    }

    /// Load the manifest from `plugin_dir` and start watching it.
    ///
    /// `container` defaults to the configured core container. Returns the
    /// plugin name.
    pub async fn start(&self, plugin_dir: &Path, container: Option<&str>) -> Result<String> {
        let manifest = PluginManifest::load(plugin_dir)?;
        self.start_with_manifest(&manifest, plugin_dir, container)
            .await?;
        Ok(manifest.name)
    }

    /// Start watching `plugin_dir` under the manifest's name. A second call
    /// for an already-active plugin is a no-op.
    pub async fn start_with_manifest(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
        container: Option<&str>,
    ) -> Result<()> {
        let mut registry = self.registry.lock().await;
        if registry.contains_key(&manifest.name) {
            tracing::debug!(plugin = %manifest.name, "Live sync already active");
            return Ok(());
        }

        // Watchers report resolved paths (symlinks, /private on macOS).
        let plugin_dir = tokio::fs::canonicalize(plugin_dir).await?;
        let container = container
            .unwrap_or(&self.config.core_container)
            .to_string();

        let (event_tx, event_rx) = mpsc::channel::<notify::Result<notify::Event>>(256);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| SyncError::Watch {
            path: plugin_dir.clone(),
            reason: e.to_string(),
        })?;
        watcher
            .watch(&plugin_dir, RecursiveMode::Recursive)
            .map_err(|e| SyncError::Watch {
                path: plugin_dir.clone(),
                reason: e.to_string(),
            })?;

        let registration = WatchRegistration::new(
            manifest.name.clone(),
            plugin_dir.clone(),
            container.clone(),
            &self.config.plugin_root,
            Arc::clone(&self.filter),
            self.config.debounce,
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = WatchTask {
            runtime: Arc::clone(&self.runtime),
            plugin_root: self.config.plugin_root.clone(),
            reload_pattern: self.config.reload_pattern.clone(),
            registration,
        };
        let handle = tokio::spawn(task.run(watcher, event_rx, stop_rx));

        tracing::info!(
            plugin = %manifest.name,
            container = %container,
            "Live sync started for {}",
            plugin_dir.display()
        );
        registry.insert(
            manifest.name.clone(),
            ActiveWatch {
                plugin_dir,
                container,
                stop_tx,
                handle,
            },
        );
        Ok(())
    }

    /// Stop one registration. Returns `false` when none was active.
    pub async fn stop(&self, plugin_name: &str) -> bool {
        let Some(active) = self.registry.lock().await.remove(plugin_name) else {
            tracing::debug!(plugin = %plugin_name, "No live sync active");
            return false;
        };

        let _ = active.stop_tx.send(true);
        if tokio::time::timeout(self.config.join_timeout, active.handle)
            .await
            .is_err()
        {
            tracing::warn!(plugin = %plugin_name, "Watch task did not exit in time, abandoning it");
        }
        tracing::info!(plugin = %plugin_name, "Live sync stopped");
        true
    }

    pub async fn stop_all(&self) {
        let names: Vec<String> = self.registry.lock().await.keys().cloned().collect();
        for name in names {
            self.stop(&name).await;
        }
    }

    pub async fn active(&self) -> Vec<ActiveSync> {
        self.registry
            .lock()
            .await
            .iter()
            .map(|(name, active)| ActiveSync {
                plugin_name: name.clone(),
                plugin_dir: active.plugin_dir.clone(),
                container: active.container.clone(),
            })
            .collect()
    }

    /// Copy every mount mapping into the container, then trigger a reload.
    /// Returns the number of directories pushed.
    pub async fn mirror(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
        container: Option<&str>,
    ) -> Result<usize> {
        let container = container.unwrap_or(&self.config.core_container);
        let record = self.runtime.status(container).await?;
        if !record.is_running() {
            return Err(SyncError::TargetNotRunning(container.to_string()));
        }

        let mappings = manifest.mount_mappings(plugin_dir, &self.config.plugin_root);
        let filter = Arc::clone(&self.filter);
        let skip_ignored: TreeFilter = Arc::new(move |rel: &Path| !filter.is_ignored(rel));
        for mapping in &mappings {
            self.runtime
                .push_tree(
                    container,
                    &mapping.host,
                    &mapping.container,
                    Some(Arc::clone(&skip_ignored)),
                )
                .await?;
            tracing::info!(
                plugin = %manifest.name,
                "Mirrored {} -> {}",
                mapping.host.display(),
                mapping.container
            );
        }

        trigger_reload(
            self.runtime.as_ref(),
            container,
            &self.config.plugin_root,
            &manifest.name,
            &self.config.reload_pattern,
        )
        .await;
        Ok(mappings.len())
    }

    /// Delete the plugin's directory from the container.
    pub async fn unmirror(&self, plugin_name: &str, container: Option<&str>) -> Result<()> {
        let container = container.unwrap_or(&self.config.core_container);
        let dir = format!(
            "{}/{}",
            self.config.plugin_root.trim_end_matches('/'),
            plugin_name
        );
        let argv = vec!["rm".to_string(), "-rf".to_string(), dir.clone()];
        let out = self.runtime.exec(container, &argv).await?;
        if !out.success() {
            tracing::warn!(container = %container, "Failed to remove {}: {}", dir, out.output.trim());
        }
        Ok(())
    }
}

struct WatchTask {
    runtime: Arc<dyn ContainerRuntime>,
    plugin_root: String,
    reload_pattern: String,
    registration: WatchRegistration,
}

impl WatchTask {
    async fn run(
        mut self,
        watcher: RecommendedWatcher,
        mut events: mpsc::Receiver<notify::Result<notify::Event>>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        // Dropping the watcher ends OS-level watching.
        let _watcher = watcher;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                event = events.recv() => match event {
                    Some(Ok(event)) => self.handle(event).await,
                    Some(Err(e)) => {
                        tracing::warn!(plugin = %self.registration.plugin_name, "File watcher error: {}", e);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(plugin = %self.registration.plugin_name, "Watch task exiting");
    }

    async fn handle(&mut self, event: notify::Event) {
        let Some(kind) = ChangeKind::from_event(&event.kind) else {
            return;
        };

        for path in event.paths {
            let change = FileChange { path, kind };
            let Some(action) = self.registration.plan(&change, Instant::now()) else {
                continue;
            };

            let container = self.registration.container.clone();
            match apply(self.runtime.as_ref(), &container, &action).await {
                Ok(true) => {
                    trigger_reload(
                        self.runtime.as_ref(),
                        &container,
                        &self.plugin_root,
                        &self.registration.plugin_name,
                        &self.reload_pattern,
                    )
                    .await;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        plugin = %self.registration.plugin_name,
                        "Sync of {} failed: {}",
                        change.path.display(),
                        e
                    );
                }
            }
        }
    }
}
