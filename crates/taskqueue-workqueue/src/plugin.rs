//! Manifest-based plugin loader.
//!
//! A plugin is a TOML manifest named `{module}.toml` in a plugin directory:
//!
//! ```toml
//! namespace = "taskqueue.plugins"
//!
//! [[task]]
//! name = "audit"
//! handler = "append"
//! path = "audit.jsonl"   # relative to the manifest's directory
//!
//! [[task]]
//! name = "heartbeat"
//! handler = "log"
//! ```
//!
//! Each `[[task]]` registers one task type. Built-in handlers are `log`,
//! `append` (requires `path`) and `noop`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use taskqueue_daemon::{DaemonError, PluginLoader};
use tracing::{debug, info, warn};

use crate::error::WorkQueueError;
use crate::registry::{AppendHandler, LogHandler, NoopHandler, TaskHandler, TaskTypeRegistry};

/// Parsed plugin manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Namespace the plugin belongs to.
    pub namespace: String,
    /// Task types declared by the plugin.
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskDecl>,
}

/// One task type declared in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDecl {
    /// Task type name.
    pub name: String,
    /// Built-in handler kind.
    pub handler: String,
    /// Output file for the `append` handler.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TaskDecl {
    fn build(&self, base_dir: &Path) -> Result<Arc<dyn TaskHandler>, WorkQueueError> {
        match self.handler.as_str() {
            "log" => Ok(Arc::new(LogHandler)),
            "noop" => Ok(Arc::new(NoopHandler)),
            "append" => {
                let path = self.path.as_ref().ok_or_else(|| {
                    WorkQueueError::Plugin(format!("task '{}': append handler needs a path", self.name))
                })?;
                Ok(Arc::new(AppendHandler::new(base_dir.join(path))))
            }
            other => Err(WorkQueueError::Plugin(format!(
                "task '{}': unknown handler '{}'",
                self.name, other
            ))),
        }
    }
}

impl PluginManifest {
    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self, WorkQueueError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkQueueError::Plugin(format!("Failed to read {:?}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| WorkQueueError::Plugin(format!("Failed to parse {:?}: {}", path, e)))
    }
}

/// Loads plugin manifests into a [`TaskTypeRegistry`].
pub struct ManifestPluginLoader {
    directories: Vec<PathBuf>,
    registry: Arc<TaskTypeRegistry>,
}

impl ManifestPluginLoader {
    /// Create a loader searching `directories` for modules loaded by name.
    pub fn new(directories: Vec<PathBuf>, registry: Arc<TaskTypeRegistry>) -> Self {
        Self {
            directories,
            registry,
        }
    }

    /// The registry plugins are loaded into.
    pub fn registry(&self) -> &Arc<TaskTypeRegistry> {
        &self.registry
    }

    /// Register every task type of `manifest`, read from `path`.
    ///
    /// Nothing is registered unless all handlers build and no task type is
    /// already taken.
    fn install(&self, path: &Path, manifest: &PluginManifest) -> Result<(), WorkQueueError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut handlers = Vec::with_capacity(manifest.tasks.len());
        for decl in &manifest.tasks {
            if self.registry.contains(&decl.name) {
                return Err(WorkQueueError::Plugin(format!(
                    "{:?}: task type '{}' is already registered",
                    path, decl.name
                )));
            }
            handlers.push((decl.name.clone(), decl.build(base_dir)?));
        }

        for (name, handler) in handlers {
            self.registry.register(name, handler)?;
        }

        info!(
            "Loaded plugin {:?} ({} task type(s), namespace {})",
            path,
            manifest.tasks.len(),
            manifest.namespace
        );
        Ok(())
    }
}

impl PluginLoader for ManifestPluginLoader {
    fn load_plugin_by_name(&self, name: &str) -> Result<(), DaemonError> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(WorkQueueError::Plugin(format!("invalid module name '{}'", name)).into());
        }

        let file_name = format!("{}.toml", name);
        let path = self
            .directories
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                WorkQueueError::Plugin(format!(
                    "module '{}' not found in {:?}",
                    name, self.directories
                ))
            })?;

        let manifest = PluginManifest::from_file(&path)?;
        self.install(&path, &manifest)?;
        Ok(())
    }

    fn load_all_plugins(
        &self,
        directories: &[PathBuf],
        namespaces: &[String],
    ) -> Result<usize, DaemonError> {
        let mut loaded = 0;

        for dir in directories {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping plugin directory {:?}: {}", dir, e);
                    continue;
                }
            };

            let mut manifests: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
                .collect();
            manifests.sort();

            for path in manifests {
                let manifest = match PluginManifest::from_file(&path) {
                    Ok(manifest) => manifest,
                    Err(e) => {
                        warn!("Skipping plugin: {}", e);
                        continue;
                    }
                };

                if !namespaces.is_empty() && !namespaces.contains(&manifest.namespace) {
                    debug!(
                        "Skipping plugin {:?}: namespace {} not selected",
                        path, manifest.namespace
                    );
                    continue;
                }

                match self.install(&path, &manifest) {
                    Ok(()) => loaded += 1,
                    Err(e) => warn!("Skipping plugin: {}", e),
                }
            }
        }

        Ok(loaded)
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
