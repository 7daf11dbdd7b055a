//! Directory-backed source store
//!
//! Unit `k` lives at `<root>/k.<unit extension>`. With watching enabled a
//! `notify` watcher publishes a [`SourceChanged`] for every created,
//! modified or removed file under the root.

use super::paths::{normalized_unit_path, resolve_relative};
use crate::config::SourceConfig;
use crate::error_ext::ErrorContext;
use exten_domain::UnitDefinition;
use exten_domain::error::{Error, Result};
use exten_domain::events::{ChangeFeed, SourceChanged};
use exten_domain::ports::SourceStore;
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Source store reading unit files from a directory
pub struct FileSystemSourceStore {
    root: PathBuf,
    unit_extension: String,
    changes: ChangeFeed<SourceChanged>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileSystemSourceStore {
    /// Open the store described by `config`, watching the root if asked to
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let store = Self::new(&config.root_dir, config.unit_extension.clone())?;
        if config.watch {
            store.watch()?;
        }
        Ok(store)
    }

    /// Open a store rooted at `root` without watching it
    pub fn new<P: AsRef<Path>>(root: P, unit_extension: String) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .io_context(format!("Failed to open source root {}", root.display()))?;
        if !root.is_dir() {
            return Err(Error::configuration(format!(
                "Source root {} is not a directory",
                root.display()
            )));
        }
        info!(root = %root.display(), extension = %unit_extension, "Opened source store");
        Ok(Self {
            root,
            unit_extension,
            changes: ChangeFeed::new(),
            watcher: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    /// Absolute location of a store path
    pub fn file_path(&self, store_path: &str) -> PathBuf {
        self.root.join(store_path)
    }

    /// Store path of an absolute file location, if it lies under the root
    pub fn store_path(&self, file: &Path) -> Option<String> {
        relative_store_path(&self.root, file)
    }

    /// Keys of every unit file under the root, sorted
    ///
    /// Library files are included; callers filter them with the preprocessor.
    pub fn unit_keys(&self) -> Result<Vec<String>> {
        let suffix = format!(".{}", self.unit_extension);
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.io_context("Failed to list source files")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(path) = self.store_path(entry.path())
                && let Some(key) = path.strip_suffix(&suffix)
            {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Start publishing change notifications; a no-op when already watching
    pub fn watch(&self) -> Result<()> {
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }

        let feed = self.changes.clone();
        let root = self.root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in &event.paths {
                        if let Some(store_path) = relative_store_path(&root, path) {
                            debug!(path = %store_path, "Source file changed");
                            feed.publish(&SourceChanged::new(store_path));
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Source watcher error"),
            },
            NotifyConfig::default(),
        )
        .config_context("Failed to create source watcher")?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .config_context(format!("Failed to watch {}", self.root.display()))?;

        info!(root = %self.root.display(), "Watching source root");
        *slot = Some(watcher);
        Ok(())
    }

    /// Stop publishing change notifications
    pub fn unwatch(&self) {
        if self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!(root = %self.root.display(), "Stopped watching source root");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn read(&self, store_path: &str) -> Result<Option<String>> {
        let file = self.file_path(store_path);
        match std::fs::read_to_string(&file) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_source(
                format!("Failed to read {}", file.display()),
                e,
            )),
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        _ => false,
    }
}

fn relative_store_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let segments: Vec<&str> = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;
    (!segments.is_empty()).then(|| segments.join("/"))
}

impl SourceStore for FileSystemSourceStore {
    fn resolve_source_text(&self, definition: &UnitDefinition) -> Result<Option<String>> {
        self.read(&normalized_unit_path(definition.key(), &self.unit_extension)?)
    }

    fn resolve_source_path(&self, definition: &UnitDefinition) -> Result<String> {
        normalized_unit_path(definition.key(), &self.unit_extension)
    }

    fn resolve_reference_text(&self, _definition: &UnitDefinition, path: &str) -> Result<String> {
        self.read(path)?
            .ok_or_else(|| Error::not_found(format!("referenced source {path}")))
    }

    fn resolve_reference_path(
        &self,
        _definition: &UnitDefinition,
        relative_path: &str,
        base_path: Option<&str>,
    ) -> Result<String> {
        resolve_relative(base_path, relative_path)
    }

    fn change_feed(&self) -> Option<&ChangeFeed<SourceChanged>> {
        Some(&self.changes)
    }

    fn store_name(&self) -> &str {
        "filesystem"
    }
}

impl fmt::Debug for FileSystemSourceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemSourceStore")
            .field("root", &self.root)
            .field("unit_extension", &self.unit_extension)
            .field("watching", &self.is_watching())
            .finish()
    }
}
