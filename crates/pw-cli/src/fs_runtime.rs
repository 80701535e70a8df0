//! Render runtime over a project directory.
//!
//! Files are read and written on disk. The entry file is mounted in-process
//! after every change, which stands in for the preview's hot reload.

use pw_core::dom::DomTree;
use pw_core::render::mount;
use pw_editor::runtime::{RenderRuntime, RuntimeError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

pub struct FsRuntime {
    root: PathBuf,
    entry: String,
    document: Mutex<Option<DomTree>>,
    ready: watch::Sender<u64>,
}

impl FsRuntime {
    /// Open `entry` (relative to `root`) and mount it.
    pub async fn open(root: &Path, entry: &str) -> Result<Self, RuntimeError> {
        let (ready, _) = watch::channel(0);
        let runtime = Self {
            root: root.to_path_buf(),
            entry: entry.to_string(),
            document: Mutex::new(None),
            ready,
        };
        let text = runtime.read_source_file(entry).await?;
        runtime.remount(&text)?;
        Ok(runtime)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn remount(&self, text: &str) -> Result<(), RuntimeError> {
        let mut slot = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        match mount(text) {
            Ok(document) => {
                *slot = Some(document);
                drop(slot);
                self.ready.send_modify(|n| *n += 1);
                Ok(())
            }
            Err(err) => {
                *slot = None;
                Err(err.into())
            }
        }
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RuntimeError {
    match err.kind() {
        ErrorKind::NotFound => RuntimeError::NotFound(path.display().to_string()),
        _ => RuntimeError::Unavailable(format!("{}: {err}", path.display())),
    }
}

impl RenderRuntime for FsRuntime {
    async fn write_source_file(&self, path: &str, text: &str) -> Result<(), RuntimeError> {
        let full = self.resolve(path);
        if tokio::fs::read_to_string(&full).await.is_ok_and(|old| old == text) {
            log::trace!("{} unchanged; skipped", full.display());
            return Ok(());
        }
        tokio::fs::write(&full, text)
            .await
            .map_err(|e| io_error(&full, e))?;
        log::debug!("wrote {} ({} bytes)", full.display(), text.len());
        if path == self.entry
            && let Err(err) = self.remount(text)
        {
            // The write stands; the ready signal just never comes.
            log::warn!("reload of {} failed: {err}", full.display());
        }
        Ok(())
    }

    async fn read_source_file(&self, path: &str) -> Result<String, RuntimeError> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_error(&full, e))
    }

    fn subscribe_ready(&self) -> watch::Receiver<u64> {
        self.ready.subscribe()
    }

    fn mount_count(&self) -> u64 {
        *self.ready.borrow()
    }

    fn with_document<T>(&self, f: impl FnOnce(&mut DomTree) -> T) -> Option<T> {
        let mut slot = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_mut().map(f)
    }
}
