//! Render-runtime boundary.
//!
//! The runtime owns the source files and the mounted document. Writing the
//! entry file triggers a reload; every successful mount bumps a counter that
//! subscribers observe through a `watch` channel.

use pw_core::dom::DomTree;
use pw_core::error::ParseError;
use pw_core::render::mount;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error("mount failed: {0}")]
    Mount(#[from] ParseError),
}

/// The live rendering environment a controller drives.
#[allow(async_fn_in_trait)]
pub trait RenderRuntime {
    /// Write a source file. Writing identical text is a no-op.
    async fn write_source_file(&self, path: &str, text: &str) -> Result<(), RuntimeError>;

    async fn read_source_file(&self, path: &str) -> Result<String, RuntimeError>;

    /// Mount counter; changes once per successful mount.
    fn subscribe_ready(&self) -> watch::Receiver<u64>;

    /// Current mount count, for polling when the ready signal is missed.
    fn mount_count(&self) -> u64;

    /// Run `f` against the mounted document. `None` while nothing is mounted.
    fn with_document<T>(&self, f: impl FnOnce(&mut DomTree) -> T) -> Option<T>;
}

/// When a written entry file gets mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// Mount synchronously inside the write.
    Immediate,
    /// Wait for [`MemoryRuntime::complete_pending`].
    Manual,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, String>,
    document: Option<DomTree>,
    pending: bool,
    writes: usize,
    unavailable: bool,
    last_error: Option<ParseError>,
}

#[derive(Debug)]
struct Shared {
    entry: String,
    mode: MountMode,
    state: Mutex<State>,
    ready: watch::Sender<u64>,
}

/// In-process runtime. Cloning yields another handle to the same session.
#[derive(Debug, Clone)]
pub struct MemoryRuntime {
    shared: Arc<Shared>,
}

impl MemoryRuntime {
    pub fn new(entry: &str, mode: MountMode) -> Self {
        let (ready, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                entry: entry.to_string(),
                mode,
                state: Mutex::new(State::default()),
                ready,
            }),
        }
    }

    /// A runtime with `text` already written to the entry file and mounted.
    pub fn with_entry(entry: &str, text: &str, mode: MountMode) -> Self {
        let runtime = Self::new(entry, mode);
        {
            let mut state = runtime.lock();
            state.files.insert(entry.to_string(), text.to_string());
            state.pending = true;
        }
        runtime.complete_pending();
        runtime
    }

    pub fn entry(&self) -> &str {
        &self.shared.entry
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mount the entry file if a reload is pending. Returns whether a mount
    /// succeeded. A failed mount leaves nothing mounted and sends no signal.
    pub fn complete_pending(&self) -> bool {
        let mut state = self.lock();
        if !state.pending {
            return false;
        }
        state.pending = false;
        let Some(text) = state.files.get(&self.shared.entry).cloned() else {
            return false;
        };
        match mount(&text) {
            Ok(document) => {
                state.document = Some(document);
                state.last_error = None;
                drop(state);
                self.shared.ready.send_modify(|n| *n += 1);
                log::debug!("mounted {} (mount #{})", self.shared.entry, self.mount_count());
                true
            }
            Err(err) => {
                log::warn!("mount of {} failed: {err}", self.shared.entry);
                state.document = None;
                state.last_error = Some(err);
                false
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending
    }

    /// Number of writes that changed a file.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn last_error(&self) -> Option<ParseError> {
        self.lock().last_error.clone()
    }

    /// Make subsequent writes fail, as when the preview process is down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

impl RenderRuntime for MemoryRuntime {
    async fn write_source_file(&self, path: &str, text: &str) -> Result<(), RuntimeError> {
        {
            let mut state = self.lock();
            if state.unavailable {
                return Err(RuntimeError::Unavailable(format!("cannot write {path}")));
            }
            if state.files.get(path).is_some_and(|old| old == text) {
                log::trace!("write to {path} unchanged; skipped");
                return Ok(());
            }
            state.files.insert(path.to_string(), text.to_string());
            state.writes += 1;
            if path != self.shared.entry {
                return Ok(());
            }
            state.pending = true;
        }
        if self.shared.mode == MountMode::Immediate {
            self.complete_pending();
        }
        Ok(())
    }

    async fn read_source_file(&self, path: &str) -> Result<String, RuntimeError> {
        let state = self.lock();
        if state.unavailable {
            return Err(RuntimeError::Unavailable(format!("cannot read {path}")));
        }
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(path.to_string()))
    }

    fn subscribe_ready(&self) -> watch::Receiver<u64> {
        self.shared.ready.subscribe()
    }

    fn mount_count(&self) -> u64 {
        *self.shared.ready.borrow()
    }

    fn with_document<T>(&self, f: impl FnOnce(&mut DomTree) -> T) -> Option<T> {
        let mut state = self.lock();
        state.document.as_mut().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRC: &str = "<div data-tag=\"root\"><p data-tag=\"a\">A</p></div>";

    #[tokio::test]
    async fn immediate_mount_signals_ready() {
        let rt = MemoryRuntime::new("src/App.jsx", MountMode::Immediate);
        let mut rx = rt.subscribe_ready();
        assert_eq!(rt.with_document(|_| ()), None);
        rt.write_source_file("src/App.jsx", SRC).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(rt.with_document(|d| d.find_by_tag("a").is_some()), Some(true));
    }

    #[tokio::test]
    async fn identical_write_is_noop() {
        let rt = MemoryRuntime::with_entry("src/App.jsx", SRC, MountMode::Immediate);
        assert_eq!(rt.mount_count(), 1);
        rt.write_source_file("src/App.jsx", SRC).await.unwrap();
        assert_eq!(rt.mount_count(), 1);
        assert_eq!(rt.write_count(), 0);
    }

    #[tokio::test]
    async fn manual_mount_waits() {
        let rt = MemoryRuntime::with_entry("src/App.jsx", SRC, MountMode::Manual);
        let next = SRC.replace("A</p>", "B</p>");
        rt.write_source_file("src/App.jsx", &next).await.unwrap();
        assert!(rt.has_pending());
        assert_eq!(rt.mount_count(), 1);
        // The previous document stays up until the reload lands.
        assert_eq!(
            rt.with_document(|d| d.find_by_tag("a").map(|h| d.text_content(h))),
            Some(Some("A".to_string()))
        );
        assert!(rt.complete_pending());
        assert_eq!(rt.mount_count(), 2);
    }

    #[tokio::test]
    async fn failed_mount_sends_no_signal() {
        let rt = MemoryRuntime::with_entry("src/App.jsx", SRC, MountMode::Immediate);
        rt.write_source_file("src/App.jsx", "<div data-tag=\"root\"><p></div>")
            .await
            .unwrap();
        assert_eq!(rt.mount_count(), 1);
        assert!(rt.last_error().is_some());
        assert_eq!(rt.with_document(|_| ()), None);
    }

    #[tokio::test]
    async fn unavailable_and_missing_files() {
        let rt = MemoryRuntime::new("src/App.jsx", MountMode::Immediate);
        assert_eq!(
            rt.read_source_file("src/App.jsx").await,
            Err(RuntimeError::NotFound("src/App.jsx".to_string()))
        );
        rt.set_unavailable(true);
        assert!(matches!(
            rt.write_source_file("src/App.jsx", SRC).await,
            Err(RuntimeError::Unavailable(_))
        ));
        // Non-entry files never trigger a mount.
        rt.set_unavailable(false);
        rt.write_source_file("src/theme.css", "body {}").await.unwrap();
        assert_eq!(rt.mount_count(), 0);
        assert_eq!(rt.write_count(), 1);
    }
}
