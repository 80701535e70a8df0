//! Synchronization controller: edit → regenerate → write → reload → rescan.
//!
//! One controller per source document. It owns its runtime handle and runs
//! on a single logical thread of control (`&mut self`); runtime calls are the
//! only suspension points.
//!
//! - **Source edits** (insert, remove, undo, external text) splice the source
//!   text directly. The live DOM is behind until the next reload.
//! - **DOM edits** (property, visibility, lock) land on the live DOM; the
//!   source is regenerated from it at write-out.
//!
//! DOM edits never run against a DOM that is behind the source: they wait
//! in the queue until the reload that catches the DOM up has landed.

use crate::bridge::{self, BridgeError, LayerControls, SelectedElement};
use crate::history::History;
use crate::ops;
use crate::runtime::{RenderRuntime, RuntimeError};
use pw_core::dom::DomHandle;
use pw_core::error::{GenerateError, SpliceError, TagError};
use pw_core::generator::{GeneratorConfig, regenerate};
use pw_core::id::{ElementTag, TagAllocator};
use pw_core::scanner::{LayerTree, ScanOutcome, scan};
use pw_core::splice;
use smallvec::SmallVec;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Source, file, and DOM agree.
    Clean,
    /// Edits applied that have not been written.
    Dirty,
    /// Written; waiting for the runtime to remount.
    Reloading,
    /// A write or reload failed. Layer data is not current.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How long to wait for the ready signal before polling.
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Retries allowed from `Stale` before giving up.
    pub max_retries: u32,
    pub history_depth: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            max_poll_attempts: 20,
            max_retries: 3,
            history_depth: 100,
        }
    }
}

/// An edit request. This is also the whole surface offered to assistants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Insert {
        fragment: String,
        anchor_hint: Option<ElementTag>,
    },
    Remove {
        target: ElementTag,
    },
    ApplyProperty {
        target: ElementTag,
        property: String,
        value: String,
    },
    SetVisible {
        target: ElementTag,
        visible: bool,
    },
    SetLocked {
        target: ElementTag,
        locked: bool,
    },
}

impl EditOp {
    fn touches_dom(&self) -> bool {
        matches!(
            self,
            EditOp::ApplyProperty { .. } | EditOp::SetVisible { .. } | EditOp::SetLocked { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            EditOp::Insert { .. } => "insert element".to_string(),
            EditOp::Remove { target } => format!("remove {target}"),
            EditOp::ApplyProperty { target, property, .. } => format!("set {property} on {target}"),
            EditOp::SetVisible { target, visible: true } => format!("show {target}"),
            EditOp::SetVisible { target, visible: false } => format!("hide {target}"),
            EditOp::SetLocked { target, locked: true } => format!("lock {target}"),
            EditOp::SetLocked { target, locked: false } => format!("unlock {target}"),
        }
    }
}

/// Issued by a write; identifies the reload that must be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    pub generation: u64,
    /// Runtime mount count before the write.
    pub mounts_before: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDisposition {
    /// The rescan is current and installed.
    Installed { generation: u64, layers: usize },
    /// The reloaded document holds no tagged elements.
    Empty { generation: u64 },
    /// A newer write superseded this reload; its scan was dropped.
    Discarded { generation: u64, latest: u64 },
}

/// What the UI shows about a document's sync state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub generation: u64,
    pub layers_stale: bool,
    pub message: Option<String>,
    pub retryable: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Splice(#[from] SpliceError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("reload {generation} was not observed in time")]
    ReloadTimeout { generation: u64 },

    #[error("document is stale; retry to re-sync")]
    Stale,

    #[error("a reload is in flight")]
    Busy,

    #[error("gave up after {0} retries")]
    RetriesExhausted(u32),
}

impl SyncError {
    /// Whether `retry()` can help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ReloadTimeout { .. }
                | SyncError::Stale
                | SyncError::Runtime(RuntimeError::Unavailable(_))
        )
    }
}

pub struct SyncController<R: RenderRuntime> {
    runtime: R,
    path: String,
    config: SyncConfig,
    state: SyncState,

    /// Current source text, including unwritten edits.
    source: String,
    /// Last text handed to the runtime.
    written: String,
    /// The live DOM has edits not yet folded into `source`.
    dom_edited: bool,
    /// `source` has edits the live DOM has not been reloaded with.
    dom_behind: bool,

    generation: u64,
    pending: Option<ReloadTicket>,
    queue: SmallVec<[EditOp; 4]>,

    layers: Option<LayerTree>,
    layers_generation: u64,
    layers_stale: bool,
    selection: Option<SelectedElement>,

    tags: TagAllocator,
    controls: LayerControls,
    history: History,
    descriptions: Vec<String>,
    restoring: bool,
    retries: u32,
    last_error: Option<SyncError>,
    /// First queued edit that failed since the last flush.
    dropped: Option<SyncError>,
}

impl<R: RenderRuntime> SyncController<R> {
    /// Take over a document whose text is already known. If the runtime has
    /// it mounted, the initial scan is installed as generation 0.
    pub fn new(runtime: R, path: &str, source: &str, config: SyncConfig) -> Self {
        let history = History::new(config.history_depth);
        let mut controller = Self {
            runtime,
            path: path.to_string(),
            config,
            state: SyncState::Clean,
            source: source.to_string(),
            written: source.to_string(),
            dom_edited: false,
            dom_behind: false,
            generation: 0,
            pending: None,
            queue: SmallVec::new(),
            layers: None,
            layers_generation: 0,
            layers_stale: true,
            selection: None,
            tags: TagAllocator::new(),
            controls: LayerControls::new(),
            history,
            descriptions: Vec::new(),
            restoring: false,
            retries: 0,
            last_error: None,
            dropped: None,
        };
        for tag in splice::source_tags(source).unwrap_or_default() {
            controller.tags.reserve(tag);
        }
        controller.install_scan(0);
        controller
    }

    /// Recover a document from the runtime when no in-memory copy exists.
    pub async fn attach(runtime: R, path: &str, config: SyncConfig) -> Result<Self, SyncError> {
        let source = runtime.read_source_file(path).await?;
        log::debug!("attached to {path} ({} bytes)", source.len());
        Ok(Self::new(runtime, path, &source, config))
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Current layers. `None` while stale.
    pub fn layers(&self) -> Option<&LayerTree> {
        if self.layers_stale {
            None
        } else {
            self.layers.as_ref()
        }
    }

    /// Last installed layers and their generation, current or not.
    pub fn last_layers(&self) -> Option<(&LayerTree, u64)> {
        self.layers.as_ref().map(|l| (l, self.layers_generation))
    }

    pub fn selection(&self) -> Option<&SelectedElement> {
        self.selection.as_ref()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state,
            generation: self.generation,
            layers_stale: self.layers_stale,
            message: self.last_error.as_ref().map(ToString::to_string),
            retryable: self.last_error.as_ref().is_some_and(SyncError::is_retryable),
        }
    }

    // ─── Identity and selection ──────────────────────────────────────────

    /// Assign a fresh tag, unique against the live DOM, the current source,
    /// and everything issued this session.
    pub fn assign_tag(&mut self, hint: &str) -> Result<ElementTag, SyncError> {
        let in_source = splice::source_tags(&self.source).unwrap_or_default();
        let tags = &mut self.tags;
        let tag = self
            .runtime
            .with_document(|doc| {
                tags.assign_with(hint, |t| {
                    doc.find_by_tag(t).is_some() || in_source.iter().any(|e| e.as_str() == t)
                })
            })
            .ok_or(TagError::DocumentNotLoaded)?;
        Ok(tag)
    }

    pub fn select(&mut self, tag: ElementTag) -> Result<SelectedElement, SyncError> {
        let selected = self
            .runtime
            .with_document(|doc| {
                let handle = doc.find_by_tag(tag.as_str()).ok_or(BridgeError::NotFound(tag))?;
                bridge::select_at(doc, handle)
            })
            .ok_or(TagError::DocumentNotLoaded)??;
        self.selection = Some(selected.clone());
        Ok(selected)
    }

    /// Select by live handle, as from a click in the preview.
    pub fn select_handle(&mut self, handle: DomHandle) -> Result<SelectedElement, SyncError> {
        let selected = self
            .runtime
            .with_document(|doc| bridge::select_at(doc, handle))
            .ok_or(TagError::DocumentNotLoaded)??;
        self.selection = Some(selected.clone());
        Ok(selected)
    }

    pub fn clear_selection(&mut self) {
        self.runtime.with_document(bridge::clear_selection);
        self.selection = None;
    }

    // ─── Edits ───────────────────────────────────────────────────────────

    /// Accept an edit. While a reload is in flight, or while a DOM edit
    /// would run against a DOM that is behind the source, the edit is queued
    /// and applied after the next reload.
    pub fn submit(&mut self, op: EditOp) -> Result<(), SyncError> {
        let must_wait = self.state == SyncState::Reloading
            || !self.queue.is_empty()
            || (self.dom_behind && op.touches_dom());
        if must_wait {
            log::debug!("queued {} ({} pending)", op.describe(), self.queue.len() + 1);
            self.queue.push(op);
            return Ok(());
        }
        self.apply(op)
    }

    /// Replace the source text wholesale, as from the code editor.
    pub fn set_source(&mut self, text: &str) -> Result<(), SyncError> {
        if self.state == SyncState::Reloading {
            return Err(SyncError::Busy);
        }
        self.replace_source(text.to_string(), "edit source");
        Ok(())
    }

    /// Step back one settled write. Call [`flush`](Self::flush) to sync it.
    pub fn undo(&mut self) -> Result<bool, SyncError> {
        if self.state == SyncState::Reloading || !self.queue.is_empty() {
            return Err(SyncError::Busy);
        }
        let Some(step) = self.history.undo() else {
            return Ok(false);
        };
        let (text, description) = (step.text_before.clone(), format!("undo {}", step.description));
        self.replace_source(text, &description);
        self.restoring = true;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, SyncError> {
        if self.state == SyncState::Reloading || !self.queue.is_empty() {
            return Err(SyncError::Busy);
        }
        let Some(step) = self.history.redo() else {
            return Ok(false);
        };
        let (text, description) = (step.text_after.clone(), format!("redo {}", step.description));
        self.replace_source(text, &description);
        self.restoring = true;
        Ok(true)
    }

    fn replace_source(&mut self, text: String, description: &str) {
        self.source = text;
        self.dom_edited = false;
        self.dom_behind = true;
        self.mark_dirty(description);
    }

    /// `Stale` is sticky: edits still apply, but only `retry` leaves it.
    fn mark_dirty(&mut self, description: &str) {
        self.descriptions.push(description.to_string());
        self.restoring = false;
        if self.state != SyncState::Stale {
            self.state = SyncState::Dirty;
        }
    }

    fn apply(&mut self, op: EditOp) -> Result<(), SyncError> {
        let description = op.describe();
        match &op {
            EditOp::Insert { fragment, anchor_hint } => {
                self.fold_dom_edits()?;
                let inserted = ops::insert_fragment(&self.source, fragment, *anchor_hint, &mut self.tags)?;
                log::debug!("inserted {} ({:?})", inserted.tag, inserted.anchor);
                self.source = inserted.source;
                self.dom_behind = true;
            }
            EditOp::Remove { target } => {
                let target = *target;
                self.fold_dom_edits()?;
                let removed = splice::remove(&self.source, target)?;
                log::debug!("removed {target} (lines {}-{})", removed.first_line, removed.last_line);
                if self.selection.as_ref().is_some_and(|s| s.tag == target) {
                    self.selection = None;
                }
                self.source = removed.source;
                self.dom_behind = true;
            }
            EditOp::ApplyProperty { target, .. }
            | EditOp::SetVisible { target, .. }
            | EditOp::SetLocked { target, .. } => {
                let controls = &mut self.controls;
                let updated = self
                    .runtime
                    .with_document(|doc| ops::apply_dom_edit(doc, controls, &op))
                    .ok_or(TagError::DocumentNotLoaded)??;
                if let Some(updated) = updated
                    && self.selection.as_ref().is_some_and(|s| s.tag == *target)
                {
                    self.selection = Some(updated);
                }
                self.dom_edited = true;
            }
        }
        self.mark_dirty(&description);
        Ok(())
    }

    /// Regenerate `source` from the live DOM if it carries unfolded edits.
    fn fold_dom_edits(&mut self) -> Result<(), SyncError> {
        if !self.dom_edited {
            return Ok(());
        }
        let config = GeneratorConfig::from_source(&self.source);
        let text = self
            .runtime
            .with_document(|doc| regenerate(doc, &config))
            .ok_or(TagError::DocumentNotLoaded)??;
        self.source = text;
        self.dom_edited = false;
        Ok(())
    }

    // ─── Write-out and reload ────────────────────────────────────────────

    /// Regenerate if needed and write. Returns `None` when there was nothing
    /// to write; identical text is never re-written.
    pub async fn write_out(&mut self) -> Result<Option<ReloadTicket>, SyncError> {
        if self.state != SyncState::Dirty {
            return Ok(None);
        }
        self.fold_dom_edits()?;
        if self.source == self.written {
            log::debug!("{}: source unchanged; nothing to write", self.path);
            self.descriptions.clear();
            self.dom_behind = false;
            if self.pending.is_some() {
                self.state = SyncState::Stale;
            } else {
                // The mounted DOM is current, so held DOM edits can run.
                self.state = SyncState::Clean;
                self.drain_queue();
            }
            return Ok(None);
        }

        let mounts_before = self.runtime.mount_count();
        if let Err(err) = self.runtime.write_source_file(&self.path, &self.source).await {
            log::warn!("write of {} failed: {err}", self.path);
            self.state = SyncState::Stale;
            self.layers_stale = true;
            return Err(err.into());
        }

        let description = self.descriptions.join(", ");
        self.descriptions.clear();
        if !self.restoring {
            self.history.record(&self.written, &self.source, &description);
        }
        self.restoring = false;
        self.written = self.source.clone();
        self.generation += 1;
        let ticket = ReloadTicket {
            generation: self.generation,
            mounts_before,
        };
        self.pending = Some(ticket);
        self.state = SyncState::Reloading;
        log::debug!("{}: wrote generation {} ({description})", self.path, self.generation);
        Ok(Some(ticket))
    }

    /// Wait for the reload a ticket stands for, then rescan.
    ///
    /// A ticket older than the latest write yields
    /// [`ScanDisposition::Discarded`] and leaves the controller untouched.
    pub async fn await_reload(&mut self, ticket: ReloadTicket) -> Result<ScanDisposition, SyncError> {
        if !self.wait_ready(ticket).await {
            log::warn!("{}: reload {} not observed", self.path, ticket.generation);
            if self.pending == Some(ticket) {
                self.state = SyncState::Stale;
                self.layers_stale = true;
            }
            return Err(SyncError::ReloadTimeout {
                generation: ticket.generation,
            });
        }
        if ticket.generation < self.generation {
            log::debug!(
                "dropping scan for generation {} (latest {})",
                ticket.generation,
                self.generation
            );
            return Ok(ScanDisposition::Discarded {
                generation: ticket.generation,
                latest: self.generation,
            });
        }

        self.pending = None;
        self.state = SyncState::Clean;
        self.dom_behind = false;
        self.retries = 0;
        let disposition = self.install_scan(ticket.generation);
        self.drain_queue();
        Ok(disposition)
    }

    /// Ready signal first, then a bounded polling fallback on the counter.
    async fn wait_ready(&self, ticket: ReloadTicket) -> bool {
        let before = ticket.mounts_before;
        let mut rx = self.runtime.subscribe_ready();
        let signalled = matches!(
            timeout(self.config.ready_timeout, rx.wait_for(|&n| n > before)).await,
            Ok(Ok(_))
        );
        if signalled {
            return true;
        }
        log::debug!("no ready signal for generation {}; polling", ticket.generation);
        for _ in 0..self.config.max_poll_attempts {
            if self.runtime.mount_count() > before {
                return true;
            }
            sleep(self.config.poll_interval).await;
        }
        self.runtime.mount_count() > before
    }

    fn install_scan(&mut self, generation: u64) -> ScanDisposition {
        let Some(outcome) = self.runtime.with_document(|doc| scan(doc)) else {
            self.layers_stale = true;
            return ScanDisposition::Empty { generation };
        };
        self.layers_generation = generation;
        self.layers_stale = false;
        let disposition = match outcome {
            ScanOutcome::Layers(tree) => {
                for layer in tree.iter() {
                    self.tags.reserve(layer.tag);
                }
                let count = tree.len();
                self.layers = Some(tree);
                ScanDisposition::Installed {
                    generation,
                    layers: count,
                }
            }
            ScanOutcome::Empty => {
                self.layers = None;
                ScanDisposition::Empty { generation }
            }
        };
        // The reloaded DOM has no selection marker; re-select by tag.
        if let Some(tag) = self.selection.as_ref().map(|s| s.tag) {
            self.selection = self
                .runtime
                .with_document(|doc| {
                    let handle = doc.find_by_tag(tag.as_str())?;
                    bridge::select_at(doc, handle).ok()
                })
                .flatten();
        }
        disposition
    }

    /// Apply queued edits in order. A failing edit is dropped and its error
    /// kept for the next [`flush`](Self::flush); the rest still apply.
    ///
    /// Afterwards the queue only holds DOM edits waiting on a source change,
    /// so the state is never `Clean` with edits queued.
    fn drain_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        log::debug!("applying {} queued edit(s)", self.queue.len());
        let mut rest = std::mem::take(&mut self.queue).into_iter();
        while let Some(op) = rest.next() {
            if self.dom_behind && op.touches_dom() {
                self.queue.push(op);
                self.queue.extend(rest);
                break;
            }
            let description = op.describe();
            if let Err(err) = self.apply(op) {
                log::warn!("{}: dropped queued edit ({description}): {err}", self.path);
                self.dropped.get_or_insert(err);
            }
        }
    }

    /// Stop waiting on the in-flight reload and apply queued edits now.
    /// The superseded reload's scan is discarded if it is awaited later.
    ///
    /// Returns `false` when there is nothing that can run yet. If a queued
    /// edit fails, the others are still applied and its error is returned.
    pub fn supersede(&mut self) -> Result<bool, SyncError> {
        let runnable = self
            .queue
            .first()
            .is_some_and(|op| !(self.dom_behind && op.touches_dom()));
        if self.state != SyncState::Reloading || !runnable {
            return Ok(false);
        }
        log::debug!("superseding reload {}", self.generation);
        self.pending = None;
        self.state = SyncState::Dirty;
        self.drain_queue();
        match self.dropped.take() {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }

    /// Write and reload until nothing is left to sync.
    pub async fn flush(&mut self) -> Result<SyncStatus, SyncError> {
        if self.state == SyncState::Stale {
            return Err(SyncError::Stale);
        }
        loop {
            if self.state == SyncState::Reloading
                && let Some(ticket) = self.pending
            {
                self.await_reload(ticket).await?;
                continue;
            }
            match self.write_out().await? {
                Some(ticket) => {
                    self.await_reload(ticket).await?;
                }
                // Held DOM edits were released by an identical write.
                None if self.state == SyncState::Dirty => {}
                None => break,
            }
        }
        if let Some(err) = self.dropped.take() {
            return Err(err);
        }
        self.last_error = None;
        Ok(self.status())
    }

    /// Leave `Stale`: re-issue the write and wait for its reload again.
    pub async fn retry(&mut self) -> Result<SyncStatus, SyncError> {
        if self.state != SyncState::Stale {
            return Ok(self.status());
        }
        if self.retries >= self.config.max_retries {
            return Err(SyncError::RetriesExhausted(self.retries));
        }
        self.retries += 1;
        log::debug!("{}: retry {} of {}", self.path, self.retries, self.config.max_retries);
        let unwritten = self.dom_edited || self.source != self.written;
        match self.pending {
            Some(_) if !unwritten => {
                if let Err(err) = self.runtime.write_source_file(&self.path, &self.written).await {
                    log::warn!("rewrite of {} failed: {err}", self.path);
                    return Err(err.into());
                }
                self.state = SyncState::Reloading;
            }
            _ => {
                // Newer edits supersede the unconfirmed write.
                self.pending = None;
                self.state = SyncState::Dirty;
            }
        }
        self.flush().await
    }

    // ─── Error boundary ──────────────────────────────────────────────────

    /// Submit and sync one edit, reporting any failure as a status message.
    pub async fn edit(&mut self, op: EditOp) -> SyncStatus {
        let result = match self.submit(op) {
            Ok(()) => self.flush().await,
            Err(err) => Err(err),
        };
        self.report(result)
    }

    /// [`retry`](Self::retry) behind the same error boundary as [`edit`](Self::edit).
    pub async fn retry_status(&mut self) -> SyncStatus {
        let result = self.retry().await;
        self.report(result)
    }

    fn report(&mut self, result: Result<SyncStatus, SyncError>) -> SyncStatus {
        match result {
            Ok(status) => status,
            Err(err) => {
                log::warn!("{}: {err}", self.path);
                if self.state == SyncState::Reloading {
                    self.state = SyncState::Stale;
                    self.layers_stale = true;
                }
                self.last_error = Some(err);
                self.status()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MemoryRuntime, MountMode};
    use pretty_assertions::assert_eq;

    const SRC: &str = r#"export default function App() {
  return (
    <div data-tag="root">
      <div data-tag="container">
        <p data-tag="para">Hello</p>
      </div>
    </div>
  );
}
"#;

    fn controller(mode: MountMode) -> SyncController<MemoryRuntime> {
        let rt = MemoryRuntime::with_entry("src/App.jsx", SRC, mode);
        SyncController::new(rt, "src/App.jsx", SRC, SyncConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn initial_scan_installed() {
        let ctl = controller(MountMode::Immediate);
        assert_eq!(ctl.state(), SyncState::Clean);
        assert_eq!(ctl.layers().map(LayerTree::len), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn edit_walks_the_states() {
        let mut ctl = controller(MountMode::Immediate);
        ctl.submit(EditOp::Insert {
            fragment: r#"<button data-tag="btn">Go</button>"#.to_string(),
            anchor_hint: None,
        })
        .unwrap();
        assert_eq!(ctl.state(), SyncState::Dirty);
        let ticket = ctl.write_out().await.unwrap().unwrap();
        assert_eq!(ctl.state(), SyncState::Reloading);
        assert_eq!(ticket, ReloadTicket { generation: 1, mounts_before: 1 });
        let disposition = ctl.await_reload(ticket).await.unwrap();
        assert_eq!(disposition, ScanDisposition::Installed { generation: 1, layers: 4 });
        assert_eq!(ctl.state(), SyncState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_text_is_not_rewritten() {
        let mut ctl = controller(MountMode::Immediate);
        let status = ctl
            .edit(EditOp::ApplyProperty {
                target: ElementTag::intern("para"),
                property: "style.color".to_string(),
                value: "red".to_string(),
            })
            .await;
        assert_eq!(status.state, SyncState::Clean);
        assert_eq!(ctl.runtime().write_count(), 1);

        // Setting the same value again regenerates identical text.
        let status = ctl
            .edit(EditOp::ApplyProperty {
                target: ElementTag::intern("para"),
                property: "style.color".to_string(),
                value: "red".to_string(),
            })
            .await;
        assert_eq!(status.state, SyncState::Clean);
        assert_eq!(ctl.runtime().write_count(), 1);
        assert_eq!(ctl.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_become_status_messages() {
        let mut ctl = controller(MountMode::Immediate);
        let status = ctl
            .edit(EditOp::Remove {
                target: ElementTag::intern("ghost"),
            })
            .await;
        assert_eq!(status.state, SyncState::Clean);
        assert_eq!(status.message.as_deref(), Some("tag not found: ghost"));
        assert!(!status.retryable);
        assert_eq!(ctl.source(), SRC);
    }

    #[tokio::test(start_paused = true)]
    async fn dom_edit_waits_for_spliced_source() {
        let mut ctl = controller(MountMode::Immediate);
        ctl.submit(EditOp::Insert {
            fragment: r#"<h2 data-tag="sub">Sub</h2>"#.to_string(),
            anchor_hint: None,
        })
        .unwrap();
        // `sub` is not in the live DOM yet.
        ctl.submit(EditOp::ApplyProperty {
            target: ElementTag::intern("sub"),
            property: "textContent".to_string(),
            value: "Subtitle".to_string(),
        })
        .unwrap();
        assert_eq!(ctl.queued(), 1);
        let status = ctl.flush().await.unwrap();
        assert_eq!(status.state, SyncState::Clean);
        assert_eq!(ctl.queued(), 0);
        assert!(ctl.source().contains(r#"<h2 data-tag="sub">Subtitle</h2>"#));
    }

    #[tokio::test(start_paused = true)]
    async fn assign_tag_checks_source_and_dom() {
        let mut ctl = controller(MountMode::Immediate);
        assert_eq!(ctl.assign_tag("para").unwrap().as_str(), "para-1");
        let fresh = ctl.assign_tag("Primary Button").unwrap();
        assert_eq!(fresh.as_str(), "primary-button");
        assert_ne!(ctl.assign_tag("Primary Button").unwrap(), fresh);

        let rt = MemoryRuntime::new("src/App.jsx", MountMode::Manual);
        let mut detached = SyncController::new(rt, "src/App.jsx", SRC, SyncConfig::default());
        assert_eq!(
            detached.assign_tag("x"),
            Err(SyncError::Tag(TagError::DocumentNotLoaded))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn selection_survives_reload() {
        let mut ctl = controller(MountMode::Immediate);
        ctl.select(ElementTag::intern("para")).unwrap();
        ctl.edit(EditOp::Insert {
            fragment: r#"<p data-tag="more">More</p>"#.to_string(),
            anchor_hint: None,
        })
        .await;
        let selected = ctl.selection().unwrap();
        assert_eq!(selected.tag, ElementTag::intern("para"));
        let marked = ctl
            .runtime()
            .with_document(|doc| {
                doc.find_by_tag("para")
                    .and_then(|h| doc.attribute(h, pw_core::id::SELECTED_ATTR))
                    .is_some()
            })
            .unwrap();
        assert!(marked);
        assert!(!ctl.source().contains("data-selected"));
    }
}
