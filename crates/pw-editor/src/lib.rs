pub mod bridge;
pub mod history;
pub mod ops;
pub mod runtime;
pub mod sync;

pub use bridge::{BridgeError, LayerControls, PropertyKey, SelectedElement, apply_property, select_at};
pub use history::{History, Snapshot};
pub use ops::{apply_dom_edit, insert_fragment};
pub use runtime::{MemoryRuntime, MountMode, RenderRuntime, RuntimeError};
pub use sync::{
    EditOp, ReloadTicket, ScanDisposition, SyncConfig, SyncController, SyncError, SyncState, SyncStatus,
};
