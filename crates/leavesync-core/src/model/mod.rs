// ── Domain model ──

pub mod event;
pub mod status;

pub use event::{ChangeEvent, ChangeKind, Details, EventSource, RefreshReason};
pub use status::{ActiveChannel, ConnectionState, NotifierStatus};
