// leavesync-core: Change-notification client with transport failover and local-first publishing

pub mod bus;
pub mod cache;
mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod notifier;
mod publisher;
pub mod status;

pub use bus::ChangeEventBus;
pub use cache::{CacheInvalidator, DEFAULT_CACHE_TTL, ReadCache};
pub use config::{NotifierConfig, TlsVerification};
pub use error::CoreError;
pub use handler::{
    ChangeHandler, FnHandler, HandlerError, HandlerResult, QueueHandler, change_queue, handler_fn,
};
pub use model::{
    ActiveChannel, ChangeEvent, ChangeKind, ConnectionState, Details, EventSource, NotifierStatus,
    RefreshReason,
};
pub use notifier::Notifier;
pub use status::StatusStream;
