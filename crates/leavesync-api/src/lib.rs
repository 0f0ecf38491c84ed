// leavesync-api: Wire clients for the change-notification server (WebSocket + HTTP)

pub mod client;
pub mod error;
pub mod frames;
pub mod transport;
pub mod websocket;

pub use client::{PollResponse, TenantClient};
pub use error::Error;
pub use frames::{ChangesResponse, OutboundFrame, ServerEventFrame, SubscribeFrame};
pub use websocket::{ChannelSignal, WebSocketChannel};
