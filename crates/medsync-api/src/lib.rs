// medsync-api: Async Rust client for the MedSync REST API and realtime channel

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod router;
pub mod transport;
pub mod websocket;

pub use client::ApiClient;
pub use error::Error;
pub use events::{ClientMessage, Decoded, RealtimeEvent, decode_frame};
pub use router::{Listener, Router, Subscription};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{Backoff, ConnectionState, ReconnectConfig, TransportClient};
