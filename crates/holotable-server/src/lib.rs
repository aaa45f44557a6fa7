//! # holotable-server
//!
//! Real-time group sessions over WebSocket.
//!
//! - **[`websocket`]**: per-socket connections, the group registry, the session loop, and
//!   the group heartbeat
//! - **[`bus`]**: decodes inbound events, runs ordered handler chains, records history,
//!   broadcasts the result to the event's group
//! - **[`handlers`]**: default chains backed by a [`holotable_store::SessionStore`]
//! - **[`server`]**: axum router (`/ws/{group}/{client}`, `/groups/{group}/state`,
//!   `/health`, `/metrics`) and graceful shutdown

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use bus::{BusError, DropReason, HandlerError, HistorySink, MessageBus, MessageHandler, Outcome};
pub use config::ServerConfig;
pub use server::HolotableServer;
pub use shutdown::ShutdownCoordinator;
pub use websocket::registry::{BroadcastReport, GroupRegistry};
