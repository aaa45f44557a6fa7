//! Socket handling: per-connection state, the group registry, the session loop, and the heartbeat.

pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod session;
