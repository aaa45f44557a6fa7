//! `SQLite` backend: connection pool, schema migrations and repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;
