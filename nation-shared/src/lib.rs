//! # Nation Shared Library
//!
//! This crate contains shared types, storage, authentication and agent
//! execution used by the Nation API server.
//!
//! ## Module Organization
//!
//! - `models`: Agents, chats, messages and their request shapes
//! - `store`: Storage trait with PostgreSQL and in-memory backends
//! - `db`: Connection pool and migrations for the PostgreSQL backend
//! - `auth`: Token verification (JWT, Privy, anonymous)
//! - `engine`: Agent engine trait, engines and the reply runner
//! - `redis`: Optional Redis client
//! - `ids`: Time-ordered identifier generation

pub mod auth;
pub mod db;
pub mod engine;
pub mod ids;
pub mod models;
pub mod redis;
pub mod store;

#[cfg(test)]
pub(crate) mod test_server;

/// Current version of the Nation shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
