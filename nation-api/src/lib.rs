//! # Nation API Server Library
//!
//! This library provides the core functionality for the Nation API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON and query extractors that reject with `ApiError`
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
