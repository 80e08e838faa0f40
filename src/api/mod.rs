//! Mines Game HTTP API
//!
//! Request-per-operation HTTP surface over the game engine. No background
//! workers live here; every endpoint runs a single engine operation to
//! completion.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{build_engine, ApiServer};
