//! Try-on API server library.
//!
//! Exposes the building blocks (config, state, error handling, storage,
//! worker, routes) so integration tests and the binary entrypoint can both
//! access them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod storage;
pub mod transform;
pub mod worker;
