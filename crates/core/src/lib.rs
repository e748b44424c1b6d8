//! Domain types for the try-on session backend.
//!
//! This crate has no internal dependencies and holds everything shared by
//! the store and API layers: the session status machine, the upload
//! validation rules, and the error taxonomy.

pub mod error;
pub mod session;
pub mod validation;
