//! Request handlers.
//!
//! Handlers validate input, delegate to the store and storage service, and
//! map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod tryon;
