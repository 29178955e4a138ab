//! Domain layer for the signal memory
//!
//! This module contains the core models, errors and the ports implemented by
//! adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
