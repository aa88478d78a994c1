//! Config module.
//!
//! This module contains everything related to the user's
//! configuration.

pub mod credentials;
pub use credentials::*;
