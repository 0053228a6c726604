//! AllMiTools data-access and request audit core
//!
//! A PostgreSQL connection manager with bounded retry, the text storage and
//! request log DAOs built on it, and an asynchronous request-logging
//! middleware that never delays the response it records.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod request_logging;

pub use application::Application;
pub use error::{Error, Result};
