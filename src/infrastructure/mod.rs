//! Infrastructure layer for AllMiTools
//!
//! This module contains the PostgreSQL connection manager, its registry, and
//! the data-access objects built on top of them.

pub mod dao;
pub mod database;

pub use dao::{RequestLogDao, TextStorageDao};
pub use database::*;
