//! imgvault database library
//!
//! Persistence of image records in PostgreSQL.

pub mod db;

pub use db::*;
