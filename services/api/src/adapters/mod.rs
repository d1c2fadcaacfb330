//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the core ports.

pub mod db;

pub use db::DbAdapter;
