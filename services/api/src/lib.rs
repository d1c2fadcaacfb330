//! services/api/src/lib.rs
//!
//! HTTP surface and PostgreSQL adapter for the learning progress engine.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
