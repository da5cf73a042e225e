//! tm-db - Database drivers for Tidemark
//!
//! This crate provides the DuckDB implementation of the `tm_core::Driver`
//! trait. The in-memory reference driver lives in `tm-core`.

pub mod duckdb;

pub use crate::duckdb::{DuckDbDriver, DEFAULT_VERSION_TABLE};
