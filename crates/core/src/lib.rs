//! Apothecary Core - Shared domain types.
//!
//! This crate provides the types shared by every Apothecary component:
//! - `storefront` - Catalog, checkout, order lifecycle and admin API
//! - `cli` - Migrations, seeding and operator commands
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, contact details, money and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
