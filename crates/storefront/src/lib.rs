//! Apothecary storefront library.
//!
//! Catalog, checkout, order lifecycle, payments and account data for the
//! pharmacy storefront, exposed as a JSON API. The binary in `main.rs` wires
//! the `PostgreSQL` store and the Razorpay client into [`routes::router`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
