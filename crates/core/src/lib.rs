//! EcoMall Core - Shared types library.
//!
//! This crate provides common types used across all EcoMall client components:
//! - `client` - Remote store client, session identity and cart/wishlist synchronizer
//! - `cli` - Command-line front end driving the synchronizer
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no persistence. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, cart/wishlist entries, checkout totals and the session user

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
