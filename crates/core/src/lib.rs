//! New of You Core - Shared cart types.
//!
//! This crate provides the types shared by every New of You component:
//! - `storefront` - Shopping-client cart store and persistence bridge
//! - `api` - REST backend that owns authenticated carts
//! - `cli` - Command-line tools for migrations and a terminal cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O, no
//! database access, no HTTP clients. Both sides of the wire merge lines with
//! the same [`CartSnapshot`] rules, so guest carts and server carts can never
//! disagree on what "adding a line" means.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, quantities, cart lines/snapshots and session context

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
