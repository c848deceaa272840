//! Core types for New of You.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod quantity;
pub mod session;
pub mod wire;

pub use cart::{CartLine, CartSnapshot};
pub use id::*;
pub use quantity::{Quantity, QuantityError};
pub use session::{ParsePolicyError, SessionContext, SessionMode, ZeroQuantityPolicy};
pub use wire::{AddLineRequest, ApiResponse, CartDocument, MergeRequest, UpdateLineRequest};
