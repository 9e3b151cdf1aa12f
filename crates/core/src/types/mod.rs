//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod discount;
pub mod email;
pub mod id;
pub mod phone;
pub mod price;
pub mod status;

pub use discount::{DiscountError, DiscountPercent};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{PhoneError, PhoneNumber};
pub use price::{CurrencyCode, Price};
pub use status::*;
