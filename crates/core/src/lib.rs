//! Shopfront Core - Shared types library.
//!
//! This crate provides the domain types used by the storefront:
//! - `storefront` - Customer-facing shop and thin admin dashboard
//!
//! # Architecture
//!
//! The core crate contains only types and pure arithmetic - no I/O, no HTTP
//! clients. The backend REST API is the source of truth for every entity;
//! these types describe the shapes the storefront works with while a request
//! is in flight.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, discounts, contact details and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
