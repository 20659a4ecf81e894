//! Shared Types for Mosaic Analytics
//!
//! This crate is the single source of truth for every type that crosses a
//! JSON boundary: the analytics summary served to the front end and the
//! central-bank rate payloads passed through the rate proxy.
//!
//! ## Rules
//!
//! 1. Money, rates and percentages are `rust_decimal::Decimal`
//! 2. Field names serialize in camelCase
//! 3. Derived values only - nothing here is persisted

pub mod analytics;
pub mod rates;

pub use analytics::*;
pub use rates::*;
