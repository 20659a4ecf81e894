//! Portfolio analytics
//!
//! One canonical pipeline for every channel:
//!
//! ```text
//! PortfolioRows
//! ├── direct   ──> aggregate_direct ──┐
//! ├── inward   ──> aggregate_inward ──┼──> totalize ──> aggregate_claims
//! │               (foreign/domestic)  │
//! ├── outward  ──> aggregate_outward ─┘   (cost: net = gross - ceded)
//! └── agreements + bordereaux ──> aggregate_agreements
//! ```
//!
//! Aggregation is synchronous and never fails. Missing numbers are zero,
//! unknown statuses land in a default bucket, unknown currencies pass through
//! unconverted.

pub mod agreements;
pub mod channel;
pub mod claims;
pub mod measures;
pub mod service;
pub mod status;
pub mod totals;

pub use agreements::aggregate_agreements;
pub use channel::{aggregate_direct, aggregate_inward, aggregate_outward, ChannelAggregate};
pub use claims::aggregate_claims;
pub use measures::{earned_fraction, normalize_percent, percent_of, safe_div};
pub use service::{summarize, AnalyticsContext, AnalyticsService};
pub use status::{ClaimState, StatusBucket};
pub use totals::totalize;
