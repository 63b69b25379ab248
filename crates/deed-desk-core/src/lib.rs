//! # Deed Desk Core
//!
//! Pure table logic for Deed Desk: the sale-deed data model, row
//! flattening, rowspan planning, search and pagination, and the
//! fully-repeated export formatter.
//!
//! This crate performs no I/O and depends on no async runtime. Every
//! function is deterministic over its inputs and safe to recompute on
//! every fetch, search, or page change.
//!
//! ```text
//! Documents ──▶ flatten ──▶ search::filter_rows ──▶ page_range ──▶ grouping ──▶ view
//!     │
//!     └──────▶ export::build_export_rows (one row per person, no spans)
//! ```

pub mod export;
pub mod flatten;
pub mod grouping;
pub mod models;
pub mod search;
pub mod view;
