//! Prefix-trie path template matcher.
//!
//! Compiles OpenAPI path templates into a trie of static/param segments
//! with per-node method sets. Supports path parameter capture,
//! static-over-param precedence, and path normalization.

pub mod trie;

pub use trie::{normalize_path, percent_decode, RouteEntry, RouteMatch, Router};
