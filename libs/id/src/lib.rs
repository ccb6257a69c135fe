//! # accounts-id
//!
//! Typed identifiers and stream versions for customer accounts.
//!
//! ## ID Format
//!
//! Aggregate IDs use a prefixed format: `{prefix}_{ulid}`, for example
//! `cust_01HV4Z2WQXKJNM8GPQY6VBKC3D`.
//!
//! - The prefix keeps IDs of different aggregates from being mixed up
//! - ULIDs are time-ordered and carry 80 bits of randomness
//! - Parsing is strict, so `parse(id.to_string()) == id` always holds
//!
//! ## Stream Versions
//!
//! [`StreamVersion`] numbers the events of one stream, starting at 1.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
