//! # accounts-events
//!
//! Shared building blocks for event-sourced aggregates.
//!
//! ## Design Principles
//!
//! - Events are immutable records of facts that already happened
//! - Every event belongs to exactly one stream and carries its stream version
//! - Streams are append-only and versioned from 1 without gaps
//! - Failures worth auditing are recorded as failure events, not only returned
//!
//! ## Event Metadata
//!
//! Every event embeds an [`EventMeta`] with:
//! - The stable event name used by the codec (`customer.registered`, ...)
//! - The occurrence timestamp (microsecond precision)
//! - The stream version
//!
//! ## Errors
//!
//! All layers report a single [`Error`] type tagged with an [`ErrorKind`];
//! use [`is_kind`] to test an error (or anything wrapping it) for a kind.

mod envelope;
mod error;

pub use envelope::*;
pub use error::{is_kind, Error, ErrorKind, FailureReason, Result};
