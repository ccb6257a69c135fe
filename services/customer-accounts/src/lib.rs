//! Event-sourced customer accounts.
//!
//! The [`domain`] module holds the pure aggregate logic. [`serialization`]
//! maps events to stored bytes, [`db`] persists them in Postgres and
//! [`command_handler`] ties the pieces together, one transaction per command.

pub mod command_handler;
pub mod config;
pub mod db;
pub mod domain;
pub mod serialization;
