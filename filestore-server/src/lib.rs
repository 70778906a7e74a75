//! The filestore server component.
//!
//! This builds on top of the [`filestore-service`] crate and exposes the
//! tiered store as an HTTP API: multipart form uploads, byte-range capable
//! downloads, listings, and batch deletes.
//!
//! [`filestore-service`]: filestore_service
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod observability;
pub mod state;
pub mod web;
