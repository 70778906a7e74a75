//! The service layer of the filestore: tiered storage of sealed file
//! artifacts.
//!
//! Every persisted artifact is *sealed* — gzip-compressed and symmetrically
//! encrypted by the [`transform`] pipeline — before it reaches either storage
//! tier. The [`store::TieredStore`] orchestrates a local filesystem cache and
//! a remote object store (reached through the [`remote::ObjectStoreClient`]
//! capability): writes seal once and fan out to the requested tiers, reads
//! probe the cache and fall back to the remote store on a strict not-found,
//! and large remote writes go through bounded-concurrency [`multipart`]
//! sessions. Byte-range delivery is planned by [`range::RangePlan`].
//!
//! It is designed as a library crate to be used by the `filestore-server`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod cache;
pub mod error;
pub mod multipart;
pub mod range;
pub mod remote;
pub mod store;
mod stream;
pub mod transform;

pub use error::{Error, Result};
pub use store::{Delivery, ObjectSummary, StoreConfig, TierOptions, TieredStore, WriteReceipt};
pub use stream::PayloadStream;
