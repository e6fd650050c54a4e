//! Concrete lookups built on [`coalesce_domain::Loader`].
//!
//! Each resolver pairs a narrow async API trait, standing in for the
//! remote service, with a [`BulkSource`](coalesce_domain::BulkSource)
//! that teaches the engine how to fingerprint, validate and judge its
//! payloads.

pub mod avatar;
pub mod users;
