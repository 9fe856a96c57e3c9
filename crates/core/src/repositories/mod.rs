//! Collection owners.
//!
//! Each repository owns one collection, reads it from a [`store::SnapshotStore`] once at load
//! time and rewrites it after every mutation. Nothing outside these types touches storage.

pub mod doctors;
pub mod instruments;
pub mod patients;
pub mod service_requests;
pub mod store;
