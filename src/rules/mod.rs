//! Business rules behind the HTTP layer.
//!
//! The handlers in `api` are thin plumbing; the actual validation and
//! authorization decisions for scheduling and clinical notes live here so
//! they can be exercised directly against a database pool.

pub mod notes;
pub mod scheduling;
