//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//!
//! Request types carry raw strings wherever the core is responsible for
//! validation, so that malformed values surface as typed failures rather
//! than generic deserialisation errors.

pub mod body;
pub mod id;
pub mod motion;
pub mod pagination;
pub mod vote;
pub mod voter;
