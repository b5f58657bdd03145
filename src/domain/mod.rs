//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `licensing` - Module catalog, licenses, entitlement resolution, requests, usage

pub mod foundation;
pub mod licensing;
