//! Resource modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs`: Wire types for the resource and its create/update bodies
//! - `client.rs`: Sub-client with HTTP methods

pub mod project;
pub mod user;
