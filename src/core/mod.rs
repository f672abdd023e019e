//! Core domain types: identifiers, scheduled resources and tags.

pub mod resource;
pub mod tags;
pub mod types;
