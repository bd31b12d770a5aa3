//! Core types and collaborator traits for Flick relationship toggles.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::RelationStore`]; front ends drive a
//! [`toggle::ToggleController`] over whichever backend they are given.

pub mod error;
pub mod feed;
pub mod notify;
pub mod profile;
pub mod relation;
pub mod refresh;
pub mod store;
pub mod toggle;

pub use error::{Error, Result};
